// Munich Card Map - Core Library
// Crowd-verified card acceptance for Munich venues.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod venue;
pub mod status;         // Status resolver: votes + tags → category
pub mod stats;          // Coverage stats
pub mod retry;          // Backoff policy + retry combinator
pub mod overpass;       // Venue acquisition
pub mod store;          // Vote store client (hosted + SQLite)
pub mod client_state;   // Per-device voted/reported flags
pub mod collection;     // Single-writer venue collection
pub mod session;        // Load / vote / report orchestration
pub mod export;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use venue::{Venue, GeoPoint, VoteTally};
pub use status::{Category, Status, StatusFilter, resolve_status};
pub use stats::AggregateStats;
pub use retry::{RetryPolicy, RetryState, retry_with};
pub use overpass::{
    AmenityFilter, BoundingBox, OverpassClient, VenueSource,
    build_query, parse_venues,
};
pub use store::{
    VoteStore, VoteRecord, BlacklistEntry, Report, ReportKind,
    RestStore, SqliteStore,
    list_votes, list_blacklist, PAGE_SIZE,
};
pub use client_state::ClientFlags;
pub use collection::{VenueCollection, Change, Applied};
pub use session::{
    MapSession, SessionOptions, LoadState, VoteOutcome,
    LoadJob, Acquired, PendingVote, PendingReport,
};
pub use export::{export_csv, write_csv};
pub use config::{Config, StoreBackend};
pub use error::{FetchError, DbError, VoteError, LoadError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
