// ⚠️ Error Types - One enum per failure domain
// Acquisition errors are retried, store errors are surfaced or degraded by the caller.

use thiserror::Error;

/// Failure while acquiring venues from the venue source.
///
/// Every variant is treated as retryable by the load path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("venue request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("venue source answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed venue response: {0}")]
    Malformed(String),

    #[error("venue source returned no venues")]
    Empty,
}

/// Failure while talking to the vote store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store connection poisoned")]
    Lock,
}

/// Why a vote or report was not recorded.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("unknown venue: {0}")]
    UnknownVenue(String),

    #[error("'{0}' is not a votable payment category")]
    NotVotable(String),

    #[error("already voted for {0} on this device")]
    AlreadyVoted(String),

    #[error("already reported {0} on this device")]
    AlreadyReported(String),

    #[error("could not save: {0}")]
    Store(#[from] DbError),
}

/// Why a load ended without venue data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not load venues after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },
}

impl LoadError {
    /// Message shown to the user when the load is given up.
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Fetch { .. } => {
                "Venue data could not be loaded. Check your connection and retry.".to_string()
            }
        }
    }
}
