// 🗳️ Vote Store - Vote tallies, moderation blacklist and reports
//
// Reads degrade instead of failing: a broken vote read keeps whatever pages
// arrived, a broken blacklist read filters nothing. Writes report their errors
// so the caller can leave local state alone.

pub mod rest;
pub mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

use crate::error::DbError;
use crate::venue::VoteTally;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Rows per vote page
pub const PAGE_SIZE: usize = 1000;

// ============================================================================
// RECORDS
// ============================================================================

/// One row of the votes table. Always carries the complete triple: an upsert
/// replaces the stored row, it does not merge counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub tally: VoteTally,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub venue_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Venue closed for good
    Closed,
    WrongLocation,
    NotAVenue,
    Other,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Closed => "closed",
            ReportKind::WrongLocation => "wrong_location",
            ReportKind::NotAVenue => "not_a_venue",
            ReportKind::Other => "other",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "closed" => Ok(ReportKind::Closed),
            "wrong_location" => Ok(ReportKind::WrongLocation),
            "not_a_venue" => Ok(ReportKind::NotAVenue),
            "other" => Ok(ReportKind::Other),
            other => Err(format!("unknown report kind '{}'", other)),
        }
    }
}

/// Append-only moderation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub venue_id: String,
    pub name: Option<String>,
    pub kind: ReportKind,

    /// Moderation state; new reports are "pending"
    pub status: String,

    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(venue_id: &str, name: Option<&str>, kind: ReportKind) -> Self {
        Report {
            report_id: uuid::Uuid::new_v4().to_string(),
            venue_id: venue_id.to_string(),
            name: name.map(str::to_string),
            kind,
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Up to `limit` vote rows starting at `offset`, in stable id order.
    async fn fetch_votes_page(&self, offset: usize, limit: usize)
        -> Result<Vec<VoteRecord>, DbError>;

    async fn fetch_blacklist(&self) -> Result<Vec<BlacklistEntry>, DbError>;

    /// Insert or fully replace the row for `record.id`.
    async fn upsert_vote(&self, record: &VoteRecord) -> Result<(), DbError>;

    async fn insert_report(&self, report: &Report) -> Result<(), DbError>;
}

// ============================================================================
// READ HELPERS
// ============================================================================

/// Every vote tally, read page by page.
///
/// Stops at the first short or empty page. A failed page ends the read with
/// the rows gathered so far.
pub async fn list_votes<S>(store: &S, page_size: usize) -> HashMap<String, VoteTally>
where
    S: VoteStore + ?Sized,
{
    let page_size = page_size.max(1);
    let mut tallies = HashMap::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        let page = match store.fetch_votes_page(offset, page_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    pages,
                    rows = tallies.len(),
                    "vote read failed, keeping partial results: {}",
                    e
                );
                break;
            }
        };

        let rows = page.len();
        if rows > 0 {
            pages += 1;
        }
        for record in page {
            tallies.insert(record.id, record.tally);
        }

        if rows < page_size {
            break;
        }
        offset += rows;
    }

    debug!(pages, rows = tallies.len(), "votes loaded");
    tallies
}

/// Blacklisted venue ids. Empty when the read fails.
pub async fn list_blacklist<S>(store: &S) -> HashSet<String>
where
    S: VoteStore + ?Sized,
{
    match store.fetch_blacklist().await {
        Ok(entries) => entries.into_iter().map(|e| e.venue_id).collect(),
        Err(e) => {
            warn!("blacklist read failed, showing all venues: {}", e);
            HashSet::new()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts page reads and fails from `fail_from_page` on.
    struct CountingStore {
        inner: SqliteStore,
        pages: AtomicUsize,
        fail_from_page: Option<usize>,
        blacklist_down: bool,
    }

    impl CountingStore {
        fn with_votes(count: usize) -> Self {
            let inner = SqliteStore::open_in_memory().unwrap();
            inner.seed_votes(count).unwrap();
            CountingStore {
                inner,
                pages: AtomicUsize::new(0),
                fail_from_page: None,
                blacklist_down: false,
            }
        }
    }

    #[async_trait]
    impl VoteStore for CountingStore {
        async fn fetch_votes_page(
            &self,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<VoteRecord>, DbError> {
            let page = self.pages.fetch_add(1, Ordering::SeqCst);
            if self.fail_from_page.map(|n| page >= n).unwrap_or(false) {
                return Err(DbError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.inner.fetch_votes_page(offset, limit).await
        }

        async fn fetch_blacklist(&self) -> Result<Vec<BlacklistEntry>, DbError> {
            if self.blacklist_down {
                return Err(DbError::Lock);
            }
            self.inner.fetch_blacklist().await
        }

        async fn upsert_vote(&self, record: &VoteRecord) -> Result<(), DbError> {
            self.inner.upsert_vote(record).await
        }

        async fn insert_report(&self, report: &Report) -> Result<(), DbError> {
            self.inner.insert_report(report).await
        }
    }

    #[tokio::test]
    async fn test_pagination_reads_every_page() {
        let store = CountingStore::with_votes(2500);

        let tallies = list_votes(&store, PAGE_SIZE).await;

        assert_eq!(tallies.len(), 2500);
        assert_eq!(store.pages.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pagination_exact_multiple_ends_on_empty_page() {
        let store = CountingStore::with_votes(2000);

        let tallies = list_votes(&store, PAGE_SIZE).await;

        assert_eq!(tallies.len(), 2000);
        assert_eq!(store.pages.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_partial_results() {
        let mut store = CountingStore::with_votes(2500);
        store.fail_from_page = Some(1);

        let tallies = list_votes(&store, PAGE_SIZE).await;

        assert_eq!(tallies.len(), 1000);
    }

    #[tokio::test]
    async fn test_blacklist_fails_open() {
        let mut store = CountingStore::with_votes(0);
        store.inner.add_to_blacklist("node/1").unwrap();

        assert!(list_blacklist(&store).await.contains("node/1"));

        store.blacklist_down = true;
        assert!(list_blacklist(&store).await.is_empty());
    }

    #[test]
    fn test_vote_record_wire_format() {
        let record = VoteRecord {
            id: "node/7".to_string(),
            name: Some("Café Luitpold".to_string()),
            tally: VoteTally::new(1, 2, 3),
        };

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], "node/7");
        assert_eq!(json["cash_votes"], 1);
        assert_eq!(json["card_votes"], 2);
        assert_eq!(json["giro_votes"], 3);
    }

    #[test]
    fn test_report_defaults() {
        let report = Report::new("way/5", Some("Hofbräuhaus"), ReportKind::Closed);

        assert_eq!(report.status, "pending");
        assert_eq!(report.report_id.len(), 36);
        assert_eq!("wrong-location".parse::<ReportKind>(), Ok(ReportKind::WrongLocation));
        assert!("spam".parse::<ReportKind>().is_err());
    }
}
