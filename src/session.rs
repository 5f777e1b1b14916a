// 🧭 Map Session - Load, vote, report
//
// Load: venue fetch (with retry), vote listing and blacklist listing run
// concurrently and are joined before any status is resolved.
// Vote: persist first, then apply. A failed write leaves the collection as is.
//
// Both split into a detached network phase (LoadJob, PendingVote, PendingReport)
// and a short apply phase on the session, so a shared session only needs to be
// locked around the apply.

use crate::client_state::ClientFlags;
use crate::collection::{Applied, Change, VenueCollection};
use crate::error::{FetchError, LoadError, VoteError};
use crate::overpass::{AmenityFilter, BoundingBox, VenueSource};
use crate::retry::{retry_with, RetryPolicy, RetryState};
use crate::stats::AggregateStats;
use crate::status::{Category, Status, StatusFilter};
use crate::store::{list_blacklist, list_votes, Report, ReportKind, VoteRecord, VoteStore, PAGE_SIZE};
use crate::venue::{Venue, VoteTally};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// OPTIONS & STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub bbox: BoundingBox,
    pub amenities: AmenityFilter,
    pub retry: RetryPolicy,
    pub page_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            bbox: BoundingBox::MUNICH,
            amenities: AmenityFilter::default(),
            retry: RetryPolicy::default(),
            page_size: PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Ready { loaded_at: DateTime<Utc> },

    /// Retries used up; only a manual reload tries again
    Failed { message: String, retryable: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub venue_id: String,
    pub tally: VoteTally,
    pub status: Status,
    pub stats: AggregateStats,
}

// ============================================================================
// DETACHED WORK
// ============================================================================

/// Network phase of a load: venue fetch (with retry), vote listing and
/// blacklist listing.
pub struct LoadJob {
    source: Arc<dyn VenueSource>,
    store: Arc<dyn VoteStore>,
    options: SessionOptions,
    retry: RetryState,
}

/// What a [`LoadJob`] brought back.
pub struct Acquired {
    venues: Result<Vec<Venue>, FetchError>,
    tallies: HashMap<String, VoteTally>,
    blacklist: HashSet<String>,
    retry: RetryState,
}

impl LoadJob {
    pub async fn run(mut self) -> Acquired {
        let source = self.source.as_ref();
        let store = self.store.as_ref();
        let options = &self.options;

        let fetch = retry_with(&options.retry, &mut self.retry, move || {
            source.fetch_venues(&options.bbox, &options.amenities)
        });

        let (venues, tallies, blacklist) = tokio::join!(
            fetch,
            list_votes(store, options.page_size),
            list_blacklist(store),
        );

        Acquired {
            venues,
            tallies,
            blacklist,
            retry: self.retry,
        }
    }
}

/// A computed tally waiting to be written.
pub struct PendingVote {
    store: Arc<dyn VoteStore>,
    record: VoteRecord,
}

impl PendingVote {
    /// Write the full record; the returned record is safe to apply.
    pub async fn persist(self) -> Result<VoteRecord, VoteError> {
        if let Err(e) = self.store.upsert_vote(&self.record).await {
            warn!(venue_id = %self.record.id, "vote not saved: {}", e);
            return Err(e.into());
        }
        Ok(self.record)
    }
}

pub struct PendingReport {
    store: Arc<dyn VoteStore>,
    report: Report,
}

impl PendingReport {
    pub async fn submit(self) -> Result<Report, VoteError> {
        if let Err(e) = self.store.insert_report(&self.report).await {
            warn!(venue_id = %self.report.venue_id, "report not saved: {}", e);
            return Err(e.into());
        }

        info!(venue_id = %self.report.venue_id, kind = %self.report.kind, "report filed");
        Ok(self.report)
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct MapSession {
    source: Arc<dyn VenueSource>,
    store: Arc<dyn VoteStore>,
    options: SessionOptions,
    retry: RetryState,
    load_state: LoadState,
    collection: VenueCollection,
}

impl MapSession {
    pub fn new(
        source: Arc<dyn VenueSource>,
        store: Arc<dyn VoteStore>,
        options: SessionOptions,
    ) -> Self {
        MapSession {
            source,
            store,
            options,
            retry: RetryState::default(),
            load_state: LoadState::Idle,
            collection: VenueCollection::new(),
        }
    }

    /// Mark the session as loading and detach what the network phase needs.
    ///
    /// The returned job runs without borrowing the session; hand its result
    /// back to [`MapSession::finish_load`].
    pub fn begin_load(&mut self) -> LoadJob {
        self.load_state = LoadState::Loading;
        LoadJob {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            options: self.options.clone(),
            retry: self.retry,
        }
    }

    /// Manual retry: forget earlier failures, then `begin_load`.
    pub fn begin_reload(&mut self) -> LoadJob {
        self.retry.reset();
        self.begin_load()
    }

    /// Rebuild the collection from an acquired load.
    ///
    /// On failure the previous collection stays in place and the state turns
    /// `Failed`.
    pub fn finish_load(&mut self, acquired: Acquired) -> Result<AggregateStats, LoadError> {
        self.retry = acquired.retry;

        match acquired.venues {
            Ok(raw) => {
                let venues = VenueCollection::assemble(raw, &acquired.tallies, &acquired.blacklist);
                self.collection.apply(Change::Replace(venues));
                self.load_state = LoadState::Ready {
                    loaded_at: Utc::now(),
                };

                let stats = self.collection.stats();
                info!(
                    total = stats.total,
                    mapped = stats.mapped,
                    percent = stats.percent,
                    "map data loaded"
                );
                Ok(stats)
            }
            Err(source) => {
                let err = LoadError::Fetch {
                    attempts: self.retry.retries() + 1,
                    source,
                };
                warn!("{}", err);
                self.load_state = LoadState::Failed {
                    message: err.user_message(),
                    retryable: true,
                };
                Err(err)
            }
        }
    }

    /// Fetch venues, votes and blacklist, then rebuild the collection.
    pub async fn load(&mut self) -> Result<AggregateStats, LoadError> {
        let acquired = self.begin_load().run().await;
        self.finish_load(acquired)
    }

    /// Manual retry: forget earlier failures and load again.
    pub async fn reload(&mut self) -> Result<AggregateStats, LoadError> {
        let acquired = self.begin_reload().run().await;
        self.finish_load(acquired)
    }

    /// Compute the tally after one vote for `choice`, without saving it.
    pub fn prepare_vote(&self, venue_id: &str, choice: Category) -> Result<PendingVote, VoteError> {
        let venue = self
            .collection
            .get(venue_id)
            .ok_or_else(|| VoteError::UnknownVenue(venue_id.to_string()))?;
        let tally = venue
            .tally
            .with_vote(choice)
            .ok_or_else(|| VoteError::NotVotable(choice.to_string()))?;

        Ok(PendingVote {
            store: Arc::clone(&self.store),
            record: VoteRecord {
                id: venue.id.clone(),
                name: venue.name.clone(),
                tally,
            },
        })
    }

    /// Apply a tally the store already accepted.
    ///
    /// When a newer tally got there first the collection is left alone and the
    /// outcome describes what the map currently shows.
    pub fn apply_vote(&mut self, record: VoteRecord) -> Result<VoteOutcome, VoteError> {
        let applied = self.collection.apply(Change::Tally {
            venue_id: record.id.clone(),
            tally: record.tally,
        });

        match applied {
            Applied::Tallied { previous, status } => {
                info!(
                    venue_id = %record.id,
                    from = %previous,
                    to = %status.category,
                    "vote recorded"
                );
                Ok(VoteOutcome {
                    venue_id: record.id,
                    tally: record.tally,
                    status,
                    stats: self.collection.stats(),
                })
            }
            _ => {
                let venue = self
                    .collection
                    .get(&record.id)
                    .ok_or_else(|| VoteError::UnknownVenue(record.id.clone()))?;
                Ok(VoteOutcome {
                    venue_id: record.id.clone(),
                    tally: venue.tally,
                    status: venue.status(),
                    stats: self.collection.stats(),
                })
            }
        }
    }

    /// Record one vote for `choice`.
    ///
    /// Sends the complete new tally to the store and only touches the local
    /// collection once the store accepted it.
    pub async fn cast_vote(
        &mut self,
        venue_id: &str,
        choice: Category,
    ) -> Result<VoteOutcome, VoteError> {
        let record = self.prepare_vote(venue_id, choice)?.persist().await?;
        self.apply_vote(record)
    }

    /// `cast_vote`, refused when this device already voted for the venue.
    pub async fn vote_once(
        &mut self,
        flags: &mut ClientFlags,
        venue_id: &str,
        choice: Category,
    ) -> Result<VoteOutcome, VoteError> {
        if flags.has_voted(venue_id) {
            return Err(VoteError::AlreadyVoted(venue_id.to_string()));
        }

        let outcome = self.cast_vote(venue_id, choice).await?;

        flags.mark_voted(venue_id);
        if let Err(e) = flags.save() {
            warn!("vote saved but local flag was not: {:#}", e);
        }
        Ok(outcome)
    }

    /// Build a moderation report for a known venue, without sending it.
    pub fn prepare_report(&self, venue_id: &str, kind: ReportKind) -> Result<PendingReport, VoteError> {
        let venue = self
            .collection
            .get(venue_id)
            .ok_or_else(|| VoteError::UnknownVenue(venue_id.to_string()))?;

        Ok(PendingReport {
            store: Arc::clone(&self.store),
            report: Report::new(&venue.id, venue.name.as_deref(), kind),
        })
    }

    /// File a moderation report for a venue.
    pub async fn report(&self, venue_id: &str, kind: ReportKind) -> Result<Report, VoteError> {
        self.prepare_report(venue_id, kind)?.submit().await
    }

    /// `report`, refused when this device already reported the venue.
    pub async fn report_once(
        &self,
        flags: &mut ClientFlags,
        venue_id: &str,
        kind: ReportKind,
    ) -> Result<Report, VoteError> {
        if flags.has_reported(venue_id) {
            return Err(VoteError::AlreadyReported(venue_id.to_string()));
        }

        let report = self.report(venue_id, kind).await?;

        flags.mark_reported(venue_id);
        if let Err(e) = flags.save() {
            warn!("report saved but local flag was not: {:#}", e);
        }
        Ok(report)
    }

    pub fn venues(&self, filter: StatusFilter) -> Vec<&Venue> {
        self.collection.filtered(filter).collect()
    }

    pub fn venue(&self, venue_id: &str) -> Option<&Venue> {
        self.collection.get(venue_id)
    }

    pub fn stats(&self) -> AggregateStats {
        self.collection.stats()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn collection(&self) -> &VenueCollection {
        &self.collection
    }
}

// ============================================================================
// TESTS
// ============================================================================
