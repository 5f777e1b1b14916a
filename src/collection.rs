// 📚 Venue Collection - The one in-memory copy of the map data
//
// Single writer: every mutation goes through `apply`, which also keeps the
// coverage stats in step (full recompute on replace, +1 patch on a flip).

use crate::stats::AggregateStats;
use crate::status::{Category, Status, StatusFilter};
use crate::venue::{Venue, VoteTally};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// New venue set from a full load
    Replace(Vec<Venue>),

    /// Persisted tally for one venue
    Tally { venue_id: String, tally: VoteTally },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Replaced { total: usize },
    Tallied { previous: Category, status: Status },
    Ignored,
}

#[derive(Debug, Default)]
pub struct VenueCollection {
    venues: Vec<Venue>,
    index: HashMap<String, usize>,
    stats: AggregateStats,
}

impl VenueCollection {
    pub fn new() -> Self {
        VenueCollection::default()
    }

    /// Drop blacklisted venues and attach stored tallies (zero when absent).
    pub fn assemble(
        raw: Vec<Venue>,
        tallies: &HashMap<String, VoteTally>,
        blacklist: &HashSet<String>,
    ) -> Vec<Venue> {
        let before = raw.len();
        let venues: Vec<Venue> = raw
            .into_iter()
            .filter(|v| !blacklist.contains(&v.id))
            .map(|mut v| {
                v.tally = tallies.get(&v.id).copied().unwrap_or_default();
                v
            })
            .collect();

        if venues.len() < before {
            debug!(hidden = before - venues.len(), "blacklisted venues removed");
        }
        venues
    }

    pub fn apply(&mut self, change: Change) -> Applied {
        match change {
            Change::Replace(venues) => {
                let mut index = HashMap::with_capacity(venues.len());
                let mut unique = Vec::with_capacity(venues.len());
                for venue in venues {
                    if index.contains_key(&venue.id) {
                        continue;
                    }
                    index.insert(venue.id.clone(), unique.len());
                    unique.push(venue);
                }

                self.stats = AggregateStats::compute(&unique);
                self.venues = unique;
                self.index = index;
                Applied::Replaced {
                    total: self.venues.len(),
                }
            }
            Change::Tally { venue_id, tally } => {
                let Some(&position) = self.index.get(&venue_id) else {
                    warn!(venue_id = %venue_id, "tally for unknown venue ignored");
                    return Applied::Ignored;
                };
                let venue = &mut self.venues[position];

                let current = venue.tally;
                if tally.cash_votes < current.cash_votes
                    || tally.card_votes < current.card_votes
                    || tally.giro_votes < current.giro_votes
                {
                    warn!(venue_id = %venue_id, "tally would go backwards, ignored");
                    return Applied::Ignored;
                }

                let previous = venue.category();
                venue.tally = tally;
                let status = venue.status();
                self.stats.record_transition(previous, status.category);

                Applied::Tallied { previous, status }
            }
        }
    }

    pub fn get(&self, venue_id: &str) -> Option<&Venue> {
        self.index.get(venue_id).map(|&i| &self.venues[i])
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    pub fn filtered(&self, filter: StatusFilter) -> impl Iterator<Item = &Venue> {
        self.venues
            .iter()
            .filter(move |v| filter.matches(v.category()))
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
