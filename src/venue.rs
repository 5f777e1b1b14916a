// 📍 Venue Model - Point-located venues with source tags and vote tallies
//
// Identity is the external id ("node/123"), which never changes.
// Tags come from the venue source, the tally from the vote store.

use crate::status::{resolve_status, Category, Status};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// LOCATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

// ============================================================================
// VOTE TALLY
// ============================================================================

/// Per-venue vote counters.
///
/// Counters only ever grow: a vote adds exactly one to one counter and there is
/// no way to take a vote back. Absent or null counters read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub cash_votes: u32,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub card_votes: u32,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub giro_votes: u32,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}

impl VoteTally {
    pub fn new(cash_votes: u32, card_votes: u32, giro_votes: u32) -> Self {
        VoteTally {
            cash_votes,
            card_votes,
            giro_votes,
        }
    }

    /// Tally after one more vote for `category`.
    ///
    /// Returns `None` for `Category::Unknown`, which cannot be voted for.
    pub fn with_vote(&self, category: Category) -> Option<VoteTally> {
        let mut next = *self;
        match category {
            Category::Cash => next.cash_votes = next.cash_votes.saturating_add(1),
            Category::Card => next.card_votes = next.card_votes.saturating_add(1),
            Category::Giro => next.giro_votes = next.giro_votes.saturating_add(1),
            Category::Unknown => return None,
        }
        Some(next)
    }
}

// ============================================================================
// VENUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Stable external id, `<type>/<numeric-id>`
    pub id: String,

    pub location: GeoPoint,

    pub name: Option<String>,

    /// Raw key/value tags from the venue source
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub tally: VoteTally,
}

impl Venue {
    pub fn new(id: impl Into<String>, location: GeoPoint) -> Self {
        Venue {
            id: id.into(),
            location,
            name: None,
            tags: BTreeMap::new(),
            tally: VoteTally::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tally(mut self, tally: VoteTally) -> Self {
        self.tally = tally;
        self
    }

    /// Name for display, falling back to the id for unnamed venues.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn status(&self) -> Status {
        resolve_status(&self.tally, Some(&self.tags))
    }

    pub fn category(&self) -> Category {
        self.status().category
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn munich() -> GeoPoint {
        GeoPoint {
            lat: 48.137,
            lon: 11.575,
        }
    }

    #[test]
    fn test_with_vote_adds_exactly_one() {
        let tally = VoteTally::new(1, 2, 3);

        assert_eq!(tally.with_vote(Category::Cash), Some(VoteTally::new(2, 2, 3)));
        assert_eq!(tally.with_vote(Category::Card), Some(VoteTally::new(1, 3, 3)));
        assert_eq!(tally.with_vote(Category::Giro), Some(VoteTally::new(1, 2, 4)));
        assert_eq!(tally.with_vote(Category::Unknown), None);
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let unnamed = Venue::new("node/42", munich());
        let named = Venue::new("node/43", munich()).with_name("Augustiner Keller");

        assert_eq!(unnamed.display_name(), "node/42");
        assert_eq!(named.display_name(), "Augustiner Keller");
    }

    #[test]
    fn test_venue_category_uses_tags_without_votes() {
        let venue = Venue::new("node/1", munich()).with_tag("payment:cards", "no");
        assert_eq!(venue.category(), Category::Cash);

        let voted = venue.with_tally(VoteTally::new(0, 1, 0));
        assert_eq!(voted.category(), Category::Card);
    }
}
