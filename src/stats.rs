// 📊 Coverage Stats - How many venues have a known payment status

use crate::status::Category;
use crate::venue::Venue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: usize,
    pub mapped: usize,
    pub percent: u32,
}

impl AggregateStats {
    /// Full recomputation over a venue set.
    pub fn compute(venues: &[Venue]) -> Self {
        let mapped = venues.iter().filter(|v| v.category().is_known()).count();
        AggregateStats::from_counts(venues.len(), mapped)
    }

    pub fn from_counts(total: usize, mapped: usize) -> Self {
        AggregateStats {
            total,
            mapped,
            percent: percent(mapped, total),
        }
    }

    /// Incremental patch after one venue changed category.
    ///
    /// Only unknown → known counts. Votes never take a venue back to unknown,
    /// so `mapped` is never decremented here.
    pub fn record_transition(&mut self, previous: Category, next: Category) {
        if !previous.is_known() && next.is_known() && self.mapped < self.total {
            self.mapped += 1;
            self.percent = percent(self.mapped, self.total);
        }
    }

    /// `mapped/total (percent%)`
    pub fn summary(&self) -> String {
        format!("{}/{} ({}%)", self.mapped, self.total, self.percent)
    }
}

fn percent(mapped: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * mapped as f64 / total as f64).round() as u32
}

// ============================================================================
// TESTS
// ============================================================================
