// 🎨 Status Resolver - Votes (and source tags) → display category
//
// Majority rule with a fixed tie-break order:
//   card  if card ≥ giro, card ≥ cash and card > 0
//   giro  if giro ≥ cash and giro > 0
//   cash  if cash > 0
//   otherwise unknown, unless a payment tag says more
//
// Card wins every tie it takes part in. That ordering is product behaviour
// and must not be reshuffled.

use crate::venue::VoteTally;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CATEGORY
// ============================================================================

/// Payment acceptance category of a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// General card acceptance (credit cards, Visa, Mastercard, ...)
    Card,

    /// Domestic debit (girocard) only
    Giro,

    /// Cash only
    Cash,

    /// Nothing known yet
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Card => "card",
            Category::Giro => "giro",
            Category::Cash => "cash",
            Category::Unknown => "unknown",
        }
    }

    /// Marker color on the map
    pub fn color(&self) -> &'static str {
        match self {
            Category::Card => "#2ecc71",
            Category::Giro => "#f1c40f",
            Category::Cash => "#e74c3c",
            Category::Unknown => "#95a5a6",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Card => "Card accepted",
            Category::Giro => "Girocard only",
            Category::Cash => "Cash only",
            Category::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(Category::Card),
            // "ec" is the colloquial German name for girocard
            "giro" | "girocard" | "ec" => Ok(Category::Giro),
            "cash" => Ok(Category::Cash),
            "unknown" => Ok(Category::Unknown),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Derived display status: `(colorCode, displayText, category)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub color: &'static str,
    pub text: &'static str,
    pub category: Category,
}

impl From<Category> for Status {
    fn from(category: Category) -> Self {
        Status {
            color: category.color(),
            text: category.label(),
            category,
        }
    }
}

/// Resolve the display status of a venue.
///
/// Pure and deterministic. Tags are only consulted when the tally is all zero.
pub fn resolve_status(tally: &VoteTally, tags: Option<&BTreeMap<String, String>>) -> Status {
    let VoteTally {
        cash_votes: cash,
        card_votes: card,
        giro_votes: giro,
    } = *tally;

    let category = if card >= giro && card >= cash && card > 0 {
        Category::Card
    } else if giro >= cash && giro > 0 {
        Category::Giro
    } else if cash > 0 {
        Category::Cash
    } else {
        tags.map(category_from_tags).unwrap_or(Category::Unknown)
    };

    Status::from(category)
}

const CARD_TAGS: [&str; 4] = [
    "payment:cards",
    "payment:credit_cards",
    "payment:visa",
    "payment:mastercard",
];

/// Fallback from source tags. First match wins: explicit "no cards", then any
/// general card acceptance, then girocard.
fn category_from_tags(tags: &BTreeMap<String, String>) -> Category {
    let is = |key: &str, value: &str| tags.get(key).map(|v| v.trim() == value).unwrap_or(false);

    if is("payment:cards", "no") {
        Category::Cash
    } else if CARD_TAGS.iter().any(|key| is(key, "yes")) {
        Category::Card
    } else if is("payment:girocard", "yes") {
        Category::Giro
    } else {
        Category::Unknown
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Map filter control: `all|card|giro|cash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Card,
    Giro,
    Cash,
}

impl StatusFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Card => category == Category::Card,
            StatusFilter::Giro => category == Category::Giro,
            StatusFilter::Cash => category == Category::Cash,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(StatusFilter::All),
            other => match other.parse::<Category>()? {
                Category::Card => Ok(StatusFilter::Card),
                Category::Giro => Ok(StatusFilter::Giro),
                Category::Cash => Ok(StatusFilter::Cash),
                Category::Unknown => Err("cannot filter by 'unknown'".to_string()),
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(cash: u32, card: u32, giro: u32) -> VoteTally {
        VoteTally::new(cash, card, giro)
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_tie_between_cash_and_card_favors_card() {
        assert_eq!(resolve_status(&tally(2, 2, 0), None).category, Category::Card);
    }

    #[test]
    fn test_cash_majority() {
        assert_eq!(resolve_status(&tally(3, 2, 0), None).category, Category::Cash);
    }

    #[test]
    fn test_single_giro_vote() {
        assert_eq!(resolve_status(&tally(0, 0, 1), None).category, Category::Giro);
    }

    #[test]
    fn test_tie_between_giro_and_cash_favors_giro() {
        assert_eq!(resolve_status(&tally(4, 1, 4), None).category, Category::Giro);
    }

    #[test]
    fn test_three_way_tie_favors_card() {
        assert_eq!(resolve_status(&tally(5, 5, 5), None).category, Category::Card);
    }

    #[test]
    fn test_zero_tally_is_unknown_without_tags() {
        let status = resolve_status(&tally(0, 0, 0), None);
        assert_eq!(status.category, Category::Unknown);
        assert_eq!(status.color, "#95a5a6");

        let unrelated = tags(&[("amenity", "pub"), ("name", "Zum Franziskaner")]);
        assert_eq!(
            resolve_status(&tally(0, 0, 0), Some(&unrelated)).category,
            Category::Unknown
        );
    }

    #[test]
    fn test_tag_fallback() {
        let zero = tally(0, 0, 0);

        let no_cards = tags(&[("payment:cards", "no")]);
        assert_eq!(resolve_status(&zero, Some(&no_cards)).category, Category::Cash);

        let visa = tags(&[("payment:visa", "yes")]);
        assert_eq!(resolve_status(&zero, Some(&visa)).category, Category::Card);

        let giro = tags(&[("payment:girocard", "yes")]);
        assert_eq!(resolve_status(&zero, Some(&giro)).category, Category::Giro);

        // explicit "no cards" beats a stray card tag
        let mixed = tags(&[("payment:cards", "no"), ("payment:mastercard", "yes")]);
        assert_eq!(resolve_status(&zero, Some(&mixed)).category, Category::Cash);
    }

    #[test]
    fn test_votes_override_tags() {
        let no_cards = tags(&[("payment:cards", "no")]);
        assert_eq!(
            resolve_status(&tally(0, 1, 0), Some(&no_cards)).category,
            Category::Card
        );
    }

    #[test]
    fn test_card_vote_never_loses_a_tie() {
        // Any tally where card has votes and is not strictly behind wins as card,
        // and one more card vote keeps it there.
        for cash in 0..6 {
            for card in 0..6 {
                for giro in 0..6 {
                    let t = tally(cash, card, giro);
                    let status = resolve_status(&t, None).category;

                    if card > 0 && card >= cash && card >= giro {
                        assert_eq!(status, Category::Card, "tally {:?}", t);
                    }

                    let bumped = t.with_vote(Category::Card).unwrap();
                    if status == Category::Card {
                        assert_eq!(resolve_status(&bumped, None).category, Category::Card);
                    }
                }
            }
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("card".parse::<Category>(), Ok(Category::Card));
        assert_eq!("EC".parse::<Category>(), Ok(Category::Giro));
        assert_eq!("girocard".parse::<Category>(), Ok(Category::Giro));
        assert!("bitcoin".parse::<Category>().is_err());
    }

    #[test]
    fn test_filter() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!("cash".parse::<StatusFilter>(), Ok(StatusFilter::Cash));
        assert!("unknown".parse::<StatusFilter>().is_err());

        assert!(StatusFilter::All.matches(Category::Unknown));
        assert!(StatusFilter::Giro.matches(Category::Giro));
        assert!(!StatusFilter::Giro.matches(Category::Card));
    }
}
