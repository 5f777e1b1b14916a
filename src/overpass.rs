// 🗺️ Venue Acquisition - One bounded-area query against the Overpass API
//
// A response without venues is a failure, not an empty city: Overpass answers
// 200 with an empty element list when it times out server-side.

use crate::error::FetchError;
use crate::venue::{GeoPoint, Venue};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Amenity kinds queried by default
pub const DEFAULT_AMENITIES: [&str; 8] = [
    "bar",
    "pub",
    "cafe",
    "biergarten",
    "restaurant",
    "fast_food",
    "nightclub",
    "ice_cream",
];

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Greater Munich
    pub const MUNICH: BoundingBox = BoundingBox {
        south: 48.061,
        west: 11.360,
        north: 48.248,
        east: 11.723,
    };
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::MUNICH
    }
}

impl fmt::Display for BoundingBox {
    /// Overpass order: south,west,north,east
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid coordinate in '{}': {}", s, e))?;

        let [south, west, north, east] = parts[..] else {
            return Err(format!("expected south,west,north,east but got '{}'", s));
        };

        if south >= north || west >= east {
            return Err(format!("empty bounding box '{}'", s));
        }

        Ok(BoundingBox {
            south,
            west,
            north,
            east,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmenityFilter {
    kinds: Vec<String>,
}

impl AmenityFilter {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AmenityFilter {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    /// Anchored alternation for an Overpass `~` match
    fn pattern(&self) -> String {
        format!("^({})$", self.kinds.join("|"))
    }
}

impl Default for AmenityFilter {
    fn default() -> Self {
        AmenityFilter::new(DEFAULT_AMENITIES)
    }
}

/// Overpass QL for all matching nodes and ways inside `bbox`.
/// Ways are reduced to their center point.
pub fn build_query(bbox: &BoundingBox, amenities: &AmenityFilter) -> String {
    let pattern = amenities.pattern();
    format!(
        "[out:json][timeout:25];\n(\n  node[\"amenity\"~\"{p}\"]({b});\n  way[\"amenity\"~\"{p}\"]({b});\n);\nout center tags;",
        p = pattern,
        b = bbox
    )
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

#[derive(Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassElement {
    fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Some(GeoPoint { lat, lon }),
            (_, _, Some(center)) => Some(GeoPoint {
                lat: center.lat,
                lon: center.lon,
            }),
            _ => None,
        }
    }

    fn into_venue(self) -> Option<Venue> {
        let location = self.location()?;
        let mut venue = Venue::new(format!("{}/{}", self.element_type, self.id), location);
        venue.name = self.tags.get("name").cloned();
        venue.tags = self.tags;
        Some(venue)
    }
}

/// Parse an Overpass JSON body into venues.
///
/// Elements without a position are skipped. Fails on malformed JSON and when
/// nothing usable is left.
pub fn parse_venues(body: &str) -> Result<Vec<Venue>, FetchError> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let total = response.elements.len();
    let venues: Vec<Venue> = response
        .elements
        .into_iter()
        .filter_map(OverpassElement::into_venue)
        .collect();

    if venues.len() < total {
        debug!(skipped = total - venues.len(), "elements without coordinates");
    }

    if venues.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(venues)
}

// ============================================================================
// VENUE SOURCE
// ============================================================================

#[async_trait]
pub trait VenueSource: Send + Sync {
    async fn fetch_venues(
        &self,
        bbox: &BoundingBox,
        amenities: &AmenityFilter,
    ) -> Result<Vec<Venue>, FetchError>;
}

pub struct OverpassClient {
    client: reqwest::Client,
    url: String,
}

impl OverpassClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(OverpassClient {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl VenueSource for OverpassClient {
    async fn fetch_venues(
        &self,
        bbox: &BoundingBox,
        amenities: &AmenityFilter,
    ) -> Result<Vec<Venue>, FetchError> {
        let query = build_query(bbox, amenities);
        debug!(url = %self.url, "querying venue source");

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let snippet: String = body.chars().take(256).collect();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let venues = parse_venues(&body)?;
        info!(count = venues.len(), "venues fetched");
        Ok(venues)
    }
}

// ============================================================================
// TESTS
// ============================================================================
