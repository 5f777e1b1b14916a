// 📤 CSV Export - Resolved venues, one row each

use crate::venue::Venue;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct VenueRow<'a> {
    id: &'a str,
    name: &'a str,
    lat: f64,
    lon: f64,
    category: &'static str,
    cash_votes: u32,
    card_votes: u32,
    giro_votes: u32,
}

impl<'a> From<&'a Venue> for VenueRow<'a> {
    fn from(venue: &'a Venue) -> Self {
        VenueRow {
            id: &venue.id,
            name: venue.name.as_deref().unwrap_or(""),
            lat: venue.location.lat,
            lon: venue.location.lon,
            category: venue.category().as_str(),
            cash_votes: venue.tally.cash_votes,
            card_votes: venue.tally.card_votes,
            giro_votes: venue.tally.giro_votes,
        }
    }
}

/// Write `venues` as CSV (with header) to any writer. Returns the row count.
pub fn write_csv<'a, W, I>(writer: W, venues: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Venue>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for venue in venues {
        wtr.serialize(VenueRow::from(venue))
            .with_context(|| format!("Failed to write row for {}", venue.id))?;
        rows += 1;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}

pub fn export_csv<'a, I>(path: &Path, venues: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Venue>,
{
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {:?}", path))?;
    write_csv(file, venues)
}
