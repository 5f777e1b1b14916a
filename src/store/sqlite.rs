// 💾 SQLite Vote Store - Self-hosted backend with the same three tables
// WAL mode, insert-or-replace on the votes table, append-only suggestions.

use super::{BlacklistEntry, Report, ReportKind, VoteRecord, VoteStore};
use crate::error::DbError;
use crate::venue::VoteTally;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Lock)
    }

    /// Moderation hook: hide a venue from the map.
    pub fn add_to_blacklist(&self, venue_id: &str) -> Result<(), DbError> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO blacklist (venue_id) VALUES (?1)",
            params![venue_id],
        )?;
        Ok(())
    }

    /// Reports for one venue, newest first
    pub fn reports_for(&self, venue_id: &str) -> Result<Vec<Report>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT report_id, venue_id, name, kind, status, created_at
             FROM suggestions
             WHERE venue_id = ?1
             ORDER BY created_at DESC",
        )?;

        let reports = stmt
            .query_map(params![venue_id], |row| {
                let kind: String = row.get(3)?;
                let created_at: String = row.get(5)?;

                Ok(Report {
                    report_id: row.get(0)?,
                    venue_id: row.get(1)?,
                    name: row.get(2)?,
                    kind: kind.parse::<ReportKind>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                    })?,
                    status: row.get(4)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                        })?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reports)
    }

    /// Fill the votes table with `count` single-cash-vote rows (`node/0`, `node/1`, ...).
    #[cfg(test)]
    pub(crate) fn seed_votes(&self, count: usize) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for i in 0..count {
            tx.execute(
                "INSERT INTO votes (id, name, cash_votes, giro_votes, card_votes)
                 VALUES (?1, NULL, 1, 0, 0)",
                params![format!("node/{}", i)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), DbError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS votes (
            id TEXT PRIMARY KEY,
            name TEXT,
            cash_votes INTEGER NOT NULL DEFAULT 0 CHECK (cash_votes >= 0),
            giro_votes INTEGER NOT NULL DEFAULT 0 CHECK (giro_votes >= 0),
            card_votes INTEGER NOT NULL DEFAULT 0 CHECK (card_votes >= 0)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS blacklist (
            venue_id TEXT PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS suggestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id TEXT UNIQUE NOT NULL,
            venue_id TEXT NOT NULL,
            name TEXT,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_suggestions_venue ON suggestions(venue_id)",
        [],
    )?;

    Ok(())
}

#[async_trait]
impl VoteStore for SqliteStore {
    async fn fetch_votes_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<VoteRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, cash_votes, card_votes, giro_votes
             FROM votes
             ORDER BY id
             LIMIT ?1 OFFSET ?2",
        )?;

        let records = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok(VoteRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    tally: VoteTally::new(row.get(2)?, row.get(3)?, row.get(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn fetch_blacklist(&self) -> Result<Vec<BlacklistEntry>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT venue_id FROM blacklist")?;

        let entries = stmt
            .query_map([], |row| {
                Ok(BlacklistEntry {
                    venue_id: row.get(0)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    async fn upsert_vote(&self, record: &VoteRecord) -> Result<(), DbError> {
        self.conn()?.execute(
            "INSERT INTO votes (id, name, cash_votes, giro_votes, card_votes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                cash_votes = excluded.cash_votes,
                giro_votes = excluded.giro_votes,
                card_votes = excluded.card_votes",
            params![
                record.id,
                record.name,
                record.tally.cash_votes,
                record.tally.giro_votes,
                record.tally.card_votes,
            ],
        )?;
        Ok(())
    }

    async fn insert_report(&self, report: &Report) -> Result<(), DbError> {
        self.conn()?.execute(
            "INSERT INTO suggestions (report_id, venue_id, name, kind, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.report_id,
                report.venue_id,
                report.name,
                report.kind.as_str(),
                report.status,
                report.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tally: VoteTally) -> VoteRecord {
        VoteRecord {
            id: id.to_string(),
            name: Some("Test Venue".to_string()),
            tally,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_whole_row() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .upsert_vote(&record("node/1", VoteTally::new(3, 1, 2)))
            .await
            .unwrap();
        store
            .upsert_vote(&record("node/1", VoteTally::new(0, 5, 0)))
            .await
            .unwrap();

        let rows = store.fetch_votes_page(0, 10).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tally, VoteTally::new(0, 5, 0));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let vote = record("way/9", VoteTally::new(0, 0, 1));

        store.upsert_vote(&vote).await.unwrap();
        store.upsert_vote(&vote).await.unwrap();

        let rows = store.fetch_votes_page(0, 10).await.unwrap();
        assert_eq!(rows, vec![vote]);
    }

    #[tokio::test]
    async fn test_pages_follow_offset() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.seed_votes(25).unwrap();

        let first = store.fetch_votes_page(0, 10).await.unwrap();
        let last = store.fetch_votes_page(20, 10).await.unwrap();
        let past_end = store.fetch_votes_page(30, 10).await.unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(last.len(), 5);
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_reports_are_appended() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = Report::new("node/3", Some("Tambosi"), ReportKind::Closed);
        let second = Report::new("node/3", Some("Tambosi"), ReportKind::Closed);
        store.insert_report(&first).await.unwrap();
        store.insert_report(&second).await.unwrap();

        let reports = store.reports_for("node/3").unwrap();

        assert_eq!(reports.len(), 2, "duplicate reports are not deduplicated");
        assert!(reports.iter().all(|r| r.kind == ReportKind::Closed));
        assert!(reports.iter().all(|r| r.status == "pending"));
    }

    #[test]
    fn test_unrecognised_report_kind_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO suggestions (report_id, venue_id, name, kind, status, created_at)
                 VALUES ('r-1', 'node/8', NULL, 'haunted', 'pending', '2024-05-01T12:00:00+00:00')",
                [],
            )
            .unwrap();

        let result = store.reports_for("node/8");

        assert!(matches!(
            result,
            Err(DbError::Sqlite(rusqlite::Error::FromSqlConversionFailure(3, _, _)))
        ));
    }

    #[tokio::test]
    async fn test_blacklist_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_to_blacklist("node/66").unwrap();
        store.add_to_blacklist("node/66").unwrap();

        let entries = store.fetch_blacklist().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].venue_id, "node/66");
    }
}
