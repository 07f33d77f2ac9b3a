//! Transcript repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Manage the `transcripts` table that owns every content row.
//!
//! # Invariants
//! - Deleting a transcript cascades to its content rows (enforced by the
//!   schema, requires `foreign_keys=ON`).

use crate::repo::{ensure_migrated, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const TRANSCRIPT_SELECT_SQL: &str = "SELECT
    id,
    title,
    created_at,
    updated_at
FROM transcripts";

/// A stored transcript. Timestamps are unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub id: i64,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Repository interface for transcript CRUD operations.
pub trait TranscriptRepository {
    fn create_transcript(&self, title: &str) -> RepoResult<i64>;
    fn get_transcript(&self, id: i64) -> RepoResult<Option<Transcript>>;
    fn list_transcripts(&self) -> RepoResult<Vec<Transcript>>;
    fn update_title(&self, id: i64, title: &str) -> RepoResult<()>;
    fn delete_transcript(&self, id: i64) -> RepoResult<()>;
}

/// SQLite-backed transcript repository.
pub struct SqliteTranscriptRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTranscriptRepository<'conn> {
    /// Wraps a connection after verifying its schema has been migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl TranscriptRepository for SqliteTranscriptRepository<'_> {
    fn create_transcript(&self, title: &str) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO transcripts (title) VALUES (?1);",
            [title],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_transcript(&self, id: i64) -> RepoResult<Option<Transcript>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRANSCRIPT_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_transcript_row(row)?));
        }

        Ok(None)
    }

    fn list_transcripts(&self) -> RepoResult<Vec<Transcript>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSCRIPT_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut transcripts = Vec::new();

        while let Some(row) = rows.next()? {
            transcripts.push(parse_transcript_row(row)?);
        }

        Ok(transcripts)
    }

    fn update_title(&self, id: i64, title: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE transcripts SET title = ?1 WHERE id = ?2;",
            params![title, id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn delete_transcript(&self, id: i64) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM transcripts WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }

        Ok(())
    }
}

fn parse_transcript_row(row: &Row<'_>) -> RepoResult<Transcript> {
    Ok(Transcript {
        id: row.get("id")?,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
