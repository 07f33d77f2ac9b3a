//! Content repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `contents` storage.
//! - Offer an atomic full-replace save path for whole-document flushes.
//!
//! # Invariants
//! - `save_all` replaces every row of a transcript inside one transaction;
//!   a failure leaves the previous rows untouched.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::record::{ContentKind, ContentRecord};
use crate::repo::{ensure_migrated, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const CONTENT_SELECT_SQL: &str = "SELECT
    id,
    transcript_id,
    content,
    content_type,
    order_index
FROM contents";

/// Repository interface for content row persistence.
pub trait ContentRepository {
    fn insert_content(&self, record: &ContentRecord) -> RepoResult<()>;
    fn update_content(&self, record: &ContentRecord) -> RepoResult<()>;
    fn delete_content(&self, id: &str) -> RepoResult<()>;
    /// Replaces every row of `transcript_id` with `records`, atomically.
    fn save_all(&self, transcript_id: i64, records: &[ContentRecord]) -> RepoResult<()>;
    fn load_contents(&self, transcript_id: i64) -> RepoResult<Vec<ContentRecord>>;
}

/// SQLite-backed content repository.
#[derive(Debug)]
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Wraps a connection after verifying its schema has been migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn insert_content(&self, record: &ContentRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO contents (
                id,
                transcript_id,
                content,
                content_type,
                order_index
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                record.id.as_str(),
                record.transcript_id,
                record.content.as_str(),
                content_kind_to_db(record.content_type),
                record.order_index,
            ],
        )?;

        Ok(())
    }

    fn update_content(&self, record: &ContentRecord) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE contents
             SET
                content = ?1,
                content_type = ?2,
                order_index = ?3
             WHERE id = ?4;",
            params![
                record.content.as_str(),
                content_kind_to_db(record.content_type),
                record.order_index,
                record.id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(record.id.clone()));
        }

        Ok(())
    }

    fn delete_content(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contents WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn save_all(&self, transcript_id: i64, records: &[ContentRecord]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM contents WHERE transcript_id = ?1;",
            [transcript_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO contents (
                    id,
                    transcript_id,
                    content,
                    content_type,
                    order_index
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;

            for record in records {
                stmt.execute(params![
                    record.id.as_str(),
                    transcript_id,
                    record.content.as_str(),
                    content_kind_to_db(record.content_type),
                    record.order_index,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_contents(&self, transcript_id: i64) -> RepoResult<Vec<ContentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTENT_SELECT_SQL}
             WHERE transcript_id = ?1
             ORDER BY order_index ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([transcript_id])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_content_row(row)?);
        }

        Ok(records)
    }
}

fn parse_content_row(row: &Row<'_>) -> RepoResult<ContentRecord> {
    let type_text: String = row.get("content_type")?;
    let content_type = parse_content_kind(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid content type `{type_text}` in contents.content_type"
        ))
    })?;

    Ok(ContentRecord {
        id: row.get("id")?,
        transcript_id: row.get("transcript_id")?,
        content: row.get("content")?,
        content_type,
        order_index: row.get("order_index")?,
    })
}

fn content_kind_to_db(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Text => "text",
        ContentKind::Headline => "headline",
        ContentKind::Linebreak => "linebreak",
    }
}

fn parse_content_kind(value: &str) -> Option<ContentKind> {
    match value {
        "text" => Some(ContentKind::Text),
        "headline" => Some(ContentKind::Headline),
        "linebreak" => Some(ContentKind::Linebreak),
        _ => None,
    }
}
