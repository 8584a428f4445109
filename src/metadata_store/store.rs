//! SQLite-backed metadata store implementation.

use super::lock_accessor::{apply_changes, delete_all_locks, read_custom_fields};
use super::schema::METADATA_VERSIONED_SCHEMAS;
use super::trait_def::{FieldChange, MetadataStore};
use crate::metadata::{
    AgentRecord, CatalogItem, CustomField, EmbeddedRecord, MetadataLayers, ProviderResult,
    Resolver,
};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const AGENT_COLUMNS: &str = "id, source, external_id, title, subtitle, author, narrator,
    description, cover_url, series_name, series_sequence, release_date, isbn, asin,
    language, publisher, duration_sec, rating, rating_count, genres, created_at, updated_at";

/// SQLite-backed metadata store.
///
/// Writes go through a single connection behind a mutex, so mutations never
/// interleave. Reads use a separate read-only connection.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Create a new SqliteMetadataStore, creating or migrating the db at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open metadata database")?;

        migrate_if_needed(&mut write_conn, METADATA_VERSIONED_SCHEMAS, "metadata")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on metadata write connection")?;
        write_conn
            .pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys on metadata write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open metadata database for reading")?;

        let (items, agents, locks) = Self::count_rows(&read_conn)?;
        info!(
            "Metadata store ready: {} catalog items, {} agent records, {} locked fields",
            items, agents, locks
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    fn count_rows(conn: &Connection) -> Result<(usize, usize, usize)> {
        let items: usize = conn.query_row("SELECT COUNT(*) FROM catalog_items", [], |r| r.get(0))?;
        let agents: usize =
            conn.query_row("SELECT COUNT(*) FROM agent_records", [], |r| r.get(0))?;
        let locks: usize =
            conn.query_row("SELECT COUNT(*) FROM custom_fields", [], |r| r.get(0))?;
        Ok((items, agents, locks))
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn json_array(v: &[String]) -> Result<Option<String>> {
    if v.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(v)?))
}

fn parse_json_array(s: Option<String>) -> Vec<String> {
    s.map(|json| {
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Malformed genres JSON in metadata db: {}: {}", json, e);
            Vec::new()
        })
    })
    .unwrap_or_default()
}

fn agent_from_row(row: &Row) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        id: row.get(0)?,
        data: ProviderResult {
            source: row.get(1)?,
            external_id: row.get(2)?,
            title: row.get(3)?,
            subtitle: row.get(4)?,
            author: row.get(5)?,
            narrator: row.get(6)?,
            description: row.get(7)?,
            cover_url: row.get(8)?,
            series_name: row.get(9)?,
            series_sequence: row.get(10)?,
            release_date: row.get(11)?,
            isbn: row.get(12)?,
            asin: row.get(13)?,
            language: row.get(14)?,
            publisher: row.get(15)?,
            duration_sec: row.get(16)?,
            rating: row.get(17)?,
            rating_count: row.get(18)?,
            genres: parse_json_array(row.get(19)?),
        },
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn item_exists(conn: &Connection, item_id: &str) -> Result<bool> {
    let exists = conn
        .prepare_cached("SELECT 1 FROM catalog_items WHERE id = ?1")?
        .query_row(params![item_id], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(exists)
}

fn select_agent_by_id(conn: &Connection, id: i64) -> Result<Option<AgentRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM agent_records WHERE id = ?1",
        AGENT_COLUMNS
    ))?;
    Ok(stmt.query_row(params![id], agent_from_row).optional()?)
}

fn select_agent_by_key(
    conn: &Connection,
    source: &str,
    external_id: &str,
) -> Result<Option<AgentRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM agent_records WHERE source = ?1 AND external_id = ?2",
        AGENT_COLUMNS
    ))?;
    Ok(stmt
        .query_row(params![source, external_id], agent_from_row)
        .optional()?)
}

fn select_embedded(conn: &Connection, item_id: &str) -> Result<Option<EmbeddedRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT title, author, narrator, album, genre, year, track, comment,
                cover_data, cover_mime
         FROM embedded_records WHERE item_id = ?1",
    )?;
    let record = stmt
        .query_row(params![item_id], |row| {
            Ok(EmbeddedRecord {
                title: row.get(0)?,
                author: row.get(1)?,
                narrator: row.get(2)?,
                album: row.get(3)?,
                genre: row.get(4)?,
                year: row.get(5)?,
                track: row.get(6)?,
                comment: row.get(7)?,
                cover_data: row.get(8)?,
                cover_mime: row.get(9)?,
            })
        })
        .optional()?;
    Ok(record)
}

/// Upsert keyed on (source, external_id). Every item referencing the record
/// sees the new values on its next read.
fn upsert_agent(conn: &Connection, result: &ProviderResult, now: i64) -> Result<AgentRecord> {
    conn.prepare_cached(
        "INSERT INTO agent_records
         (source, external_id, title, subtitle, author, narrator, description, cover_url,
          series_name, series_sequence, release_date, isbn, asin, language, publisher,
          duration_sec, rating, rating_count, genres, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20, ?20)
         ON CONFLICT(source, external_id) DO UPDATE SET
            title = excluded.title,
            subtitle = excluded.subtitle,
            author = excluded.author,
            narrator = excluded.narrator,
            description = excluded.description,
            cover_url = excluded.cover_url,
            series_name = excluded.series_name,
            series_sequence = excluded.series_sequence,
            release_date = excluded.release_date,
            isbn = excluded.isbn,
            asin = excluded.asin,
            language = excluded.language,
            publisher = excluded.publisher,
            duration_sec = excluded.duration_sec,
            rating = excluded.rating,
            rating_count = excluded.rating_count,
            genres = excluded.genres,
            updated_at = excluded.updated_at",
    )?
    .execute(params![
        result.source,
        result.external_id,
        result.title,
        result.subtitle,
        result.author,
        result.narrator,
        result.description,
        result.cover_url,
        result.series_name,
        result.series_sequence,
        result.release_date,
        result.isbn,
        result.asin,
        result.language,
        result.publisher,
        result.duration_sec,
        result.rating,
        result.rating_count,
        json_array(&result.genres)?,
        now,
    ])?;

    select_agent_by_key(conn, &result.source, &result.external_id)?.with_context(|| {
        format!(
            "Agent record {}/{} missing right after upsert",
            result.source, result.external_id
        )
    })
}

fn load_layers(conn: &Connection, item_id: &str) -> Result<Option<MetadataLayers>> {
    let agent_record_id: Option<Option<i64>> = conn
        .prepare_cached("SELECT agent_record_id FROM catalog_items WHERE id = ?1")?
        .query_row(params![item_id], |row| row.get(0))
        .optional()?;
    let Some(agent_record_id) = agent_record_id else {
        return Ok(None);
    };

    let agent = match agent_record_id {
        Some(id) => select_agent_by_id(conn, id)?,
        None => None,
    };
    Ok(Some(MetadataLayers {
        item_id: item_id.to_string(),
        agent,
        embedded: select_embedded(conn, item_id)?,
        custom: read_custom_fields(conn, item_id)?,
    }))
}

impl MetadataStore for SqliteMetadataStore {
    fn create_item(&self, item_id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO catalog_items (id) VALUES (?1)",
            params![item_id],
        )?;
        Ok(inserted > 0)
    }

    fn item_exists(&self, item_id: &str) -> Result<bool> {
        let conn = self.read_conn.lock().unwrap();
        item_exists(&conn, item_id)
    }

    fn get_item(&self, item_id: &str) -> Result<Option<CatalogItem>> {
        let conn = self.read_conn.lock().unwrap();
        let item = conn
            .prepare_cached("SELECT id, agent_record_id, created_at FROM catalog_items WHERE id = ?1")?
            .query_row(params![item_id], |row| {
                Ok(CatalogItem {
                    id: row.get(0)?,
                    agent_record_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .optional()?;
        Ok(item)
    }

    fn delete_item(&self, item_id: &str) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM catalog_items WHERE id = ?1", params![item_id])?;
        Ok(deleted > 0)
    }

    fn upsert_agent_record(&self, result: &ProviderResult) -> Result<AgentRecord> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = upsert_agent(&tx, result, now_secs())?;
        tx.commit()?;
        Ok(record)
    }

    fn get_agent_record(&self, id: i64) -> Result<Option<AgentRecord>> {
        let conn = self.read_conn.lock().unwrap();
        select_agent_by_id(&conn, id)
    }

    fn find_agent_record(&self, source: &str, external_id: &str) -> Result<Option<AgentRecord>> {
        let conn = self.read_conn.lock().unwrap();
        select_agent_by_key(&conn, source, external_id)
    }

    fn prune_orphan_agent_records(&self) -> Result<usize> {
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM agent_records WHERE id NOT IN
             (SELECT agent_record_id FROM catalog_items WHERE agent_record_id IS NOT NULL)",
            [],
        )?;
        if deleted > 0 {
            info!("Pruned {} orphan agent records", deleted);
        }
        Ok(deleted)
    }

    fn get_embedded_record(&self, item_id: &str) -> Result<Option<EmbeddedRecord>> {
        let conn = self.read_conn.lock().unwrap();
        select_embedded(&conn, item_id)
    }

    fn upsert_embedded_record(&self, item_id: &str, record: &EmbeddedRecord) -> Result<bool> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !item_exists(&tx, item_id)? {
            return Ok(false);
        }
        tx.execute(
            "INSERT OR REPLACE INTO embedded_records
             (item_id, title, author, narrator, album, genre, year, track, comment,
              cover_data, cover_mime, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                item_id,
                record.title,
                record.author,
                record.narrator,
                record.album,
                record.genre,
                record.year,
                record.track,
                record.comment,
                record.cover_data,
                record.cover_mime,
                now_secs(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn get_custom_fields(&self, item_id: &str) -> Result<Vec<CustomField>> {
        let conn = self.read_conn.lock().unwrap();
        read_custom_fields(&conn, item_id)
    }

    fn apply_field_changes(
        &self,
        item_id: &str,
        changes: &[FieldChange],
        resolver: &Resolver,
    ) -> Result<Option<Vec<CustomField>>> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(before) = load_layers(&tx, item_id)? else {
            return Ok(None);
        };
        apply_changes(&tx, &before, changes, resolver, now_secs())?;
        let after = read_custom_fields(&tx, item_id)?;
        tx.commit()?;
        Ok(Some(after))
    }

    fn get_layers(&self, item_id: &str) -> Result<Option<MetadataLayers>> {
        let mut conn = self.read_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let layers = load_layers(&tx, item_id)?;
        tx.commit()?;
        Ok(layers)
    }

    fn link_agent_record(&self, item_id: &str, result: &ProviderResult) -> Result<Option<AgentRecord>> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !item_exists(&tx, item_id)? {
            return Ok(None);
        }
        let record = upsert_agent(&tx, result, now_secs())?;
        tx.execute(
            "UPDATE catalog_items SET agent_record_id = ?1 WHERE id = ?2",
            params![record.id, item_id],
        )?;
        tx.commit()?;
        info!(
            "Linked item {} to agent record {}/{}",
            item_id, record.data.source, record.data.external_id
        );
        Ok(Some(record))
    }

    fn unlink_agent_record(&self, item_id: &str, preserve_locked: bool) -> Result<bool> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = tx.execute(
            "UPDATE catalog_items SET agent_record_id = NULL WHERE id = ?1",
            params![item_id],
        )?;
        if updated == 0 {
            return Ok(false);
        }
        let cleared = if preserve_locked {
            0
        } else {
            delete_all_locks(&tx, item_id)?
        };
        tx.commit()?;
        info!(
            "Unlinked item {} from its agent record ({} custom fields cleared)",
            item_id, cleared
        );
        Ok(true)
    }

    fn add_item_files(&self, item_id: &str, paths: &[String]) -> Result<Option<usize>> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !item_exists(&tx, item_id)? {
            return Ok(None);
        }
        let mut added = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO item_files (item_id, path) VALUES (?1, ?2)",
            )?;
            for path in paths {
                added += stmt.execute(params![item_id, path])?;
            }
        }
        tx.commit()?;
        Ok(Some(added))
    }

    fn get_item_files(&self, item_id: &str) -> Result<Vec<String>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT path FROM item_files WHERE item_id = ?1 ORDER BY id")?;
        let paths = stmt
            .query_map(params![item_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }
}
