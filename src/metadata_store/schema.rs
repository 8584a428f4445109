//! SQLite schema definitions for the metadata database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const AGENT_RECORD_FK: ForeignKey = ForeignKey {
    foreign_table: "agent_records",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const CATALOG_ITEM_FK: ForeignKey = ForeignKey {
    foreign_table: "catalog_items",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// Provider records, shared between catalog items.
const AGENT_RECORDS_TABLE: Table = Table {
    name: "agent_records",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("source", &SqlType::Text, non_null = true),
        sqlite_column!("external_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("subtitle", &SqlType::Text),
        sqlite_column!("author", &SqlType::Text),
        sqlite_column!("narrator", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("cover_url", &SqlType::Text),
        sqlite_column!("series_name", &SqlType::Text),
        sqlite_column!("series_sequence", &SqlType::Text),
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("isbn", &SqlType::Text),
        sqlite_column!("asin", &SqlType::Text),
        sqlite_column!("language", &SqlType::Text),
        sqlite_column!("publisher", &SqlType::Text),
        sqlite_column!("duration_sec", &SqlType::Integer),
        sqlite_column!("rating", &SqlType::Real),
        sqlite_column!("rating_count", &SqlType::Integer),
        sqlite_column!("genres", &SqlType::Text), // JSON array
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["source", "external_id"]],
};

const CATALOG_ITEMS_TABLE: Table = Table {
    name: "catalog_items",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "agent_record_id",
            &SqlType::Integer,
            foreign_key = Some(&AGENT_RECORD_FK)
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_catalog_items_agent_record", "agent_record_id")],
    unique_constraints: &[],
};

/// Raw file tags, 1:1 with catalog items.
const EMBEDDED_RECORDS_TABLE: Table = Table {
    name: "embedded_records",
    columns: &[
        sqlite_column!(
            "item_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&CATALOG_ITEM_FK)
        ),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("author", &SqlType::Text),
        sqlite_column!("narrator", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("year", &SqlType::Text),
        sqlite_column!("track", &SqlType::Text),
        sqlite_column!("comment", &SqlType::Text),
        sqlite_column!("cover_data", &SqlType::Blob),
        sqlite_column!("cover_mime", &SqlType::Text),
        sqlite_column!("extracted_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Per-item field locks. A row exists only while the field is locked.
const CUSTOM_FIELDS_TABLE: Table = Table {
    name: "custom_fields",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "item_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&CATALOG_ITEM_FK)
        ),
        sqlite_column!("field", &SqlType::Text, non_null = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!(
            "locked",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["item_id", "field"]],
};

/// Constituent media files of an item.
const ITEM_FILES_TABLE: Table = Table {
    name: "item_files",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "item_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&CATALOG_ITEM_FK)
        ),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!(
            "added_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["item_id", "path"]],
};

pub const METADATA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        AGENT_RECORDS_TABLE,
        CATALOG_ITEMS_TABLE,
        EMBEDDED_RECORDS_TABLE,
        CUSTOM_FIELDS_TABLE,
        ITEM_FILES_TABLE,
    ],
    migration: None,
}];
