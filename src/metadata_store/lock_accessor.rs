//! Reads and writes per-field lock state in the custom tier.
//!
//! All functions expect to run inside the caller's transaction.

use super::trait_def::{FieldChange, LockValue};
use crate::metadata::{CustomField, MetadataField, MetadataLayers, Resolver};
use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::{debug, warn};

pub(super) fn read_custom_fields(conn: &Connection, item_id: &str) -> Result<Vec<CustomField>> {
    let mut stmt = conn.prepare_cached(
        "SELECT field, value, locked FROM custom_fields WHERE item_id = ?1 ORDER BY field",
    )?;
    let rows = stmt.query_map(params![item_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)? != 0,
        ))
    })?;

    let mut fields = Vec::new();
    for row in rows {
        let (name, value, locked) = row?;
        match name.parse::<MetadataField>() {
            Ok(field) => fields.push(CustomField {
                field,
                value,
                locked,
            }),
            Err(e) => warn!("Skipping custom field of item {}: {}", item_id, e),
        }
    }
    Ok(fields)
}

/// Sets `field` locked to `value`. Leaves the row untouched when it already
/// holds exactly that locked value.
fn write_lock(
    conn: &Connection,
    item_id: &str,
    field: MetadataField,
    value: &str,
    now: i64,
) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO custom_fields (item_id, field, value, locked, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT(item_id, field) DO UPDATE SET
            value = excluded.value,
            locked = 1,
            updated_at = excluded.updated_at
         WHERE custom_fields.value IS NOT excluded.value OR custom_fields.locked = 0",
    )?
    .execute(params![item_id, field.as_str(), value, now])?;
    Ok(())
}

fn delete_lock(conn: &Connection, item_id: &str, field: MetadataField) -> Result<()> {
    conn.prepare_cached("DELETE FROM custom_fields WHERE item_id = ?1 AND field = ?2")?
        .execute(params![item_id, field.as_str()])?;
    Ok(())
}

pub(super) fn delete_all_locks(conn: &Connection, item_id: &str) -> Result<usize> {
    let deleted = conn
        .prepare_cached("DELETE FROM custom_fields WHERE item_id = ?1")?
        .execute(params![item_id])?;
    Ok(deleted)
}

/// Applies `changes` to the item described by `before`.
///
/// Snapshot locks read from `before`: a field already locked keeps its stored
/// text byte for byte, an unlocked one freezes its cascade value.
pub(super) fn apply_changes(
    conn: &Connection,
    before: &MetadataLayers,
    changes: &[FieldChange],
    resolver: &Resolver,
    now: i64,
) -> Result<()> {
    let item_id = before.item_id.as_str();
    for change in changes {
        match change {
            FieldChange::Lock { field, value } => {
                let value = match value {
                    LockValue::Explicit(v) => v.clone(),
                    LockValue::Snapshot => match before.custom_field(*field) {
                        // Already locked: keep the stored text as written.
                        Some(existing) if existing.locked => existing.value.clone(),
                        _ => resolver
                            .effective_value(
                                *field,
                                before.agent.as_ref(),
                                before.embedded.as_ref(),
                                &before.custom,
                            )
                            .map(|v| v.to_custom_string())
                            .unwrap_or_default(),
                    },
                };
                debug!("Locking {}.{} to {:?}", item_id, field, value);
                write_lock(conn, item_id, *field, &value, now)?;
            }
            FieldChange::Unlock { field } => {
                debug!("Unlocking {}.{}", item_id, field);
                delete_lock(conn, item_id, *field)?;
            }
            FieldChange::ClearAll => {
                let deleted = delete_all_locks(conn, item_id)?;
                debug!("Cleared {} custom fields of {}", deleted, item_id);
            }
        }
    }
    Ok(())
}
