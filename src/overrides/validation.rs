//! Validation of override mutations and provider input.
//!
//! Everything here runs before a transaction is opened, so a rejected request
//! never touches the store.

use super::errors::{ValidationError, ValidationResult};
use crate::metadata::{parse_custom, FieldOverride, MetadataField, ProviderResult};
use crate::metadata_store::{FieldChange, LockValue};
use std::collections::{BTreeMap, BTreeSet};

pub fn parse_field_name(name: &str) -> ValidationResult<MetadataField> {
    Ok(name.parse::<MetadataField>()?)
}

/// Turns a lock toggle into the change it stands for.
///
/// `locked` with a value locks to that value, `locked` without one snapshots
/// the current effective value, and unlocked without a value unlocks. An
/// unlocked value is rejected.
pub fn validate_lock_request(
    field: MetadataField,
    locked: bool,
    value: Option<&str>,
) -> ValidationResult<FieldChange> {
    match (locked, value) {
        (true, Some(v)) => {
            parse_custom(field, v)?;
            Ok(FieldChange::Lock {
                field,
                value: LockValue::Explicit(v.to_string()),
            })
        }
        (true, None) => Ok(FieldChange::Lock {
            field,
            value: LockValue::Snapshot,
        }),
        (false, Some(_)) => Err(ValidationError::ValueWithoutLock { field }),
        (false, None) => Ok(FieldChange::Unlock { field }),
    }
}

/// Validates every entry of a batch. Fails on the first bad entry, so the
/// batch is applied whole or not at all. Keys are matched the way field names
/// are parsed, so two spellings of one field are a duplicate.
pub fn validate_batch(
    overrides: &BTreeMap<String, FieldOverride>,
) -> ValidationResult<Vec<FieldChange>> {
    if overrides.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    let mut seen = BTreeSet::new();
    overrides
        .iter()
        .map(|(name, entry)| {
            let field = parse_field_name(name)?;
            if !seen.insert(field) {
                return Err(ValidationError::DuplicateField { field });
            }
            validate_lock_request(field, entry.locked, entry.value.as_deref())
        })
        .collect()
}

pub fn validate_item_id(item_id: &str) -> ValidationResult<()> {
    if item_id.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "item_id" });
    }
    Ok(())
}

/// Validate a provider result before it becomes an agent record
pub fn validate_provider_result(result: &ProviderResult) -> ValidationResult<()> {
    if result.source.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "source" });
    }
    if result.external_id.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "externalID",
        });
    }
    let integers = [
        (MetadataField::DurationSec, result.duration_sec),
        (MetadataField::RatingCount, result.rating_count),
    ];
    for (field, value) in integers {
        if let Some(v) = value.filter(|v| *v < 0) {
            return Err(ValidationError::NegativeNumber {
                field,
                value: v.to_string(),
            });
        }
    }
    if let Some(rating) = result.rating {
        if !rating.is_finite() {
            return Err(ValidationError::InvalidNumber {
                field: MetadataField::Rating,
                value: rating.to_string(),
            });
        }
        if rating < 0.0 {
            return Err(ValidationError::NegativeNumber {
                field: MetadataField::Rating,
                value: rating.to_string(),
            });
        }
    }
    Ok(())
}
