//! End-to-end behavior of field locking and resolution through MetadataService.

mod common;

use common::*;
use pezzottify_metadata::metadata::{
    CustomField, EmbeddedRecord, FieldOverride, MetadataField, ProviderResult, ResolvedMetadata,
    Resolver,
};
use pezzottify_metadata::{MetadataError, MetadataStore, TagExtractor, ValidationError};
use std::collections::BTreeMap;
use std::path::Path;

struct StaticTags(EmbeddedRecord);

impl TagExtractor for StaticTags {
    fn extract(&self, _path: &Path) -> anyhow::Result<Option<EmbeddedRecord>> {
        Ok(Some(self.0.clone()))
    }
}

fn embedded_tags() -> EmbeddedRecord {
    EmbeddedRecord {
        title: Some("dune_part1".to_string()),
        author: Some("F. Herbert".to_string()),
        narrator: Some("Unknown Reader".to_string()),
        album: Some("Dune".to_string()),
        ..Default::default()
    }
}

fn locked(field: MetadataField, value: &str) -> CustomField {
    CustomField {
        field,
        value: value.to_string(),
        locked: true,
    }
}

// =========================================================================
// Resolution
// =========================================================================

#[test]
fn test_locked_author_wins_over_agent() {
    let env = TestEnv::with_item(ITEM_1_ID);
    let result = ProviderResult {
        source: PROVIDER_NAME.to_string(),
        external_id: "A1".to_string(),
        title: Some("A".to_string()),
        author: Some("B".to_string()),
        ..Default::default()
    };
    env.service.link(ITEM_1_ID, &result).unwrap();
    env.service.edit(ITEM_1_ID, "author", "C").unwrap();

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some("A"));
    assert_eq!(resolved.author.as_deref(), Some("C"));
    assert_eq!(resolved.narrator, None);
    assert_eq!(resolved.source.as_deref(), Some(PROVIDER_NAME));
    assert_eq!(resolved.external_id.as_deref(), Some("A1"));
}

#[test]
fn test_fresh_item_resolves_empty() {
    let env = TestEnv::with_item(ITEM_1_ID);
    let resolution = env.service.get_resolution(ITEM_1_ID).unwrap();
    assert_eq!(resolution.metadata, ResolvedMetadata::default());
    assert!(resolution.sources.is_empty());
}

#[test]
fn test_resolution_is_pure() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "subtitle", "Book One").unwrap();

    let first = env.service.get_resolution(ITEM_1_ID).unwrap();
    let second = env.service.get_resolution(ITEM_1_ID).unwrap();
    assert_eq!(first, second);

    let layers = env.service.get_layers(ITEM_1_ID).unwrap();
    let resolver = env.service.resolver();
    assert_eq!(resolver.resolve_layers(&layers), resolver.resolve_layers(&layers));
}

#[test]
fn test_embedded_fills_gaps_below_agent() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    let tags = StaticTags(EmbeddedRecord {
        comment: Some("Set on the desert planet Arrakis".to_string()),
        ..embedded_tags()
    });
    env.service
        .import_embedded(ITEM_1_ID, &tags, Path::new("dune_part1.m4b"))
        .unwrap();

    let resolution = env.service.get_resolution(ITEM_1_ID).unwrap();
    assert_eq!(resolution.metadata.title.as_deref(), Some(DUNE_TITLE));
    assert_eq!(
        resolution.metadata.description.as_deref(),
        Some("Set on the desert planet Arrakis")
    );
    assert_eq!(
        resolution.sources[&MetadataField::Description].label(),
        "from file tags"
    );
    assert_eq!(
        resolution.sources[&MetadataField::Title].label(),
        format!("from {}", PROVIDER_NAME)
    );
}

#[test]
fn test_parsed_tier_contributes_nothing_yet() {
    let resolver = Resolver::new(vec![
        pezzottify_metadata::Tier::Parsed,
        pezzottify_metadata::Tier::Agent,
    ])
    .unwrap();
    let env = TestEnv::with_resolver(resolver);
    env.service.create_item(ITEM_1_ID).unwrap();
    env.service.link(ITEM_1_ID, &dune_result()).unwrap();

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some(DUNE_TITLE));
}

// =========================================================================
// Lock Idempotence
// =========================================================================

#[test]
fn test_lock_twice_is_noop() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);

    let first = env
        .service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();
    let second = env
        .service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, vec![locked(MetadataField::Title, DUNE_TITLE)]);
}

#[test]
fn test_relock_keeps_stored_text_verbatim() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    let written = [
        ("genres", "Sci-Fi;Classics"),
        ("rating", "4.50"),
        ("durationSec", "007"),
        ("subtitle", "   "),
    ];
    for (field, value) in written {
        env.service.edit(ITEM_1_ID, field, value).unwrap();
    }
    let before = env.service.get_layers(ITEM_1_ID).unwrap().custom;

    for (field, value) in written {
        let fields = env
            .service
            .set_lock(ITEM_1_ID, field, true, None)
            .unwrap();
        assert_eq!(fields, before);

        let parsed = field.parse::<MetadataField>().unwrap();
        let layers = env.service.get_layers(ITEM_1_ID).unwrap();
        assert_eq!(layers.custom_field(parsed), Some(&locked(parsed, value)));
    }

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.duration_sec, Some(7));
    assert_eq!(resolved.rating, Some(4.5));
}

#[test]
fn test_relock_keeps_locked_value_not_agent_value() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "narrator", "X").unwrap();

    let fields = env
        .service
        .set_lock(ITEM_1_ID, "narrator", true, None)
        .unwrap();
    assert_eq!(fields, vec![locked(MetadataField::Narrator, "X")]);
}

// =========================================================================
// Unlock
// =========================================================================

#[test]
fn test_unlock_clears_entry_and_restores_cascade() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "narrator", "X").unwrap();
    env.service.edit(ITEM_1_ID, "title", "Custom Title").unwrap();

    let fields = env
        .service
        .set_lock(ITEM_1_ID, "narrator", false, None)
        .unwrap();
    assert_eq!(fields, vec![locked(MetadataField::Title, "Custom Title")]);

    let layers = env.service.get_layers(ITEM_1_ID).unwrap();
    assert!(layers.custom_field(MetadataField::Narrator).is_none());
    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.narrator.as_deref(), Some(DUNE_NARRATOR));
}

#[test]
fn test_unlock_with_value_rejected() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "narrator", "X").unwrap();

    let result = env
        .service
        .set_lock(ITEM_1_ID, "narrator", false, Some("Y".to_string()));
    assert!(matches!(
        result,
        Err(MetadataError::Validation(
            ValidationError::ValueWithoutLock { .. }
        ))
    ));
    assert_eq!(
        env.service.get_layers(ITEM_1_ID).unwrap().custom,
        vec![locked(MetadataField::Narrator, "X")]
    );
}

#[test]
fn test_unlock_of_unlocked_field_is_harmless() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    let fields = env
        .service
        .set_lock(ITEM_1_ID, "isbn", false, None)
        .unwrap();
    assert!(fields.is_empty());
}

// =========================================================================
// Snapshot On Lock
// =========================================================================

#[test]
fn test_lock_snapshots_agent_title() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);

    env.service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some(DUNE_TITLE));
    let layers = env.service.get_layers(ITEM_1_ID).unwrap();
    assert_eq!(
        layers.custom_field(MetadataField::Title),
        Some(&locked(MetadataField::Title, DUNE_TITLE))
    );
}

#[test]
fn test_snapshot_survives_agent_update() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service
        .set_lock(ITEM_1_ID, "durationSec", true, None)
        .unwrap();
    env.service
        .set_lock(ITEM_1_ID, "genres", true, None)
        .unwrap();

    let mut updated = dune_result();
    updated.duration_sec = Some(1);
    updated.genres = vec!["Fantasy".to_string()];
    env.store.upsert_agent_record(&updated).unwrap();

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.duration_sec, Some(75_600));
    assert_eq!(resolved.genres, vec!["Science Fiction".to_string()]);
}

#[test]
fn test_snapshot_of_missing_value_locks_empty() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service
        .set_lock(ITEM_1_ID, "publisher", true, None)
        .unwrap();

    let mut updated = dune_result();
    updated.publisher = Some("Macmillan Audio".to_string());
    env.store.upsert_agent_record(&updated).unwrap();

    let layers = env.service.get_layers(ITEM_1_ID).unwrap();
    assert_eq!(
        layers.custom_field(MetadataField::Publisher),
        Some(&locked(MetadataField::Publisher, ""))
    );
    assert_eq!(env.service.get_resolved(ITEM_1_ID).unwrap().publisher, None);
}

// =========================================================================
// Relink and Unlink
// =========================================================================

#[test]
fn test_lock_survives_relink() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "narrator", "X").unwrap();

    let relinked = ProviderResult {
        narrator: Some("Y".to_string()),
        ..dune_result()
    };
    for _ in 0..3 {
        env.service.link(ITEM_1_ID, &relinked).unwrap();
    }

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.narrator.as_deref(), Some("X"));
    let layers = env.service.get_layers(ITEM_1_ID).unwrap();
    assert_eq!(
        layers.agent.unwrap().data.narrator.as_deref(),
        Some("Y")
    );
}

#[test]
fn test_unlink_preserving_locks() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service
        .import_embedded(ITEM_1_ID, &StaticTags(embedded_tags()), Path::new("a.m4b"))
        .unwrap();
    env.service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();
    env.service
        .set_lock(ITEM_1_ID, "narrator", true, None)
        .unwrap();

    env.service.unlink(ITEM_1_ID, true).unwrap();

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some(DUNE_TITLE));
    assert_eq!(resolved.narrator.as_deref(), Some(DUNE_NARRATOR));
    // Unlocked fields now fall back to the file tags.
    assert_eq!(resolved.author.as_deref(), Some("F. Herbert"));
    assert_eq!(resolved.source, None);
}

#[test]
fn test_unlink_clearing_locks() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service
        .import_embedded(ITEM_1_ID, &StaticTags(embedded_tags()), Path::new("a.m4b"))
        .unwrap();
    env.service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();
    env.service
        .set_lock(ITEM_1_ID, "narrator", true, None)
        .unwrap();

    env.service.unlink(ITEM_1_ID, false).unwrap();

    assert!(env.service.get_layers(ITEM_1_ID).unwrap().custom.is_empty());
    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some("dune_part1"));
    assert_eq!(resolved.narrator.as_deref(), Some("Unknown Reader"));
}

#[test]
fn test_unlink_without_tags_reverts_to_empty() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service
        .set_lock(ITEM_1_ID, "title", true, None)
        .unwrap();
    env.service.unlink(ITEM_1_ID, false).unwrap();

    let resolution = env.service.get_resolution(ITEM_1_ID).unwrap();
    assert_eq!(resolution.metadata, ResolvedMetadata::default());
}

#[test]
fn test_shared_agent_record_between_items() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.create_item(ITEM_2_ID).unwrap();
    env.service.link(ITEM_2_ID, &dune_result()).unwrap();
    env.service.edit(ITEM_2_ID, "title", "Dune (Dramatized)").unwrap();

    let mut updated = dune_result();
    updated.title = Some("Dune: Deluxe Edition".to_string());
    env.service.link(ITEM_1_ID, &updated).unwrap();

    assert_eq!(
        env.service.get_resolved(ITEM_1_ID).unwrap().title.as_deref(),
        Some("Dune: Deluxe Edition")
    );
    assert_eq!(
        env.service.get_resolved(ITEM_2_ID).unwrap().title.as_deref(),
        Some("Dune (Dramatized)")
    );
    assert_eq!(
        env.service.get_resolved(ITEM_2_ID).unwrap().agent_id,
        env.service.get_resolved(ITEM_1_ID).unwrap().agent_id
    );
}

// =========================================================================
// Batch Apply
// =========================================================================

#[test]
fn test_batch_with_invalid_entry_changes_nothing() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "narrator", "X").unwrap();
    let before = env.service.get_layers(ITEM_1_ID).unwrap();

    let mut batch = BTreeMap::new();
    batch.insert(
        "title".to_string(),
        FieldOverride {
            value: Some("New Title".to_string()),
            locked: true,
        },
    );
    batch.insert(
        "author".to_string(),
        FieldOverride {
            value: None,
            locked: true,
        },
    );
    batch.insert(
        "narrator".to_string(),
        FieldOverride {
            value: Some("Y".to_string()),
            locked: false,
        },
    );

    let result = env.service.batch_apply(ITEM_1_ID, &batch);
    assert!(matches!(result, Err(MetadataError::Validation(_))));
    assert_eq!(env.service.get_layers(ITEM_1_ID).unwrap(), before);
}

#[test]
fn test_batch_with_bad_number_changes_nothing() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    let before = env.service.get_layers(ITEM_1_ID).unwrap();

    let mut batch = BTreeMap::new();
    batch.insert(
        "seriesSequence".to_string(),
        FieldOverride {
            value: Some("2".to_string()),
            locked: true,
        },
    );
    batch.insert(
        "rating".to_string(),
        FieldOverride {
            value: Some("five stars".to_string()),
            locked: true,
        },
    );

    assert!(env.service.batch_apply(ITEM_1_ID, &batch).is_err());
    assert_eq!(env.service.get_layers(ITEM_1_ID).unwrap(), before);
}

#[test]
fn test_batch_naming_a_field_twice_changes_nothing() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "title", "Dune (Curated)").unwrap();
    let before = env.service.get_layers(ITEM_1_ID).unwrap();

    for (lock_key, unlock_key) in [("title", "TITLE"), ("TITLE", "title")] {
        let mut batch = BTreeMap::new();
        batch.insert(
            lock_key.to_string(),
            FieldOverride {
                value: Some("Mine".to_string()),
                locked: true,
            },
        );
        batch.insert(unlock_key.to_string(), FieldOverride::default());

        let result = env.service.batch_apply(ITEM_1_ID, &batch);
        assert!(matches!(
            result,
            Err(MetadataError::Validation(ValidationError::DuplicateField {
                field: MetadataField::Title
            }))
        ));
        assert_eq!(env.service.get_layers(ITEM_1_ID).unwrap(), before);
    }
}

#[test]
fn test_batch_applies_all_entries() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "language", "English").unwrap();

    let batch: BTreeMap<String, FieldOverride> = serde_json::from_str(
        r#"{
            "title": {"value": "Dune", "locked": true},
            "narrator": {"locked": true},
            "language": {"locked": false},
            "ratingCount": {"value": "", "locked": true}
        }"#,
    )
    .unwrap();

    let fields = env.service.batch_apply(ITEM_1_ID, &batch).unwrap();
    assert_eq!(
        fields,
        vec![
            locked(MetadataField::Narrator, DUNE_NARRATOR),
            locked(MetadataField::RatingCount, ""),
            locked(MetadataField::Title, DUNE_TITLE),
        ]
    );

    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.language, None);
    assert_eq!(resolved.rating_count, None);
    assert_eq!(resolved.rating, Some(4.6));
}

#[test]
fn test_clear_all() {
    let env = TestEnv::with_linked_item(ITEM_1_ID);
    env.service.edit(ITEM_1_ID, "title", "T").unwrap();
    env.service.edit(ITEM_1_ID, "author", "A").unwrap();

    env.service.clear_all(ITEM_1_ID).unwrap();

    assert!(env.service.get_layers(ITEM_1_ID).unwrap().custom.is_empty());
    let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
    assert_eq!(resolved.title.as_deref(), Some(DUNE_TITLE));
    assert_eq!(resolved.author.as_deref(), Some(DUNE_AUTHOR));
}

// =========================================================================
// Files
// =========================================================================

#[test]
fn test_files_in_natural_order() {
    let env = TestEnv::with_item(ITEM_1_ID);
    let paths: Vec<String> = ["ch2.mp3", "ch10.mp3", "ch1.mp3"]
        .into_iter()
        .map(String::from)
        .collect();
    env.service.add_item_files(ITEM_1_ID, &paths).unwrap();

    let ordered = env.service.ordered_files(ITEM_1_ID).unwrap();
    assert_eq!(ordered, vec!["ch1.mp3", "ch2.mp3", "ch10.mp3"]);
}

#[test]
fn test_missing_item() {
    let env = TestEnv::new();
    assert!(matches!(
        env.service.get_layers(MISSING_ITEM_ID),
        Err(MetadataError::ItemNotFound(id)) if id == MISSING_ITEM_ID
    ));
    assert!(matches!(
        env.service.clear_all(MISSING_ITEM_ID),
        Err(MetadataError::ItemNotFound(_))
    ));
}
