//! MetadataStore trait definition.

use crate::metadata::{
    AgentRecord, CatalogItem, CustomField, EmbeddedRecord, MetadataField, MetadataLayers,
    ProviderResult, Resolver,
};
use anyhow::Result;

/// What a locked field should hold once the change is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockValue {
    /// Lock to exactly this value.
    Explicit(String),
    /// Lock to whatever the field resolves to when the change is applied.
    Snapshot,
}

/// One atomic transition of the custom tier.
///
/// Locking sets value and lock flag together; there is no way to write one
/// without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Lock { field: MetadataField, value: LockValue },
    Unlock { field: MetadataField },
    ClearAll,
}

/// Trait for metadata storage backends.
///
/// Methods taking an `item_id` report a missing catalog item through `None` or
/// `false` rather than an error.
pub trait MetadataStore: Send + Sync {
    // =========================================================================
    // Catalog Items
    // =========================================================================

    /// Register a catalog item. Returns false if it already existed.
    fn create_item(&self, item_id: &str) -> Result<bool>;

    fn item_exists(&self, item_id: &str) -> Result<bool>;

    fn get_item(&self, item_id: &str) -> Result<Option<CatalogItem>>;

    /// Delete an item with its embedded record, custom fields and files.
    /// Agent records are shared and survive.
    fn delete_item(&self, item_id: &str) -> Result<bool>;

    // =========================================================================
    // Agent Tier
    // =========================================================================

    /// Insert or update the agent record identified by (source, external_id).
    fn upsert_agent_record(&self, result: &ProviderResult) -> Result<AgentRecord>;

    fn get_agent_record(&self, id: i64) -> Result<Option<AgentRecord>>;

    fn find_agent_record(&self, source: &str, external_id: &str) -> Result<Option<AgentRecord>>;

    /// Delete agent records no catalog item references. Returns how many.
    fn prune_orphan_agent_records(&self) -> Result<usize>;

    // =========================================================================
    // Embedded Tier
    // =========================================================================

    fn get_embedded_record(&self, item_id: &str) -> Result<Option<EmbeddedRecord>>;

    /// Replace the item's embedded record. Returns false if the item is missing.
    fn upsert_embedded_record(&self, item_id: &str, record: &EmbeddedRecord) -> Result<bool>;

    // =========================================================================
    // Custom Tier
    // =========================================================================

    fn get_custom_fields(&self, item_id: &str) -> Result<Vec<CustomField>>;

    /// Apply `changes` in order inside one transaction and return the item's
    /// resulting custom fields. Snapshots are taken against the item's state
    /// before any of the changes.
    fn apply_field_changes(
        &self,
        item_id: &str,
        changes: &[FieldChange],
        resolver: &Resolver,
    ) -> Result<Option<Vec<CustomField>>>;

    // =========================================================================
    // Layers and Linking
    // =========================================================================

    /// All three tiers of an item, read in one consistent snapshot.
    fn get_layers(&self, item_id: &str) -> Result<Option<MetadataLayers>>;

    /// Upsert the agent record and point the item at it, atomically.
    fn link_agent_record(&self, item_id: &str, result: &ProviderResult) -> Result<Option<AgentRecord>>;

    /// Clear the item's agent reference, and its custom fields unless
    /// `preserve_locked` is set.
    fn unlink_agent_record(&self, item_id: &str, preserve_locked: bool) -> Result<bool>;

    // =========================================================================
    // Item Files
    // =========================================================================

    /// Attach file paths to an item, ignoring ones already attached. Returns
    /// the number of new paths, or None if the item is missing.
    fn add_item_files(&self, item_id: &str, paths: &[String]) -> Result<Option<usize>>;

    /// File paths of an item, in insertion order.
    fn get_item_files(&self, item_id: &str) -> Result<Vec<String>>;
}
