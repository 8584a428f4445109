//! Metadata service: resolved reads, override mutations and the agent link
//! lifecycle of catalog items.

use super::errors::MetadataError;
use super::validation::{
    parse_field_name, validate_batch, validate_item_id, validate_lock_request,
    validate_provider_result,
};
use crate::metadata::{
    sort_naturally, AgentRecord, CustomField, FieldOverride, MetadataLayers, ProviderResult,
    Resolution, ResolvedMetadata, Resolver,
};
use crate::metadata_store::{FieldChange, MetadataStore};
use crate::provider::{MetadataProvider, TagExtractor};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Entry point for everything that reads or changes an item's metadata.
///
/// Mutations are validated in full before the store is touched, then applied
/// in a single store transaction. Nothing resolved is ever persisted; every
/// read merges the tiers again.
#[derive(Clone)]
pub struct MetadataService {
    store: Arc<dyn MetadataStore>,
    resolver: Resolver,
}

impl MetadataService {
    pub fn new(store: Arc<dyn MetadataStore>, resolver: Resolver) -> Self {
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    // =========================================================================
    // Catalog Items
    // =========================================================================

    /// Registers an item. Returns false if it was already known.
    pub fn create_item(&self, item_id: &str) -> MetadataResult<bool> {
        validate_item_id(item_id)?;
        Ok(self.store.create_item(item_id)?)
    }

    pub fn item_exists(&self, item_id: &str) -> MetadataResult<bool> {
        Ok(self.store.item_exists(item_id)?)
    }

    pub fn delete_item(&self, item_id: &str) -> MetadataResult<()> {
        if !self.store.delete_item(item_id)? {
            return Err(MetadataError::ItemNotFound(item_id.to_string()));
        }
        info!("Deleted catalog item {}", item_id);
        Ok(())
    }

    fn ensure_item(&self, item_id: &str) -> MetadataResult<()> {
        if !self.store.item_exists(item_id)? {
            return Err(MetadataError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_layers(&self, item_id: &str) -> MetadataResult<MetadataLayers> {
        self.store
            .get_layers(item_id)?
            .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))
    }

    pub fn get_resolved(&self, item_id: &str) -> MetadataResult<ResolvedMetadata> {
        Ok(self.get_resolution(item_id)?.metadata)
    }

    /// Resolved metadata together with the tier each field came from.
    pub fn get_resolution(&self, item_id: &str) -> MetadataResult<Resolution> {
        let layers = self.get_layers(item_id)?;
        Ok(self.resolver.resolve_layers(&layers))
    }

    // =========================================================================
    // Override Mutations
    // =========================================================================

    /// Locks or unlocks one field.
    ///
    /// Locking without a value freezes whatever the field currently resolves
    /// to. Unlocking deletes the override. Returns the item's custom fields
    /// after the change.
    pub fn set_lock(
        &self,
        item_id: &str,
        field: &str,
        locked: bool,
        value: Option<String>,
    ) -> MetadataResult<Vec<CustomField>> {
        let field = parse_field_name(field)?;
        let change = validate_lock_request(field, locked, value.as_deref())?;
        self.apply(item_id, &[change])
    }

    /// Sets a field to `new_value`. Editing always locks.
    pub fn edit(
        &self,
        item_id: &str,
        field: &str,
        new_value: impl Into<String>,
    ) -> MetadataResult<Vec<CustomField>> {
        self.set_lock(item_id, field, true, Some(new_value.into()))
    }

    /// Drops every override of the item.
    pub fn clear_all(&self, item_id: &str) -> MetadataResult<()> {
        self.apply(item_id, &[FieldChange::ClearAll])?;
        Ok(())
    }

    /// Applies many lock toggles at once. One invalid entry rejects the whole
    /// batch and nothing is written.
    pub fn batch_apply(
        &self,
        item_id: &str,
        overrides: &BTreeMap<String, FieldOverride>,
    ) -> MetadataResult<Vec<CustomField>> {
        let changes = validate_batch(overrides)?;
        self.apply(item_id, &changes)
    }

    fn apply(&self, item_id: &str, changes: &[FieldChange]) -> MetadataResult<Vec<CustomField>> {
        let fields = self
            .store
            .apply_field_changes(item_id, changes, &self.resolver)?
            .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))?;
        debug!(
            "Applied {} field changes to {}, {} fields now locked",
            changes.len(),
            item_id,
            fields.len()
        );
        Ok(fields)
    }

    // =========================================================================
    // Agent Link Lifecycle
    // =========================================================================

    /// Upserts the provider record and links the item to it. Locked fields
    /// keep their values.
    pub fn link(&self, item_id: &str, result: &ProviderResult) -> MetadataResult<AgentRecord> {
        validate_provider_result(result)?;
        self.store
            .link_agent_record(item_id, result)?
            .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))
    }

    /// Drops the item's agent link. Overrides are kept when `preserve_locked`
    /// is set and cleared otherwise.
    pub fn unlink(&self, item_id: &str, preserve_locked: bool) -> MetadataResult<()> {
        if !self.store.unlink_agent_record(item_id, preserve_locked)? {
            return Err(MetadataError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    /// Fetches `external_id` from `provider` and links the item to it.
    ///
    /// Provider failures are retryable and leave the item untouched.
    pub async fn link_from_provider(
        &self,
        item_id: &str,
        provider: &dyn MetadataProvider,
        external_id: &str,
    ) -> MetadataResult<AgentRecord> {
        self.ensure_item(item_id)?;

        let fetched = provider
            .fetch_by_external_id(external_id)
            .await
            .map_err(|e| {
                warn!(
                    "Provider {} failed fetching {}: {:#}",
                    provider.name(),
                    external_id,
                    e
                );
                MetadataError::Provider(format!("{:#}", e))
            })?;
        let Some(mut result) = fetched else {
            return Err(MetadataError::AgentNotFound {
                provider: provider.name().to_string(),
                external_id: external_id.to_string(),
            });
        };

        if result.source.trim().is_empty() {
            result.source = provider.name().to_string();
        }
        if result.external_id.trim().is_empty() {
            result.external_id = external_id.to_string();
        }
        self.link(item_id, &result)
    }

    /// Candidate provider records for the item, searched by its currently
    /// resolved title and author.
    pub async fn find_matches(
        &self,
        item_id: &str,
        provider: &dyn MetadataProvider,
    ) -> MetadataResult<Vec<ProviderResult>> {
        let resolved = self.get_resolved(item_id)?;
        let Some(title) = resolved.title else {
            return Err(super::errors::ValidationError::EmptyField { field: "title" }.into());
        };
        provider
            .search(&title, resolved.author.as_deref())
            .await
            .map_err(|e| MetadataError::Provider(format!("{:#}", e)))
    }

    /// Deletes agent records no item links to.
    pub fn prune_orphan_agent_records(&self) -> MetadataResult<usize> {
        Ok(self.store.prune_orphan_agent_records()?)
    }

    // =========================================================================
    // Embedded Tier
    // =========================================================================

    /// Reads tags from `path` and stores them as the item's embedded record.
    /// Returns false when the extractor found nothing.
    pub fn import_embedded(
        &self,
        item_id: &str,
        extractor: &dyn TagExtractor,
        path: &Path,
    ) -> MetadataResult<bool> {
        self.ensure_item(item_id)?;
        let Some(record) = extractor.extract(path).map_err(|e| {
            warn!("Tag extraction failed for {}: {:#}", path.display(), e);
            MetadataError::Provider(format!(
                "Failed to read tags from {}: {:#}",
                path.display(),
                e
            ))
        })?
        else {
            debug!("No embedded tags in {}", path.display());
            return Ok(false);
        };
        if !self.store.upsert_embedded_record(item_id, &record)? {
            return Err(MetadataError::ItemNotFound(item_id.to_string()));
        }
        Ok(true)
    }

    // =========================================================================
    // Item Files
    // =========================================================================

    /// Attaches media files to the item. Returns how many were new.
    pub fn add_item_files(&self, item_id: &str, paths: &[String]) -> MetadataResult<usize> {
        self.store
            .add_item_files(item_id, paths)?
            .ok_or_else(|| MetadataError::ItemNotFound(item_id.to_string()))
    }

    /// The item's files in playback order.
    pub fn ordered_files(&self, item_id: &str) -> MetadataResult<Vec<String>> {
        self.ensure_item(item_id)?;
        let mut files = self.store.get_item_files(item_id)?;
        sort_naturally(&mut files);
        Ok(files)
    }
}
