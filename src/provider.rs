//! Adapters the metadata engine consumes: external providers for the agent
//! tier and tag extractors for the embedded tier.

use crate::metadata::{EmbeddedRecord, ProviderResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

/// An external metadata provider.
///
/// Implementations own their network access and retries. Errors returned here
/// are reported to callers as retryable.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name, stored as the agent record's `source`.
    fn name(&self) -> &str;

    /// Candidate records for a title and optional author.
    async fn search(&self, title: &str, author: Option<&str>) -> Result<Vec<ProviderResult>>;

    /// The record with the given provider id, if the provider knows it.
    async fn fetch_by_external_id(&self, external_id: &str) -> Result<Option<ProviderResult>>;
}

/// Reads embedded tags from a media file.
pub trait TagExtractor: Send + Sync {
    /// `Ok(None)` when the file carries no usable tags.
    fn extract(&self, path: &Path) -> Result<Option<EmbeddedRecord>>;
}

/// Tag extractor that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTagExtractor;

impl TagExtractor for NoOpTagExtractor {
    fn extract(&self, _path: &Path) -> Result<Option<EmbeddedRecord>> {
        Ok(None)
    }
}

/// Provider backed by a JSON array of [`ProviderResult`]s, e.g. an export
/// from another catalog.
pub struct JsonCatalogProvider {
    name: String,
    records: Vec<ProviderResult>,
}

impl JsonCatalogProvider {
    pub fn new(name: impl Into<String>, records: Vec<ProviderResult>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn load<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read provider catalog {}", path.display()))?;
        let records: Vec<ProviderResult> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse provider catalog {}", path.display()))?;
        Ok(Self::new(name, records))
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

#[async_trait]
impl MetadataProvider for JsonCatalogProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, title: &str, author: Option<&str>) -> Result<Vec<ProviderResult>> {
        Ok(self
            .records
            .iter()
            .filter(|r| contains_ignore_case(r.title.as_deref(), title))
            .filter(|r| author.map_or(true, |a| contains_ignore_case(r.author.as_deref(), a)))
            .cloned()
            .collect())
    }

    async fn fetch_by_external_id(&self, external_id: &str) -> Result<Option<ProviderResult>> {
        Ok(self
            .records
            .iter()
            .find(|r| r.external_id == external_id)
            .cloned())
    }
}
