#![allow(dead_code)]

use super::constants::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use pezzottify_metadata::metadata::{ProviderResult, Resolver};
use pezzottify_metadata::{MetadataProvider, MetadataService, SqliteMetadataStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A metadata service over a fresh on-disk database.
pub struct TestEnv {
    pub service: MetadataService,
    pub store: Arc<SqliteMetadataStore>,
    _tmp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_resolver(Resolver::default())
    }

    pub fn with_resolver(resolver: Resolver) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteMetadataStore::new(tmp.path().join("metadata.db")).unwrap());
        let service = MetadataService::new(store.clone(), resolver);
        Self {
            service,
            store,
            _tmp: tmp,
        }
    }

    pub fn with_item(item_id: &str) -> Self {
        let env = Self::new();
        env.service.create_item(item_id).unwrap();
        env
    }

    /// An item linked to the Dune provider record.
    pub fn with_linked_item(item_id: &str) -> Self {
        let env = Self::with_item(item_id);
        env.service.link(item_id, &dune_result()).unwrap();
        env
    }
}

pub fn dune_result() -> ProviderResult {
    ProviderResult {
        source: PROVIDER_NAME.to_string(),
        external_id: DUNE_EXTERNAL_ID.to_string(),
        title: Some(DUNE_TITLE.to_string()),
        author: Some(DUNE_AUTHOR.to_string()),
        narrator: Some(DUNE_NARRATOR.to_string()),
        series_name: Some("Dune".to_string()),
        series_sequence: Some("1".to_string()),
        duration_sec: Some(75_600),
        rating: Some(4.6),
        rating_count: Some(120_000),
        genres: vec!["Science Fiction".to_string()],
        ..Default::default()
    }
}

/// In-memory provider that can be switched into a failing state.
pub struct FakeProvider {
    records: Vec<ProviderResult>,
    failing: bool,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(records: Vec<ProviderResult>) -> Self {
        Self {
            records,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            failing: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, title: &str, author: Option<&str>) -> Result<Vec<ProviderResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            bail!("connection reset by peer");
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.title.as_deref() == Some(title))
            .filter(|r| author.map_or(true, |a| r.author.as_deref() == Some(a)))
            .cloned()
            .collect())
    }

    async fn fetch_by_external_id(&self, external_id: &str) -> Result<Option<ProviderResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            bail!("connection reset by peer");
        }
        Ok(self
            .records
            .iter()
            .find(|r| r.external_id == external_id)
            .cloned())
    }
}
