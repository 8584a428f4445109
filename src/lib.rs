//! Pezzottify Metadata Library
//!
//! Layered metadata resolution and field locking for catalog items.

pub mod config;
pub mod metadata;
pub mod metadata_store;
pub mod overrides;
pub mod provider;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use metadata::{
    FieldSource, MetadataField, MetadataLayers, ProviderResult, Resolution, ResolvedMetadata,
    Resolver, Tier,
};
pub use metadata_store::{MetadataStore, SqliteMetadataStore};
pub use overrides::{MetadataError, MetadataService, ValidationError};
pub use provider::{JsonCatalogProvider, MetadataProvider, NoOpTagExtractor, TagExtractor};
