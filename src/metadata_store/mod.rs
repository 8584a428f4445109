mod lock_accessor;
mod schema;
mod store;
mod trait_def;

pub use schema::METADATA_VERSIONED_SCHEMAS;
pub use store::SqliteMetadataStore;
pub use trait_def::{FieldChange, LockValue, MetadataStore};
