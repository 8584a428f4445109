mod fields;
mod models;
mod natural_sort;
mod resolver;

pub use fields::{parse_custom, split_list, FieldKind, FieldValue, InvalidFieldValue, MetadataField, UnknownFieldName};
pub use models::{
    AgentRecord, CatalogItem, CustomField, EmbeddedRecord, FieldOverride, MetadataLayers,
    ProviderResult, ResolvedMetadata,
};
pub use natural_sort::{natural_cmp, sort_naturally};
pub use resolver::{resolve, FieldSource, Resolution, Resolver, Tier};
