mod errors;
mod service;
mod validation;

pub use errors::{MetadataError, ValidationError, ValidationResult};
pub use service::{MetadataResult, MetadataService};
pub use validation::{
    parse_field_name, validate_batch, validate_item_id, validate_lock_request,
    validate_provider_result,
};
