//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestEnv, ITEM_1_ID};
//!
//! #[test]
//! fn test_show_item() {
//!     let env = TestEnv::with_item(ITEM_1_ID);
//!     let resolved = env.service.get_resolved(ITEM_1_ID).unwrap();
//!     assert!(resolved.title.is_none());
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{dune_result, FakeProvider, TestEnv};
