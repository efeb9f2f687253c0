//! # biblio-core
//!
//! Core types, traits, and abstractions for the Biblio research-output
//! backoffice.
//!
//! This crate provides the record models (datasets, publications), their
//! validation and permission rules, the in-memory mutations editing handlers
//! apply, and the traits the storage, search and directory backends implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod permissions;
pub mod record;
pub mod search;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use record::{Record, RecordKind};
pub use search::{FacetValue, SearchArgs, SearchHits, SearchScope};
pub use traits::*;
pub use validation::{ValidationError, ValidationErrors};
