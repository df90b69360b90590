//! SCIM 1.1 translation core.
//!
//! Everything in this module is pure: it shapes requests before they are
//! handed to an adapter and shapes adapter results into responses.
//!
//! ## Module Structure
//!
//! - [`types`]: list envelope, pagination normalization and query parameters
//! - [`error`]: request error taxonomy and its SCIM error body
//! - [`filter`]: single-clause equality filter and per-route rule tables
//! - [`patch`]: multivalue PATCH reconciliation
//! - [`attributes`]: attribute whitelist validation
//! - [`discovery`]: static `ServiceProviderConfigs` and `Schemas` documents

pub mod attributes;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod patch;
pub mod types;

pub use attributes::{flatten, validate_attributes};
pub use error::*;
pub use filter::{
    EqualityFilter, FilterRule, FilterSyntaxError, GROUP_FILTERS, LookupOp, USER_FILTERS,
    parse_equality, parse_lookup,
};
pub use patch::{DuplicateTypeError, MultivalueOperation, merge_multivalue};
pub use types::*;

/// Content type of every JSON response the gateway writes.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
