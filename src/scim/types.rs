//! SCIM 1.1 protocol types shared by the gateway routes and adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::GatewayError;

// =============================================================================
// Schema URIs
// =============================================================================

/// Core schema URI carried by every SCIM 1.1 envelope the gateway produces.
pub const SCHEMA_CORE: &str = "urn:scim:schemas:core:1.0";

/// User resource schema id.
pub const SCHEMA_USER: &str = "urn:scim:schemas:core:1.0:User";

/// Group resource schema id.
pub const SCHEMA_GROUP: &str = "urn:scim:schemas:core:1.0:Group";

// =============================================================================
// List Envelope
// =============================================================================

/// List response envelope.
///
/// Adapters may leave `totalResults` and `startIndex` unset; the gateway fills
/// them in with [`ScimListResponse::normalize`] before responding. There is no
/// real windowing: `itemsPerPage` always equals the number of resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse {
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u64>,

    #[serde(rename = "Resources", default)]
    pub resources: Vec<Value>,
}

fn default_schemas() -> Vec<String> {
    vec![SCHEMA_CORE.to_string()]
}

impl Default for ScimListResponse {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScimListResponse {
    /// Create an envelope around the given resources with bookkeeping unset.
    pub fn new(resources: Vec<Value>) -> Self {
        Self {
            schemas: default_schemas(),
            total_results: None,
            items_per_page: None,
            start_index: None,
            resources,
        }
    }

    /// Envelope for a single-resource lookup: one entry, or none.
    pub fn from_optional(resource: Option<Value>) -> Self {
        Self::new(resource.into_iter().collect())
    }

    /// Fill in the pagination bookkeeping.
    ///
    /// A missing or zero `totalResults` becomes the resource count, a missing
    /// or zero `startIndex` becomes 1, and `itemsPerPage` is always forced to
    /// the resource count.
    pub fn normalize(mut self) -> Self {
        let len = self.resources.len() as u64;
        if self.total_results.is_none_or(|n| n == 0) {
            self.total_results = Some(len);
        }
        self.items_per_page = Some(len);
        if self.start_index.is_none_or(|n| n == 0) {
            self.start_index = Some(1);
        }
        if self.schemas.is_empty() {
            self.schemas = default_schemas();
        }
        self
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Query parameters accepted on `GET /Users` and `GET /Groups`.
///
/// Numeric parameters are kept as raw strings and validated by
/// [`ScimQueryParams::page_hint`]. Query strings that fail to deserialize at
/// all (duplicate keys) are turned into a SCIM 400 by the list handlers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimQueryParams {
    pub filter: Option<String>,
    pub attributes: Option<String>,
    pub start_index: Option<String>,
    pub count: Option<String>,
}

impl ScimQueryParams {
    /// True when the `attributes` parameter is exactly `name`.
    pub fn attributes_is(&self, name: &str) -> bool {
        self.attributes.as_deref() == Some(name)
    }

    /// Paging hints forwarded to explore operations.
    pub fn page_hint(&self) -> Result<PageHint, GatewayError> {
        Ok(PageHint {
            start_index: parse_index("startIndex", self.start_index.as_deref())?,
            count: parse_index("count", self.count.as_deref())?,
        })
    }
}

fn parse_index(name: &str, raw: Option<&str>) -> Result<Option<u64>, GatewayError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            GatewayError::RouteShape(format!("{name} must be a non-negative integer, got \"{value}\""))
        }),
    }
}

/// Paging hints passed through to an adapter's explore operation.
///
/// The adapter decides what to do with them; the gateway never windows the
/// result set itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageHint {
    pub start_index: Option<u64>,
    pub count: Option<u64>,
}
