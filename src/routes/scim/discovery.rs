//! SCIM 1.1 Discovery Endpoints
//!
//! Both documents are static and never reach the adapter.

use axum::response::{IntoResponse, Response};

use super::ScimJson;
use crate::scim::discovery::{SchemasResponse, ServiceProviderConfig};

/// Get the service provider configuration.
///
/// `GET /ServiceProviderConfigs`
#[tracing::instrument(name = "scim.discovery.service_provider_configs", skip_all)]
pub async fn service_provider_configs() -> Response {
    ScimJson(ServiceProviderConfig::default()).into_response()
}

/// List the User and Group schemas.
///
/// `GET /Schemas`
#[tracing::instrument(name = "scim.discovery.schemas", skip_all)]
pub async fn schemas() -> Response {
    ScimJson(SchemasResponse::default()).into_response()
}
