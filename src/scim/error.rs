//! Gateway error taxonomy and its SCIM 1.1 error representation.
//!
//! Every request-level failure is a [`GatewayError`]. The route layer renders
//! it as a [`ScimErrorResponse`] whose description is prefixed with the gateway
//! and adapter name, e.g. `scimgateway[loki] not found`.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};

use super::{filter::FilterSyntaxError, patch::DuplicateTypeError};
use crate::adapter::AdapterError;

/// Name used as the prefix of every error description.
pub const GATEWAY_NAME: &str = "scimgateway";

/// Request-level failures.
///
/// All variants are terminal for the request that produced them; nothing is
/// retried by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or wrong Basic credentials.
    #[error("Access denied")]
    Auth,

    /// The `filter` query parameter is not a supported equality clause.
    #[error(transparent)]
    FilterSyntax(#[from] FilterSyntaxError),

    /// Unsupported combination of query parameters for a route.
    #[error("{0}")]
    RouteShape(String),

    /// Request body is not valid JSON or has the wrong shape.
    #[error("{0}")]
    InvalidBody(String),

    /// A multivalue PATCH would leave two entries with the same `type`.
    #[error(transparent)]
    DuplicateType(#[from] DuplicateTypeError),

    /// The adapter reported a failure.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Auth => StatusCode::UNAUTHORIZED,
            GatewayError::FilterSyntax(_)
            | GatewayError::RouteShape(_)
            | GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::DuplicateType(_) | GatewayError::Adapter(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Render into the response body, prefixed with the adapter name.
    pub fn to_scim(&self, adapter_name: &str) -> ScimErrorResponse {
        ScimErrorResponse::new(
            self.status_code(),
            format!("{GATEWAY_NAME}[{adapter_name}] {self}"),
        )
    }
}

/// SCIM 1.1 error body: `{"Errors": [{"description": "...", "code": "500"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimErrorResponse {
    #[serde(rename = "Errors")]
    pub errors: Vec<ScimErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScimErrorDetail {
    pub description: String,
    pub code: String,
}

impl ScimErrorResponse {
    pub fn new(status: StatusCode, description: impl Into<String>) -> Self {
        Self {
            errors: vec![ScimErrorDetail {
                description: description.into(),
                code: status.as_u16().to_string(),
            }],
        }
    }

    /// Status code carried in the first error entry.
    pub fn status_code(&self) -> StatusCode {
        self.errors
            .first()
            .and_then(|e| e.code.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ScimErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(super::CONTENT_TYPE_JSON),
        );
        response
    }
}
