//! SCIM 1.1 Protocol Routes
//!
//! Every route is served at the root and again under `/v1`, and every request
//! must carry the configured Basic credentials.
//!
//! **Discovery Endpoints:**
//! - `GET /ServiceProviderConfigs` - Service capabilities
//! - `GET /Schemas` - User and Group schema definitions
//!
//! **User Endpoints:**
//! - `GET /Users?attributes=userName` - explore users
//! - `GET /Users?filter=userName eq "<v>"` - get one user (also `id eq`)
//! - `POST /Users` - create user
//! - `PATCH /Users/{id}` - modify user (multivalue attributes reconciled first)
//! - `DELETE /Users/{id}` - delete user
//!
//! **Group Endpoints:**
//! - `GET /Groups?attributes=displayName` - explore groups
//! - `GET /Groups?filter=displayName eq "<v>"` - get one group
//! - `GET /Groups?filter=members.value eq "<userId>"` - groups of a user
//! - `PATCH /Groups/{id}` - add or remove members

pub mod discovery;
pub mod groups;
pub mod middleware;
pub mod users;

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{OriginalUri, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    AppState,
    adapter::{AdapterError, AdapterEvent, AdapterResult, ScimAdapter},
    scim::{CONTENT_TYPE_JSON, GATEWAY_NAME, GatewayError, ScimErrorResponse, ScimQueryParams},
};

/// Build the SCIM routes.
///
/// Authentication is applied by the caller so that it also covers the
/// fallback.
pub fn scim_routes() -> Router<AppState> {
    Router::new()
        // Discovery endpoints
        .route(
            "/ServiceProviderConfigs",
            get(discovery::service_provider_configs),
        )
        .route("/Schemas", get(discovery::schemas))
        // User resource endpoints
        .route("/Users", get(users::list_users).post(users::create_user))
        .route(
            "/Users/{id}",
            patch(users::patch_user).delete(users::delete_user),
        )
        // Group resource endpoints
        .route("/Groups", get(groups::list_groups))
        .route("/Groups/{id}", patch(groups::patch_group))
}

/// Fallback for paths outside the SCIM surface.
pub async fn not_found(State(state): State<AppState>, OriginalUri(uri): OriginalUri) -> Response {
    tracing::debug!(path = %uri.path(), "No SCIM route for path");
    ScimErrorResponse::new(
        StatusCode::NOT_FOUND,
        format!(
            "{GATEWAY_NAME}[{}] \"{}\" is not a SCIM endpoint",
            state.adapter.name(),
            uri.path()
        ),
    )
    .into_response()
}

// =============================================================================
// Response Helpers
// =============================================================================

/// JSON response with the gateway's Content-Type.
pub struct ScimJson<T>(pub T);

impl<T: Serialize> IntoResponse for ScimJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => {
                tracing::debug!(body = %String::from_utf8_lossy(&body), "Response body");
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON))],
                    Body::from(body),
                )
                    .into_response()
            }
            Err(e) => {
                tracing::error!("Failed to serialize SCIM response: {}", e);
                ScimErrorResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{GATEWAY_NAME} failed to serialize response"),
                )
                .into_response()
            }
        }
    }
}

/// Empty success response for create, modify and delete.
pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Log a request failure and render it with the adapter's name.
pub(crate) fn error_response(state: &AppState, err: GatewayError) -> Response {
    let adapter = state.adapter.name();
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(adapter = %adapter, status = status.as_u16(), error = %err, "SCIM request failed");
    } else {
        tracing::warn!(adapter = %adapter, status = status.as_u16(), error = %err, "SCIM request rejected");
    }
    err.to_scim(adapter).into_response()
}

/// Unwrap list query parameters, turning axum's rejection into a SCIM error.
///
/// Records `filter` and `attributes` on the current span.
pub(crate) fn query_params(
    query: Result<Query<ScimQueryParams>, QueryRejection>,
) -> Result<ScimQueryParams, GatewayError> {
    let Query(params) = query.map_err(|rejection| GatewayError::RouteShape(rejection.body_text()))?;
    let span = tracing::Span::current();
    span.record("filter", params.filter.as_deref());
    span.record("attributes", params.attributes.as_deref());
    Ok(params)
}

/// Parse a request body that must be a JSON object, minus its `schemas` key.
pub(crate) fn parse_object_body(body: &Bytes) -> Result<Map<String, Value>, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidBody(format!("request body is not valid JSON: {e}")))?;
    let Value::Object(mut object) = value else {
        return Err(GatewayError::InvalidBody(
            "request body must be a JSON object".into(),
        ));
    };
    object.remove("schemas");
    tracing::debug!(body = %serde_json::Value::Object(object.clone()), "Parsed request body");
    Ok(object)
}

// =============================================================================
// Adapter Dispatch
// =============================================================================

/// Run exactly one adapter operation and wait for its single result.
///
/// The call is spawned on the state's task tracker, so it keeps running to
/// completion if the client goes away and shutdown waits for it.
pub(crate) async fn invoke<T, F, Fut>(
    state: &AppState,
    event: AdapterEvent,
    call: F,
) -> Result<T, GatewayError>
where
    F: FnOnce(Arc<dyn ScimAdapter>) -> Fut,
    Fut: Future<Output = AdapterResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tracing::debug!(adapter = %state.adapter.name(), "emitting event \"{event}\" and awaiting result");

    let handle = state.task_tracker.spawn(call(Arc::clone(&state.adapter)));
    match handle.await {
        Ok(result) => Ok(result?),
        Err(e) => {
            tracing::error!(event = %event, error = %e, "Adapter task did not complete");
            Err(AdapterError::Aborted(event.as_str()).into())
        }
    }
}
