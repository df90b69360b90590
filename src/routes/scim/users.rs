//! SCIM 1.1 User Endpoints
//!
//! - GET /Users: explore (`attributes=userName`) or single lookup (`filter`)
//! - POST /Users: create user
//! - PATCH /Users/{id}: modify user
//! - DELETE /Users/{id}: delete user

use axum::{
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};

use super::{ScimJson, error_response, invoke, no_content, parse_object_body, query_params};
use crate::{
    AppState,
    adapter::AdapterEvent,
    scim::{
        GatewayError, LookupOp, ScimListResponse, ScimQueryParams, USER_FILTERS, merge_multivalue,
        parse_lookup,
    },
};

/// List or look up users.
///
/// `GET /Users`
///
/// - `filter=userName eq "<v>"` or `filter=id eq "<v>"`: get one user,
///   projected to the optional `attributes` list
/// - `attributes=userName`: explore all users, honoring `startIndex`/`count`
///   hints
///
/// Any other combination is rejected without contacting the adapter.
#[tracing::instrument(
    name = "scim.users.list",
    skip_all,
    fields(filter = tracing::field::Empty, attributes = tracing::field::Empty)
)]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ScimQueryParams>, QueryRejection>,
) -> Response {
    let result = match query_params(query) {
        Ok(params) => dispatch_list(&state, params).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(envelope) => ScimJson(envelope.normalize()).into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn dispatch_list(
    state: &AppState,
    params: ScimQueryParams,
) -> Result<ScimListResponse, GatewayError> {
    if let Some(filter) = params.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        let (op, filter) = parse_lookup(filter, USER_FILTERS)?;
        if op != LookupOp::GetUser {
            return Err(GatewayError::RouteShape(format!(
                "{op:?} lookup is not available on \"GET /Users\""
            )));
        }

        let attributes = params.attributes;
        let user = invoke(state, AdapterEvent::GetUser, move |adapter| async move {
            adapter
                .get_user(&filter.value, attributes.as_deref())
                .await
        })
        .await?;
        return Ok(ScimListResponse::from_optional(user));
    }

    if params.attributes_is("userName") {
        let page = params.page_hint()?;
        return invoke(state, AdapterEvent::ExploreUsers, move |adapter| async move {
            adapter.explore_users(page).await
        })
        .await;
    }

    Err(GatewayError::RouteShape(
        "\"GET /Users\" not supported, use attributes=userName or filter=userName eq \"<value>\""
            .into(),
    ))
}

/// Create a user.
///
/// `POST /Users`
///
/// The body is a SCIM user resource; its `schemas` key is dropped before the
/// adapter sees it. Responds 204 on success.
#[tracing::instrument(name = "scim.users.create", skip_all)]
pub async fn create_user(State(state): State<AppState>, body: Bytes) -> Response {
    match create(&state, &body).await {
        Ok(()) => no_content(),
        Err(e) => error_response(&state, e),
    }
}

async fn create(state: &AppState, body: &Bytes) -> Result<(), GatewayError> {
    let user = parse_object_body(body)?;
    invoke(state, AdapterEvent::CreateUser, move |adapter| async move {
        adapter.create_user(user).await
    })
    .await
}

/// Delete a user.
///
/// `DELETE /Users/{id}`
#[tracing::instrument(name = "scim.users.delete", skip_all, fields(user_id = %id))]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = invoke(&state, AdapterEvent::DeleteUser, move |adapter| async move {
        adapter.delete_user(&id).await
    })
    .await;

    match result {
        Ok(()) => no_content(),
        Err(e) => error_response(&state, e),
    }
}

/// Modify a user.
///
/// `PATCH /Users/{id}`
///
/// Multivalue attributes are reconciled before dispatch: a delete paired with
/// a new entry of the same `type` becomes a single `modify`. A body that would
/// leave two entries with the same `type` is rejected before the adapter is
/// contacted.
#[tracing::instrument(name = "scim.users.patch", skip_all, fields(user_id = %id))]
pub async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    match modify(&state, id, &body).await {
        Ok(()) => no_content(),
        Err(e) => error_response(&state, e),
    }
}

async fn modify(state: &AppState, id: String, body: &Bytes) -> Result<(), GatewayError> {
    let changes = merge_multivalue(parse_object_body(body)?)?;
    invoke(state, AdapterEvent::ModifyUser, move |adapter| async move {
        adapter.modify_user(&id, changes).await
    })
    .await
}
