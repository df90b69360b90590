//! SCIM 1.1 Group Endpoints
//!
//! Groups are read-only apart from their membership: there is no create,
//! replace or delete.

use axum::{
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::{ScimJson, error_response, invoke, no_content, parse_object_body, query_params};
use crate::{
    AppState,
    adapter::AdapterEvent,
    scim::{GROUP_FILTERS, GatewayError, LookupOp, ScimListResponse, ScimQueryParams, parse_lookup},
};

/// List or look up groups.
///
/// `GET /Groups`
///
/// - `filter=displayName eq "<v>"`: get one group
/// - `filter=members.value eq "<userId>"`: groups the user belongs to
/// - `attributes=displayName`: explore all groups
#[tracing::instrument(
    name = "scim.groups.list",
    skip_all,
    fields(filter = tracing::field::Empty, attributes = tracing::field::Empty)
)]
pub async fn list_groups(
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
        let (op, filter) = parse_lookup(filter, GROUP_FILTERS)?;
        let attributes = params.attributes;

        return match op {
            LookupOp::GetGroupMembers => {
                let groups = invoke(state, AdapterEvent::GetGroupMembers, move |adapter| async move {
                    adapter
                        .get_group_members(&filter.value, attributes.as_deref())
                        .await
                })
                .await?;
                Ok(ScimListResponse::new(groups))
            }
            LookupOp::GetGroup => {
                let group = invoke(state, AdapterEvent::GetGroup, move |adapter| async move {
                    adapter
                        .get_group(&filter.value, attributes.as_deref())
                        .await
                })
                .await?;
                Ok(ScimListResponse::from_optional(group))
            }
            op @ LookupOp::GetUser => Err(unsupported_lookup(op)),
        };
    }

    if params.attributes_is("displayName") {
        let page = params.page_hint()?;
        return invoke(state, AdapterEvent::ExploreGroups, move |adapter| async move {
            adapter.explore_groups(page).await
        })
        .await;
    }

    Err(GatewayError::RouteShape(
        "\"GET /Groups\" not supported, use attributes=displayName or filter=displayName eq \"<value>\""
            .into(),
    ))
}

fn unsupported_lookup(op: LookupOp) -> GatewayError {
    GatewayError::RouteShape(format!("{op:?} lookup is not available on \"GET /Groups\""))
}

/// Add or remove group members.
///
/// `PATCH /Groups/{id}`
///
/// The body must carry a `members` array. Entries with
/// `"operation": "delete"` are removals, all others are additions.
#[tracing::instrument(name = "scim.groups.patch", skip_all, fields(group_id = %id))]
pub async fn patch_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    match modify_members(&state, id, &body).await {
        Ok(()) => no_content(),
        Err(e) => error_response(&state, e),
    }
}

async fn modify_members(state: &AppState, id: String, body: &Bytes) -> Result<(), GatewayError> {
    let mut body = parse_object_body(body)?;
    let Some(Value::Array(members)) = body.remove("members") else {
        return Err(GatewayError::InvalidBody(
            "PATCH /Groups body must contain a \"members\" array".into(),
        ));
    };
    invoke(state, AdapterEvent::ModifyGroupMembers, move |adapter| async move {
        adapter.modify_group_members(&id, members).await
    })
    .await
}
