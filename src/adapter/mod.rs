//! Backend adapter boundary.
//!
//! An adapter fulfills the normalized operations the gateway derives from SCIM
//! requests against a concrete identity store. Each request produces exactly
//! one adapter call, and each call resolves exactly once with either a result
//! or an [`AdapterError`] whose message is surfaced to the client verbatim.
//!
//! Available adapters:
//! - [`InMemoryAdapter`]: process-local store, used for demos and testing

mod memory;

use async_trait::async_trait;
pub use memory::InMemoryAdapter;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::scim::{PageHint, ScimListResponse};

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter rejected or failed the operation.
    #[error("{0}")]
    Failed(String),

    /// The task running the operation panicked or was cancelled.
    #[error("operation \"{0}\" did not complete")]
    Aborted(&'static str),
}

impl AdapterError {
    pub fn failed(message: impl Into<String>) -> Self {
        AdapterError::Failed(message.into())
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Normalized operation names, used in logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    ExploreUsers,
    GetUser,
    CreateUser,
    DeleteUser,
    ModifyUser,
    ExploreGroups,
    GetGroup,
    GetGroupMembers,
    ModifyGroupMembers,
}

impl AdapterEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterEvent::ExploreUsers => "explore-users",
            AdapterEvent::GetUser => "get-user",
            AdapterEvent::CreateUser => "create-user",
            AdapterEvent::DeleteUser => "delete-user",
            AdapterEvent::ModifyUser => "modify-user",
            AdapterEvent::ExploreGroups => "explore-groups",
            AdapterEvent::GetGroup => "get-group",
            AdapterEvent::GetGroupMembers => "get-group-members",
            AdapterEvent::ModifyGroupMembers => "modify-group-members",
        }
    }
}

impl std::fmt::Display for AdapterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a backend must implement.
///
/// `attributes` is the raw comma-separated `attributes` query parameter, if
/// the client sent one. Modify bodies have already been through multivalue
/// reconciliation: every entry of a multivalue attribute carries an
/// `operation` of `create`, `modify` or `delete`.
#[async_trait]
pub trait ScimAdapter: Send + Sync {
    /// Adapter name, used as the `[name]` part of error messages.
    fn name(&self) -> &str;

    /// List all users, each with at least `id` and `userName`.
    async fn explore_users(&self, page: PageHint) -> AdapterResult<ScimListResponse>;

    /// Look up one user by `id` or `userName`.
    async fn get_user(
        &self,
        id_or_user_name: &str,
        attributes: Option<&str>,
    ) -> AdapterResult<Option<Value>>;

    async fn create_user(&self, user: Map<String, Value>) -> AdapterResult<()>;

    async fn delete_user(&self, id: &str) -> AdapterResult<()>;

    async fn modify_user(&self, id: &str, changes: Map<String, Value>) -> AdapterResult<()>;

    /// List all groups, each with at least `id` and `displayName`.
    async fn explore_groups(&self, page: PageHint) -> AdapterResult<ScimListResponse>;

    /// Look up one group by `displayName`.
    async fn get_group(
        &self,
        display_name: &str,
        attributes: Option<&str>,
    ) -> AdapterResult<Option<Value>>;

    /// Groups the given user is a member of.
    async fn get_group_members(
        &self,
        user_id: &str,
        attributes: Option<&str>,
    ) -> AdapterResult<Vec<Value>>;

    /// Apply member additions and removals (`"operation": "delete"`) to a group.
    async fn modify_group_members(&self, group_id: &str, members: Vec<Value>) -> AdapterResult<()>;
}
