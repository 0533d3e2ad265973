//! HTTP boundary: request/response DTOs, the caller-identity extractor, and
//! the router. Authentication happens upstream; the gateway forwards the
//! validated caller in the `x-user-id` header.

pub mod permissions;
pub mod users;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use snipperm_storage::{Permission, UserId};

use crate::error::ApiError;
use crate::server::{PermissionServer, PermissionWithOwner};

/// Caller identity, pre-validated by the boundary in front of this service.
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Caller(UserId(v.to_string())))
            .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".into()))
    }
}

// ──────────────────────────────────── DTOs ────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionRequest {
    pub snippet_id: i64,
    pub permission_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct PermissionTypeQuery {
    #[serde(rename = "permissionType")]
    pub permission_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    pub id: String,
    pub user_id: String,
    pub snippet_id: i64,
    pub permission_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<Permission> for PermissionResponse {
    fn from(p: Permission) -> Self {
        Self {
            id: p.id.0.to_string(),
            user_id: p.user_id.0,
            snippet_id: p.snippet_id.0,
            permission_type: p.permission_type.as_str().to_string(),
            username: p.username,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionWithOwnerResponse {
    #[serde(flatten)]
    pub permission: PermissionResponse,
    pub owner_username: String,
}

impl From<PermissionWithOwner> for PermissionWithOwnerResponse {
    fn from(p: PermissionWithOwner) -> Self {
        Self {
            permission: p.permission.into(),
            owner_username: p.owner_username,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
}

// ─────────────────────────────────── Router ───────────────────────────────────

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(server: PermissionServer) -> Router {
    Router::new()
        .route("/permissions/assign", post(permissions::assign_permission))
        .route(
            "/permissions/user/snippet/{snippet_id}",
            delete(permissions::remove_permission).get(permissions::get_by_user_and_snippet),
        )
        .route(
            "/permissions/user/snippet/{snippet_id}/update/{permission_type}",
            patch(permissions::update_permission),
        )
        .route("/permissions/user", get(permissions::get_by_user))
        .route(
            "/permissions/snippet/{snippet_id}",
            get(permissions::get_by_snippet),
        )
        .route(
            "/permissions/permissionType",
            get(permissions::get_by_user_and_type),
        )
        .route("/permissions/owner/{snippet_id}", get(permissions::get_owner))
        .route(
            "/permissions/share/{snippet_id}",
            post(permissions::share_permission),
        )
        .route("/users", get(users::list_users))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}
