//! Permission handlers: assign, remove, update, share, and the read paths.

use axum::extract::{Path, Query, State};
use axum::Json;

use snipperm_storage::{SnippetId, UserId};

use crate::error::ApiResult;
use crate::server::{parse_permission_type, PermissionServer};

use super::{
    AssignPermissionRequest, Caller, PermissionResponse, PermissionTypeQuery,
    PermissionWithOwnerResponse, ShareRequest,
};

pub async fn assign_permission(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Json(body): Json<AssignPermissionRequest>,
) -> ApiResult<Json<PermissionResponse>> {
    tracing::info!(
        user_id = %user_id.0,
        snippet_id = body.snippet_id,
        permission = %body.permission_type,
        "assigning permission"
    );
    let permission_type = parse_permission_type(&body.permission_type)?;
    let permission = server
        .assign_permission(&user_id, SnippetId(body.snippet_id), permission_type)
        .await?;
    Ok(Json(permission.into()))
}

pub async fn remove_permission(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Path(snippet_id): Path<i64>,
) -> ApiResult<Json<PermissionResponse>> {
    tracing::info!(user_id = %user_id.0, snippet_id, "removing permission");
    let removed = server
        .remove_permission(&user_id, SnippetId(snippet_id))
        .await?;
    Ok(Json(removed.into()))
}

pub async fn update_permission(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Path((snippet_id, permission_type)): Path<(i64, String)>,
) -> ApiResult<Json<PermissionResponse>> {
    tracing::info!(
        user_id = %user_id.0,
        snippet_id,
        permission = %permission_type,
        "updating permission"
    );
    let permission_type = parse_permission_type(&permission_type)?;
    let replaced = server
        .update_permission(&user_id, SnippetId(snippet_id), permission_type)
        .await?;
    Ok(Json(replaced.into()))
}

pub async fn get_by_user(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
) -> ApiResult<Json<Vec<PermissionWithOwnerResponse>>> {
    tracing::info!(user_id = %user_id.0, "fetching permissions for user");
    let permissions = server.permissions_by_user(&user_id).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

pub async fn get_by_snippet(
    State(server): State<PermissionServer>,
    Path(snippet_id): Path<i64>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = server.permissions_by_snippet(SnippetId(snippet_id)).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

pub async fn get_by_user_and_snippet(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Path(snippet_id): Path<i64>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = server
        .permission_by_user_and_snippet(&user_id, SnippetId(snippet_id))
        .await?;
    Ok(Json(permission.into()))
}

pub async fn get_by_user_and_type(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Query(query): Query<PermissionTypeQuery>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = server
        .permissions_by_user_and_type(&user_id, &query.permission_type)
        .await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

pub async fn get_owner(
    State(server): State<PermissionServer>,
    Path(snippet_id): Path<i64>,
) -> ApiResult<Json<PermissionResponse>> {
    let owner = server.owner_by_snippet(SnippetId(snippet_id)).await?;
    Ok(Json(owner.into()))
}

pub async fn share_permission(
    State(server): State<PermissionServer>,
    Caller(user_id): Caller,
    Path(snippet_id): Path<i64>,
    Json(body): Json<ShareRequest>,
) -> ApiResult<Json<PermissionResponse>> {
    tracing::info!(
        user_id = %user_id.0,
        snippet_id,
        target_user_id = %body.user_id,
        "sharing snippet"
    );
    let shared = server
        .share_permission(&user_id, &UserId(body.user_id), SnippetId(snippet_id))
        .await?;
    Ok(Json(shared.into()))
}
