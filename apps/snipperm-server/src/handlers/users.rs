//! Read-only user listing backed by the external directory.

use axum::extract::State;
use axum::Json;

use crate::error::ApiResult;
use crate::server::PermissionServer;

use super::UserResponse;

pub async fn list_users(
    State(server): State<PermissionServer>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    tracing::info!("fetching all users from directory");
    let users = server.directory.list_users().await?;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserResponse {
                id: u.id,
                name: u.name,
            })
            .collect(),
    ))
}
