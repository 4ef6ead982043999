use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path},
    http::StatusCode,
    response::Json,
    Extension,
};
use tracing::{debug, info};

use crate::api::rest::dto::{CreateUserReq, UpdateUserReq, UserDto, UserListDto};
use crate::api::rest::error::{bad_body, map_domain_error, user_not_found};
use crate::api::rest::problem::Problem;
use crate::domain::service::Service;
use crate::infra::storage::user_key;

/// Ids are looked up by their canonical decimal form; anything else cannot exist.
fn parse_user_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0 && user_key(*id) == raw)
}

/// Full collection: id counter plus every user keyed by id
pub async fn list_users(
    Extension(svc): Extension<Arc<Service>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<UserListDto>, Problem> {
    info!("Listing users");

    svc.list_users()
        .await
        .map(|snapshot| Json(UserListDto::from(snapshot)))
        .map_err(|e| map_domain_error(&e, uri.path()))
}

/// Get a specific user by ID
pub async fn get_user(
    Extension(svc): Extension<Arc<Service>>,
    OriginalUri(uri): OriginalUri,
    Path(raw_id): Path<String>,
) -> Result<Json<UserDto>, Problem> {
    info!("Getting user with id: {}", raw_id);

    let id = parse_user_id(&raw_id).ok_or_else(|| user_not_found(&raw_id, uri.path()))?;

    svc.get_user(id)
        .await
        .map(|user| Json(UserDto::from(user)))
        .map_err(|e| map_domain_error(&e, uri.path()))
}

/// Create a new user
pub async fn create_user(
    Extension(svc): Extension<Arc<Service>>,
    OriginalUri(uri): OriginalUri,
    body: Result<Json<CreateUserReq>, JsonRejection>,
) -> Result<(StatusCode, Json<UserDto>), Problem> {
    let Json(req) = body.map_err(|rejection| bad_body(&rejection, uri.path()))?;
    info!("Creating user: {:?}", req);

    svc.create_user(req.into())
        .await
        .map(|user| (StatusCode::CREATED, Json(UserDto::from(user))))
        .map_err(|e| map_domain_error(&e, uri.path()))
}

/// Change the display name of an existing user
pub async fn update_user(
    Extension(svc): Extension<Arc<Service>>,
    OriginalUri(uri): OriginalUri,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateUserReq>, JsonRejection>,
) -> Result<Json<UserDto>, Problem> {
    let Json(req) = body.map_err(|rejection| bad_body(&rejection, uri.path()))?;
    info!("Updating user {} with: {:?}", raw_id, req);

    let id = parse_user_id(&raw_id).ok_or_else(|| user_not_found(&raw_id, uri.path()))?;
    if req.email.is_some() {
        debug!(user_id = id, "email is immutable; ignoring it in update request");
    }

    svc.update_user(id, req.into())
        .await
        .map(|user| Json(UserDto::from(user)))
        .map_err(|e| map_domain_error(&e, uri.path()))
}

/// Delete a user by ID
pub async fn delete_user(
    Extension(svc): Extension<Arc<Service>>,
    OriginalUri(uri): OriginalUri,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, Problem> {
    info!("Deleting user: {}", raw_id);

    let id = parse_user_id(&raw_id).ok_or_else(|| user_not_found(&raw_id, uri.path()))?;

    svc.delete_user(id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| map_domain_error(&e, uri.path()))
}
