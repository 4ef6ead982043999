use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::api::rest::handlers;
use crate::domain::service::Service;

pub const USERS_PATH: &str = "/api/v1/users";
pub const USER_PATH: &str = "/api/v1/users/{id}";

/// Mount the users REST API onto `router`.
///
/// - GET    /api/v1/users       list (increment + users keyed by id)
/// - POST   /api/v1/users       create
/// - GET    /api/v1/users/{id}  fetch one
/// - PATCH  /api/v1/users/{id}  change display name
/// - DELETE /api/v1/users/{id}  delete
pub fn register_routes(router: Router, service: Arc<Service>) -> Router {
    let users = Router::new()
        .route(USERS_PATH, get(handlers::list_users).post(handlers::create_user))
        .route(
            USER_PATH,
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .layer(Extension(service));

    router.merge(users)
}
