use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::api::rest::problem::Problem;
use crate::domain::error::DomainError;

/// 404 for an id that is absent or not a canonical positive integer
pub fn user_not_found(raw_id: &str, instance: &str) -> Problem {
    Problem::new(
        StatusCode::NOT_FOUND,
        "USERS_NOT_FOUND",
        "User not found",
        format!("User with id {raw_id} was not found"),
        instance,
    )
    .in_current_span()
}

/// 400 for a request body that could not be decoded
pub fn bad_body(rejection: &JsonRejection, instance: &str) -> Problem {
    Problem::new(
        StatusCode::BAD_REQUEST,
        "USERS_BAD_REQUEST",
        "Bad request",
        rejection.body_text(),
        instance,
    )
    .in_current_span()
}

pub fn map_domain_error(e: &DomainError, instance: &str) -> Problem {
    match e {
        DomainError::UserNotFound { id } => user_not_found(&id.to_string(), instance),
        DomainError::EmptyDisplayName
        | DomainError::DisplayNameTooLong { .. }
        | DomainError::EmptyEmail => Problem::new(
            StatusCode::BAD_REQUEST,
            "USERS_VALIDATION",
            "Validation error",
            e.to_string(),
            instance,
        )
        .in_current_span(),
        DomainError::Storage { .. } => {
            // Cause stays in the log; the client gets a generic detail.
            tracing::error!(error = %e, "users storage failure");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_STORAGE",
                "Internal error",
                "An internal storage error occurred",
                instance,
            )
            .in_current_span()
        }
    }
}
