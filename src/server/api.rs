//! Response envelope and error mapping shared by both route trees.

use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Fixed result statuses carried in every envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStatus {
    Success,
    ServerError,
    BadRequest,
    NotFound,
    ListEmpty,
    UnAuthorized,
    LogicError,
}

impl ApiStatus {
    pub fn code(self) -> u8 {
        match self {
            ApiStatus::Success => 0,
            ApiStatus::ServerError => 1,
            ApiStatus::BadRequest => 2,
            ApiStatus::NotFound => 3,
            ApiStatus::ListEmpty => 4,
            ApiStatus::UnAuthorized => 5,
            ApiStatus::LogicError => 6,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ApiStatus::Success => "The operation completed successfully",
            ApiStatus::ServerError => "An error occurred on the server",
            ApiStatus::BadRequest => "The submitted parameters are not valid",
            ApiStatus::NotFound => "Not found",
            ApiStatus::ListEmpty => "The list is empty",
            ApiStatus::UnAuthorized => "Authentication has not been performed",
            ApiStatus::LogicError => "An error occurred while processing",
        }
    }
}

#[derive(Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub is_success: bool,
    pub status_code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn envelope<T: Serialize>(
    http: StatusCode,
    status: ApiStatus,
    message: String,
    data: Option<T>,
) -> Response {
    (
        http,
        Json(ApiEnvelope {
            is_success: status == ApiStatus::Success,
            status_code: status.code(),
            message,
            data,
        }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    envelope(
        StatusCode::OK,
        ApiStatus::Success,
        ApiStatus::Success.message().to_string(),
        Some(data),
    )
}

pub fn ok_empty() -> Response {
    envelope::<()>(
        StatusCode::OK,
        ApiStatus::Success,
        ApiStatus::Success.message().to_string(),
        None,
    )
}

/// Lists report `ListEmpty` instead of `Success` when nothing matched.
pub fn ok_list<T: Serialize>(items: Vec<T>) -> Response {
    if items.is_empty() {
        return envelope(
            StatusCode::OK,
            ApiStatus::ListEmpty,
            ApiStatus::ListEmpty.message().to_string(),
            Some(items),
        );
    }
    ok(items)
}

pub fn bad_request(message: impl Into<String>) -> Response {
    envelope::<()>(StatusCode::BAD_REQUEST, ApiStatus::BadRequest, message.into(), None)
}

pub fn unauthorized() -> Response {
    envelope::<()>(
        StatusCode::UNAUTHORIZED,
        ApiStatus::UnAuthorized,
        ApiStatus::UnAuthorized.message().to_string(),
        None,
    )
}

/// Maps the store taxonomy onto HTTP statuses: NotFound 404, rule and
/// validation failures 400, auth 401, the rest 500.
pub fn err(error: StoreError) -> Response {
    use crate::domain::rules::RuleViolation;
    match error {
        StoreError::NotFound(what) => envelope::<()>(
            StatusCode::NOT_FOUND,
            ApiStatus::NotFound,
            format!("{} not found", what),
            None,
        ),
        StoreError::Validation(message) | StoreError::Duplicate(message) => {
            bad_request(message)
        }
        StoreError::Rule(RuleViolation::LastAdmin) => envelope::<()>(
            StatusCode::BAD_REQUEST,
            ApiStatus::LogicError,
            RuleViolation::LastAdmin.to_string(),
            None,
        ),
        StoreError::Rule(violation) => bad_request(violation.to_string()),
        StoreError::Unauthorized => unauthorized(),
        StoreError::Cancelled => envelope::<()>(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiStatus::ServerError,
            "The request was cancelled".to_string(),
            None,
        ),
        StoreError::Storage(inner) => {
            error!("Storage failure: {:#}", inner);
            envelope::<()>(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiStatus::ServerError,
                ApiStatus::ServerError.message().to_string(),
                None,
            )
        }
    }
}

/// `match result { Ok -> projection, Err -> mapped error }` in one place.
pub fn respond<T, S: Serialize>(result: crate::store::StoreResult<T>, project: impl FnOnce(T) -> S) -> Response {
    match result {
        Ok(value) => ok(project(value)),
        Err(error) => err(error),
    }
}

pub fn respond_empty<T>(result: crate::store::StoreResult<T>) -> Response {
    match result {
        Ok(_) => ok_empty(),
        Err(error) => err(error),
    }
}

pub fn respond_list<T: Serialize>(result: crate::store::StoreResult<Vec<T>>) -> Response {
    match result {
        Ok(items) => ok_list(items),
        Err(error) => err(error),
    }
}
