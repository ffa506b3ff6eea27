//! Maps [`NapiError`] onto HTTP status and JSON body, per §7. Nothing
//! upstream of this module ever constructs a status code or response body
//! by hand; every handler returns `NapiResult<Json<T>>` or similar and lets
//! this `impl IntoResponse` do the translation, the same separation the
//! teacher keeps between `DatabaseError` and its web layer's `match ...
//! .into_response()` arms.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use napi_core::NapiError;
use napi_model::{FieldError, FieldErrorCode};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    errors: Vec<ErrorEntry>,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ErrorEntry {
    Field(FieldError),
    UsedBy { r#type: &'static str, id: String, code: &'static str },
}

fn respond(status: StatusCode, errors: Vec<ErrorEntry>, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { errors, message: message.into() })).into_response()
}

pub fn into_response(err: NapiError) -> Response {
    match err {
        NapiError::InvalidParams(validation) => {
            let message = validation.to_string();
            let errors = validation.errors.into_iter().map(ErrorEntry::Field).collect();
            respond(StatusCode::UNPROCESSABLE_ENTITY, errors, message)
        }
        NapiError::ResourceNotFound { ty, id } => respond(
            StatusCode::NOT_FOUND,
            vec![ErrorEntry::Field(FieldError {
                field: ty.to_string(),
                code: FieldErrorCode::InvalidParameter,
                message: format!("{ty} {id} not found"),
                invalid: None,
            })],
            format!("{ty} {id} not found"),
        ),
        NapiError::NotAuthorized { field } => respond(
            StatusCode::FORBIDDEN,
            vec![ErrorEntry::Field(FieldError {
                field: field.to_string(),
                code: FieldErrorCode::InvalidParameter,
                message: format!("caller is not authorized for this {field}"),
                invalid: None,
            })],
            "not authorized",
        ),
        NapiError::InUse { refs } => {
            let message = format!("in use by {} other record(s)", refs.len());
            let errors = refs
                .into_iter()
                .map(|r| ErrorEntry::UsedBy { r#type: r.ty, id: r.id, code: "UsedBy" })
                .collect();
            respond(StatusCode::UNPROCESSABLE_ENTITY, errors, message)
        }
        NapiError::SubnetFull { network } => respond(
            StatusCode::INSUFFICIENT_STORAGE,
            vec![],
            format!("network {network} has no free addresses"),
        ),
        NapiError::PoolFull { pool } => respond(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![],
            format!("pool {pool} has no free addresses"),
        ),
        NapiError::NicTagsAmbiguous => respond(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![],
            "pool has multiple nic tags and the caller supplied no hint",
        ),
        NapiError::PoolIpNotAllowed => respond(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![],
            "a concrete ip cannot be requested against a pool",
        ),
        NapiError::TransientRetryable => {
            respond(StatusCode::SERVICE_UNAVAILABLE, vec![], "storage is temporarily unavailable, retry the request")
        }
        NapiError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            respond(StatusCode::INTERNAL_SERVER_ERROR, vec![], "internal error")
        }
    }
}

/// Newtype so handlers can write `-> Result<Json<T>, ApiError>` and get
/// `?`-propagation straight from `napi_core::NapiResult`.
pub struct ApiError(pub NapiError);

impl From<NapiError> for ApiError {
    fn from(err: NapiError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        into_response(self.0)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
