//! Axum request handlers for all service endpoints.
//!
//! Handlers only check that required fields are present and non-empty, then
//! hand off to [`crate::pipeline::DecryptionPipeline`].

use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        rejection::JsonRejection,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::protocol::{DecryptFileRequest, DecryptTextRequest, ErrorResponse, KeyMaterial};
use common::ServiceError;
use tracing::{error, warn};

use super::state::AppState;
use crate::pipeline::PipelineError;

/// Error wrapper that renders a [`ServiceError`] as a JSON error response.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_fatal() {
            error!(error = %err, "server key pair unavailable");
        } else {
            warn!(error = %err, "request failed");
        }
        Self(err.into())
    }
}

/// Keep 413 for oversized bodies and turn every other rejection into a 400.
fn rejection_error(status: StatusCode, body_text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(ServiceError::PayloadTooLarge(body_text))
    } else {
        ApiError(ServiceError::BadRequest(body_text))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        rejection_error(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self.0 {
            ServiceError::BadRequest(m)
            | ServiceError::NotFound(m)
            | ServiceError::PayloadTooLarge(m)
            | ServiceError::DecryptionFailure(m)
            | ServiceError::Unavailable(m)
            | ServiceError::Internal(m) => m.clone(),
        };
        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ServiceError::BadRequest(format!("{field} is required")).into());
    }
    Ok(())
}

/// Unwrap a JSON body or render its rejection.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::from(rejection).into_response())
}

/// `GET /ping`: liveness check.
pub async fn ping() -> &'static str {
    "pong"
}

/// `GET /key`: base64 body of the server public key.
pub async fn public_key(State(state): State<AppState>) -> Result<String, ApiError> {
    Ok(state.pipeline.public_key().await?)
}

/// `PATCH /decrypt`: decrypt an uploaded file to `decrypted-<fileName>`.
pub async fn decrypt_file(
    State(state): State<AppState>,
    body: Result<Json<DecryptFileRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let result = async {
        require("fileName", &req.file_name)?;
        state.pipeline.decrypt_file(&req.file_name).await?;
        Ok::<_, ApiError>("ok")
    }
    .await;
    result.into_response()
}

/// `POST /decryptText`: decrypt a base64 message and return the plaintext
/// as a JSON string.
pub async fn decrypt_text(
    State(state): State<AppState>,
    body: Result<Json<DecryptTextRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let result = async {
        require("message", &req.message)?;
        require("key", &req.key)?;
        require("iv", &req.iv)?;
        let plaintext = state
            .pipeline
            .decrypt_text(&req.message, &req.key, &req.iv)
            .await?;
        Ok::<_, ApiError>(Json(plaintext))
    }
    .await;
    result.into_response()
}

/// `POST /upload`: multipart form with a `file` part (its file name is kept)
/// and `key` / `iv` text parts.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<&'static str, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut key: Option<String> = None;
    let mut iv: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ServiceError::BadRequest("file part has no file name".into()))?;
                let contents = field.bytes().await?;
                file = Some((file_name, contents));
            }
            "key" | "iv" => {
                let value = field.text().await?;
                if name == "key" {
                    key = Some(value);
                } else {
                    iv = Some(value);
                }
            }
            _ => {}
        }
    }

    let (file_name, contents) =
        file.ok_or_else(|| ServiceError::BadRequest("file is required".into()))?;
    let key = key.unwrap_or_default();
    let iv = iv.unwrap_or_default();
    require("key", &key)?;
    require("iv", &iv)?;

    let material = KeyMaterial { key, iv };
    state.pipeline.upload(&file_name, contents, &material).await?;
    Ok("ok")
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
