use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// The error taxonomy of the prediction pipeline.
///
/// `TransientUpstream` and `MalformedPayload` are normally absorbed inside the
/// fetcher and crawler adapters respectively; they're exposed here so
/// orchestrator code can match on them when it does need to distinguish.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("readiness probe timed out after {attempts} attempts")]
    DataIncomplete { attempts: u32 },

    #[error("duplicate record for ({region}, {username}) in contest {contest_slug}")]
    Duplicate {
        contest_slug: String,
        region: String,
        username: String,
    },

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("store pool error: {0}")]
    Pool(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::TransientUpstream(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedPayload(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

/// Error wrapper for the read API; maps the internal taxonomy onto HTTP status codes.
pub struct AppError(pub Error);

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            Error::TransientUpstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERR"),
            Error::MalformedPayload(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_PARSE_ERR"),
            Error::DataIncomplete { .. } => (StatusCode::SERVICE_UNAVAILABLE, "DATA_INCOMPLETE"),
            Error::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
            Error::Store(_) | Error::Pool(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERR"),
            Error::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ERR"),
        };

        let body = ErrorResponse {
            code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError(e)
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError(Error::Other(eyre::eyre!(e)))
    }
}
