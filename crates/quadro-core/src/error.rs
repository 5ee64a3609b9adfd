//! Error taxonomy for backend calls.
//!
//! Transport and validation failures are surfaced at the call site as
//! notices; authorization failures are handled once, globally, after the
//! session has been purged.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request rejected ({status}): {message}")]
    Validation { status: StatusCode, message: String },

    #[error("session expired or invalid: {0}")]
    Unauthorized(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("session store: {0}")]
    Session(#[source] anyhow::Error),

    /// Failure reported by a non-HTTP backend (tests, embedders).
    #[error("backend error: {0}")]
    Backend(String),
}

/// A failure already shown to the user as a notice. The CLI exits non-zero
/// without printing it a second time.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AlreadyReported(pub ApiError);

impl ApiError {
    /// Authorization failures are handled globally (token purge + re-login),
    /// never re-surfaced at the call site.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Forbidden(_))
    }

    /// Maps a non-success response to the taxonomy. `message` is the text
    /// extracted from the `{error}`/`{msg}` body, when there was one.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Validation { status, message },
        }
    }

    /// Short text suitable for a transient user notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "could not reach the server".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::Unauthorized(_) => "your session has expired, log in again".to_string(),
            Self::Forbidden(message) | Self::NotFound(message) => message.clone(),
            Self::Decode(_) => "the server sent an unexpected response".to_string(),
            Self::Session(_) => "could not access the local session".to_string(),
            Self::Backend(message) => message.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Rejections at the ingestion boundary, where wire DTOs become domain tasks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("task payload has no id")]
    MissingId,

    #[error("task {id} has unknown status {status:?}")]
    UnknownStatus { id: u64, status: String },

    #[error("task {id} has no owner")]
    MissingOwner { id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, None);
        assert!(err.is_authorization());
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = ApiError::from_status(StatusCode::FORBIDDEN, Some("Acesso negado".into()));
        assert!(err.is_authorization());
        assert_eq!(err.user_message(), "Acesso negado");

        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            Some("Status inválido para filtro.".into()),
        );
        assert!(!err.is_authorization());
        match err {
            ApiError::Validation { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Status inválido para filtro.");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_message_falls_back_to_reason_phrase() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert_eq!(err.user_message(), "Internal Server Error");
    }
}
