use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Errors surfaced to callers of the `get_best_image*` family.
#[derive(Debug, thiserror::Error)]
pub enum PickError {
    /// The target page could not be loaded (non-2xx or transport failure).
    #[error("document fetch failed: {0}")]
    DocumentFetch(String),

    /// No extraction source produced a usable candidate.
    #[error("no images found")]
    NoImagesFound,

    /// Every batch was validated and nothing survived.
    #[error("no valid image found")]
    NoValidImage,
}

/// Per-candidate validation failure. Never fatal for a lookup.
///
/// `Clone` because one coalesced fetch result is handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("declared type {declared} but got {detected}")]
    TypeMismatch { declared: String, detected: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ValidationError {
    /// Unreachable resources are the only ones worth a second try under a
    /// rewritten address.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Soft stylesheet failures: the sheet is skipped, extraction continues.
#[derive(Debug, thiserror::Error)]
pub enum StylesheetError {
    #[error("stylesheet fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("stylesheet parse failed at byte {offset}: {reason}")]
    Parse { offset: usize, reason: String },
}

#[derive(Debug)]
pub enum AppError {
    /// Status code with a plain-text message body.
    Msg(StatusCode, String),
    /// Lookup failure; mapped to a status and logged.
    Pick(PickError),
}

impl From<(StatusCode, String)> for AppError {
    fn from((code, msg): (StatusCode, String)) -> Self {
        Self::Msg(code, msg)
    }
}

impl From<PickError> for AppError {
    fn from(e: PickError) -> Self {
        Self::Pick(e)
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Msg(code, msg) => (code, msg).into_response(),
            Self::Pick(err) => {
                let code = match err {
                    PickError::DocumentFetch(_) => StatusCode::BAD_GATEWAY,
                    PickError::NoImagesFound | PickError::NoValidImage => StatusCode::NOT_FOUND,
                };
                if code.is_server_error() {
                    tracing::error!("{err}");
                } else {
                    tracing::info!("{err}");
                }
                let body = Json(ErrBody {
                    error: err.to_string(),
                });
                (code, body).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_errors_map_to_statuses() {
        let res = AppError::from(PickError::DocumentFetch("HTTP 500".into())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let res = AppError::from(PickError::NoValidImage).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = AppError::from((StatusCode::BAD_REQUEST, "bad".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn only_transport_failures_are_unreachable() {
        assert!(ValidationError::Transport("refused".into()).is_unreachable());
        assert!(ValidationError::Timeout(std::time::Duration::from_secs(5)).is_unreachable());
        assert!(!ValidationError::UnsupportedType("text/html".into()).is_unreachable());
    }
}
