//! Error handling

use axum::response::{IntoResponse, Redirect};
use tracing::info;

/// Errors the web handlers can return.
#[derive(Debug)]
pub enum ComicError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// Missing or invalid session / CSRF token
    Unauthorized,
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
    /// The run expired or never existed, send them back to the form
    RunExpired,
}

impl From<axum::http::Error> for ComicError {
    fn from(err: axum::http::Error) -> Self {
        ComicError::InternalServerError(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for ComicError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ComicError::InternalServerError(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ComicError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ComicError::BadRequest(err.body_text())
    }
}

impl From<image::ImageError> for ComicError {
    fn from(err: image::ImageError) -> Self {
        ComicError::InternalServerError(err.to_string())
    }
}

impl std::fmt::Display for ComicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComicError::BadRequest(message) => write!(f, "bad request: {message}"),
            ComicError::Unauthorized => f.write_str("unauthorized"),
            ComicError::NotFound(what) => write!(f, "not found: {what}"),
            ComicError::InternalServerError(message) => write!(f, "internal error: {message}"),
            ComicError::RunExpired => f.write_str("run expired"),
        }
    }
}

impl std::error::Error for ComicError {}

fn text_response(status: axum::http::StatusCode, body: String) -> axum::response::Response {
    let mut response = axum::response::Response::new(axum::body::Body::from(body));
    *response.status_mut() = status;
    response
}

impl IntoResponse for ComicError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ComicError::RunExpired => Redirect::to("/").into_response(),
            ComicError::BadRequest(message) => {
                info!("Bad request received: {}", message);
                text_response(
                    axum::http::StatusCode::BAD_REQUEST,
                    format!("Bad Request: {message}"),
                )
            }
            ComicError::Unauthorized => {
                info!("Unauthorized request received");
                text_response(
                    axum::http::StatusCode::UNAUTHORIZED,
                    "Unauthorized: invalid or missing session.".to_string(),
                )
            }
            ComicError::NotFound(url) => {
                tracing::error!("404 {url}");
                text_response(axum::http::StatusCode::NOT_FOUND, "Not Found".to_string())
            }
            ComicError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                text_response(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(
            ComicError::BadRequest("nope".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ComicError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ComicError::NotFound("/comics/x".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ComicError::RunExpired.into_response().status(),
            StatusCode::SEE_OTHER
        );
    }
}
