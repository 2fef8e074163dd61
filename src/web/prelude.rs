pub(crate) use crate::error::ComicError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, Path, State};
pub(crate) use axum::http::{HeaderMap, header::CONTENT_TYPE};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use tower_sessions::Session;
pub(crate) use tracing::{debug, error, info, instrument, warn};
