use rand::distr::{Alphanumeric, SampleString};
use tower_sessions::Session;

use crate::constants::CSRF_TOKEN_LENGTH;
use crate::error::ComicError;

const CSRF_TOKEN_KEY: &str = "csrf_token";

fn generate_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), CSRF_TOKEN_LENGTH)
}

/// Returns the session's CSRF token, creating one on first use.
pub(crate) async fn csrf_token(session: &Session) -> Result<String, ComicError> {
    let existing = session.get::<String>(CSRF_TOKEN_KEY).await?;
    let token = existing.unwrap_or_else(generate_token);
    session.insert(CSRF_TOKEN_KEY, token.clone()).await?;
    Ok(token)
}

pub(crate) async fn validate_csrf(session: &Session, token: &str) -> Result<(), ComicError> {
    let stored = session.get::<String>(CSRF_TOKEN_KEY).await?;
    match stored {
        Some(expected) if !token.is_empty() && expected == token => Ok(()),
        _ => Err(ComicError::Unauthorized),
    }
}
