use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::ComicError;

const FLASH_KEY: &str = "flash";

/// A one-shot message shown on the next page load.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct FlashMessage {
    pub(crate) text: String,
    /// CSS class: `success`, `warning` or `error`.
    pub(crate) class: String,
}

impl FlashMessage {
    pub(crate) fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: "success".to_string(),
        }
    }

    pub(crate) fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: "warning".to_string(),
        }
    }

    pub(crate) fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            class: "error".to_string(),
        }
    }
}

pub(crate) async fn set_flash(session: &Session, message: FlashMessage) -> Result<(), ComicError> {
    session.insert(FLASH_KEY, message).await?;
    Ok(())
}

pub(crate) async fn take_flash_message(
    session: &Session,
) -> Result<Option<FlashMessage>, ComicError> {
    Ok(session.remove::<FlashMessage>(FLASH_KEY).await?)
}

/// The message shown after a render, depending on which panels failed.
pub(crate) fn render_outcome(failed: &[usize]) -> FlashMessage {
    if failed.is_empty() {
        return FlashMessage::success("Your comic is ready.");
    }
    let panels = failed
        .iter()
        .map(|index| (index + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    FlashMessage::warning(format!(
        "Panel(s) {panels} could not be generated and were left blank. Render again to retry."
    ))
}
