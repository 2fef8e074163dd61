//! Finds a TrueType font for bubble text.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use tracing::{debug, info, warn};

use crate::constants::{FALLBACK_FONT_FILE, FALLBACK_FONT_URL, FONT_CACHE_DIR, SYSTEM_FONT_PATHS};

/// Where to look for a font, in order.
#[derive(Clone, Debug)]
pub struct FontSources {
    /// Font given on the command line, tried first.
    pub configured: Option<PathBuf>,
    /// Directory the downloaded fallback is cached in.
    pub cache_dir: PathBuf,
    /// Whether to download the fallback when nothing else is found.
    pub allow_download: bool,
}

impl Default for FontSources {
    fn default() -> Self {
        Self {
            configured: None,
            cache_dir: FONT_CACHE_DIR.clone(),
            allow_download: true,
        }
    }
}

impl FontSources {
    fn cached_path(&self) -> PathBuf {
        self.cache_dir.join(FALLBACK_FONT_FILE)
    }
}

/// Reads and parses a font file.
pub async fn load_font_file(path: &Path) -> Option<FontVec> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(err) => {
            debug!("Can't read font {}: {}", path.display(), err);
            return None;
        }
    };
    match FontVec::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(_) => {
            warn!("Failed to parse font file: {}", path.display());
            None
        }
    }
}

/// Finds a font without touching the network.
pub async fn find_local_font(sources: &FontSources) -> Option<FontVec> {
    if let Some(path) = sources.configured.as_deref() {
        if let Some(font) = load_font_file(path).await {
            info!("Loaded configured font: {}", path.display());
            return Some(font);
        }
        warn!("Configured font {} is unusable, trying others", path.display());
    }

    for path in SYSTEM_FONT_PATHS {
        if let Some(font) = load_font_file(Path::new(path)).await {
            info!("Loaded system font: {}", path);
            return Some(font);
        }
    }

    let cached = sources.cached_path();
    if let Some(font) = load_font_file(&cached).await {
        info!("Loaded cached font: {}", cached.display());
        return Some(font);
    }
    None
}

/// Finds a font, downloading the fallback into the cache as a last resort.
///
/// Returns `None` when nothing works; bubbles are then skipped.
pub async fn load_font(sources: &FontSources, http: &reqwest::Client) -> Option<FontVec> {
    if let Some(font) = find_local_font(sources).await {
        return Some(font);
    }
    if !sources.allow_download {
        warn!("No font found and downloading is disabled, bubble text will be skipped");
        return None;
    }

    let cached = sources.cached_path();
    info!("No font found, downloading {}", FALLBACK_FONT_URL);
    let bytes = match download(http).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Font download failed: {}. Bubble text will be skipped", err);
            return None;
        }
    };
    if let Err(err) = tokio::fs::create_dir_all(&sources.cache_dir).await {
        warn!("Failed to create {}: {}", sources.cache_dir.display(), err);
    } else if let Err(err) = tokio::fs::write(&cached, &bytes).await {
        warn!("Failed to cache font at {}: {}", cached.display(), err);
    }
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(_) => {
            warn!("Downloaded font could not be parsed, bubble text will be skipped");
            None
        }
    }
}

async fn download(http: &reqwest::Client) -> Result<Vec<u8>, reqwest::Error> {
    let resp = http
        .get(FALLBACK_FONT_URL)
        .send()
        .await?
        .error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_font_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"definitely not a font").expect("write");
        assert!(load_font_file(&path).await.is_none());
        assert!(load_font_file(&dir.path().join("missing.ttf")).await.is_none());
    }

    #[tokio::test]
    async fn unusable_configured_font_falls_through_without_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sources = FontSources {
            configured: Some(dir.path().join("missing.ttf")),
            cache_dir: dir.path().join("cache"),
            allow_download: false,
        };
        let local = find_local_font(&sources).await.is_some();
        // nothing is fetched when downloads are off
        let loaded = load_font(&sources, &reqwest::Client::new()).await.is_some();
        assert_eq!(loaded, local);
        assert!(!sources.cached_path().exists());
    }
}
