//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "FOURCUT_DEBUG")]
    /// Enable debug logging. Env: FOURCUT_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "FOURCUT_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: FOURCUT_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "FOURCUT_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: FOURCUT_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// Server-wide API key. Without one, the form asks each user for theirs.
    /// Env: OPENAI_API_KEY
    pub openai_api_key: Option<String>,

    #[clap(
        long,
        default_value = "https://api.openai.com/v1",
        env = "FOURCUT_OPENAI_BASE_URL"
    )]
    /// Root of the OpenAI-compatible API.
    /// Env: FOURCUT_OPENAI_BASE_URL
    pub openai_base_url: String,

    #[clap(long, default_value = "gpt-4o-mini", env = "FOURCUT_TEXT_MODEL")]
    /// Vision-capable text model for photo analysis, storyboard and prompts.
    /// Env: FOURCUT_TEXT_MODEL
    pub text_model: String,

    #[clap(long, default_value = "dall-e-3", env = "FOURCUT_IMAGE_MODEL")]
    /// Image generation model.
    /// Env: FOURCUT_IMAGE_MODEL
    pub image_model: String,

    #[clap(long, default_value = "English", env = "FOURCUT_DIALOGUE_LANGUAGE")]
    /// Language the panel dialogue is written in.
    /// Env: FOURCUT_DIALOGUE_LANGUAGE
    pub dialogue_language: String,

    #[clap(long, env = "FOURCUT_FONT_PATH")]
    /// TrueType font for bubble text, eg `/usr/share/fonts/truetype/nanum/NanumGothic.ttf`.
    /// Env: FOURCUT_FONT_PATH
    pub font_path: Option<PathBuf>,

    #[clap(long, env = "FOURCUT_NO_FONT_DOWNLOAD")]
    /// Don't download a fallback font when none is installed.
    /// Env: FOURCUT_NO_FONT_DOWNLOAD
    pub no_font_download: bool,

    #[clap(long, env = "FOURCUT_DEBUG_DIR")]
    /// Write every raw model API response into this directory.
    /// Env: FOURCUT_DEBUG_DIR
    pub debug_dir: Option<PathBuf>,
}
