//! Config handling

use std::path::PathBuf;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::CliOptions;
use crate::openai::{ModelError, OpenAiClient};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Settings for talking to the hosted models, shared by every run.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// API root, eg `https://api.openai.com/v1/`.
    pub base_url: Url,
    /// Server-wide key. When unset, users supply their own on the form.
    pub api_key: Option<String>,
    /// Vision-capable text model used for every text stage.
    pub text_model: String,
    /// Image generation model.
    pub image_model: String,
    /// Language the dialogue is written in.
    pub dialogue_language: String,
    /// If set, raw API responses are written here.
    pub debug_dir: Option<PathBuf>,
}

impl ModelConfig {
    /// Builds the model config from the command line.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: parse_base_url(&cli.openai_base_url)?,
            api_key: cli
                .openai_api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            text_model: cli.text_model.clone(),
            image_model: cli.image_model.clone(),
            dialogue_language: cli.dialogue_language.clone(),
            debug_dir: cli.debug_dir.clone(),
        })
    }

    /// Picks the key to use for a request: the user's, then the server's.
    pub fn effective_key(&self, user_key: Option<&str>) -> Option<String> {
        user_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
    }

    /// Builds a client for one run.
    pub fn client(&self, http: reqwest::Client, api_key: String) -> Result<OpenAiClient, ModelError> {
        OpenAiClient::new(
            http,
            self.base_url.clone(),
            api_key,
            &self.text_model,
            &self.image_model,
        )
        .map(|client| client.with_debug_dir(self.debug_dir.clone()))
    }
}

/// Parses the API root, making sure it ends in a slash so `Url::join` keeps the path.
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_path_when_joined() {
        let url = parse_base_url("https://api.openai.com/v1").expect("parse");
        assert_eq!(
            url.join("chat/completions").expect("join").as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        let url = parse_base_url("http://127.0.0.1:9999/v1/").expect("parse");
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/v1/");
    }

    #[test]
    fn user_key_wins_over_server_key() {
        let config = ModelConfig {
            base_url: parse_base_url("http://localhost").expect("parse"),
            api_key: Some("server".to_string()),
            text_model: "t".to_string(),
            image_model: "i".to_string(),
            dialogue_language: "English".to_string(),
            debug_dir: None,
        };
        assert_eq!(config.effective_key(Some(" mine ")).as_deref(), Some("mine"));
        assert_eq!(config.effective_key(Some("  ")).as_deref(), Some("server"));
        assert_eq!(config.effective_key(None).as_deref(), Some("server"));
    }
}
