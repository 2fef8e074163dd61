//! Client for the OpenAI-compatible chat completion and image generation endpoints.
//!
//! Chat docs: <https://platform.openai.com/docs/api-reference/chat>
//! Images docs: <https://platform.openai.com/docs/api-reference/images>

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::IMAGE_GENERATION_SIZE;

/// Errors from the hosted model API.
#[derive(Debug)]
pub enum ModelError {
    /// The request never got a response.
    Request(reqwest::Error),
    /// The API answered with a non-success status.
    Api {
        /// HTTP status of the response.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },
    /// The response didn't contain what we asked for.
    InvalidResponse(String),
    /// An endpoint URL couldn't be built.
    Url(url::ParseError),
}

impl ModelError {
    /// The HTTP status the API answered with, if it got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(err) => err.status(),
            _ => None,
        }
    }

    /// A message that tells the user what to do about it.
    pub fn user_message(&self) -> String {
        match self.status().map(|status| status.as_u16()) {
            Some(400) => "The model API rejected the request. The prompt may have violated the \
                content policy, or the API key may be invalid."
                .to_string(),
            Some(401) => "The API key is invalid or has expired.".to_string(),
            Some(429) => {
                "The API rate limit was exceeded. Please wait a moment and try again.".to_string()
            }
            Some(code) if code >= 500 => {
                "The model provider had a server error. Please try again shortly.".to_string()
            }
            _ => format!("Something went wrong: {self}"),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(err) => write!(f, "request to model API failed: {err}"),
            Self::Api { status, body } => write!(f, "model API error {status}: {body}"),
            Self::InvalidResponse(message) => write!(f, "unexpected model API response: {message}"),
            Self::Url(err) => write!(f, "invalid model API URL: {err}"),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err)
    }
}

impl From<url::ParseError> for ModelError {
    fn from(err: url::ParseError) -> Self {
        Self::Url(err)
    }
}

/// Image quality requested from the image model.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ImageQuality {
    /// Cheaper, the default.
    #[default]
    Standard,
    /// More detail.
    Hd,
}

impl ImageQuality {
    /// Form/API value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Hd => "hd",
        }
    }
}

impl FromStr for ImageQuality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "hd" => Ok(Self::Hd),
            _ => Err(()),
        }
    }
}

/// Rendering style requested from `dall-e-3`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ImageStyle {
    /// Muted, more realistic.
    Natural,
    /// Hyper-real and dramatic, the default.
    #[default]
    Vivid,
}

impl ImageStyle {
    /// Form/API value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Vivid => "vivid",
        }
    }
}

impl FromStr for ImageStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "vivid" => Ok(Self::Vivid),
            _ => Err(()),
        }
    }
}

/// Knobs for a single chat completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChatOptions {
    /// Cap on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Ask for a JSON object response.
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Request body for POST /images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,

    // For GPT image models.
    #[serde(skip_serializing_if = "Option::is_none")]
    output_format: Option<&'a str>,

    // For dall-e models.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// Talks to one OpenAI-compatible API with one key.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: reqwest::Client,
    chat_url: Url,
    images_url: Url,
    api_key: String,
    text_model: String,
    image_model: String,
    debug_dir: Option<PathBuf>,
}

impl OpenAiClient {
    /// Creates a client. `base_url` should end in a slash, see [`crate::config::parse_base_url`].
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        api_key: String,
        text_model: &str,
        image_model: &str,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            http,
            chat_url: base_url.join("chat/completions")?,
            images_url: base_url.join("images/generations")?,
            api_key,
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            debug_dir: None,
        })
    }

    /// Dump every raw response body into `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    /// Name of the text model in use.
    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    async fn write_api_response(&self, prefix: &str, ext: &str, bytes: &[u8]) {
        static API_RESPONSE_SEQ: AtomicUsize = AtomicUsize::new(0);
        let Some(dir) = self.debug_dir.as_ref() else {
            return;
        };
        let seq = API_RESPONSE_SEQ.fetch_add(1, Ordering::Relaxed);
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = dir.join(format!("debug_{prefix}_{ts}_{seq}.{ext}"));
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create debug dir {}: {}", dir.display(), err);
            return;
        }
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => debug!("API response saved to {}", path.display()),
            Err(err) => warn!("Failed to write {}: {}", path.display(), err),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &B,
        prefix: &str,
    ) -> Result<Vec<u8>, ModelError> {
        let resp = self
            .http
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        self.write_api_response(prefix, "json", &bytes).await;
        if !status.is_success() {
            return Err(ModelError::Api {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }

    /// Runs a chat completion against the text model and returns the reply text.
    ///
    /// `user_content` is either a plain string or an array of content parts.
    pub async fn chat(
        &self,
        system: &str,
        user_content: Value,
        options: ChatOptions,
    ) -> Result<String, ModelError> {
        let mut body = json!({
            "model": self.text_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user_content}
            ]
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if options.json {
            body["response_format"] = json!({"type": "json_object"});
        }

        let bytes = self.post_json(&self.chat_url, &body, "chat").await?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ModelError::InvalidResponse(format!("chat completion JSON: {err}")))?;
        if let Some(err) = parsed.error {
            return Err(ModelError::InvalidResponse(format!("chat completion error: {err}")));
        }
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ModelError::InvalidResponse("chat completion had no content".to_string()))
    }

    /// Generates a single square image and returns the encoded bytes.
    pub async fn generate_image(
        &self,
        prompt: &str,
        quality: ImageQuality,
        style: ImageStyle,
    ) -> Result<Vec<u8>, ModelError> {
        // GPT image models always return base64 and take output_format.
        // DALL·E models can return url or b64_json.
        let is_gpt_image = self.image_model.starts_with("gpt-image");
        let req_body = if is_gpt_image {
            ImagesGenerateRequest {
                model: &self.image_model,
                prompt,
                n: 1,
                size: IMAGE_GENERATION_SIZE,
                quality: Some(match quality {
                    ImageQuality::Standard => "medium",
                    ImageQuality::Hd => "high",
                }),
                output_format: Some("png"),
                response_format: None,
                style: None,
            }
        } else if self.image_model == "dall-e-3" {
            ImagesGenerateRequest {
                model: &self.image_model,
                prompt,
                n: 1,
                size: IMAGE_GENERATION_SIZE,
                quality: Some(quality.as_str()),
                output_format: None,
                response_format: Some("b64_json"),
                style: Some(style.as_str()),
            }
        } else {
            // dall-e-2 etc
            ImagesGenerateRequest {
                model: &self.image_model,
                prompt,
                n: 1,
                size: IMAGE_GENERATION_SIZE,
                quality: None,
                output_format: None,
                response_format: Some("b64_json"),
                style: None,
            }
        };

        let bytes = self
            .post_json(&self.images_url, &req_body, "images_generate")
            .await?;
        let parsed: ImagesGenerateResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ModelError::InvalidResponse(format!("image generation JSON: {err}")))?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no image data returned".to_string()))?;

        if let Some(revised_prompt) = first.revised_prompt {
            debug!("Revised prompt from the image model: {revised_prompt}");
        }

        if let Some(b64_json) = first.b64_json {
            general_purpose::STANDARD
                .decode(b64_json)
                .map_err(|err| ModelError::InvalidResponse(format!("image base64: {err}")))
        } else if let Some(url) = first.url {
            info!("Downloading generated image");
            let resp = self.http.get(url).send().await?;
            let status = resp.status();
            let bytes = resp.bytes().await?;
            self.write_api_response("image_download", "bin", &bytes).await;
            if !status.is_success() {
                return Err(ModelError::Api {
                    status,
                    body: format!("image download returned {} bytes", bytes.len()),
                });
            }
            Ok(bytes.to_vec())
        } else {
            Err(ModelError::InvalidResponse(
                "image response missing b64_json and url fields".to_string(),
            ))
        }
    }
}

/// Builds a `data:` URL for inlining an image into a chat message.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(bytes)
    )
}
