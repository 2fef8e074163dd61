//! A stand-in for the OpenAI API, served by axum on a random local port.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};

use fourcut::config::{ModelConfig, parse_base_url};
use fourcut::openai::OpenAiClient;

/// Image prompts containing this fail on the first try.
pub const STORMY: &str = "stormy rooftop";

/// How the mock misbehaves.
#[derive(Clone, Debug, Default)]
pub struct Behaviour {
    /// Also fail the simplified retry prompt.
    pub fail_simplified: bool,
    /// Fail every image request.
    pub fail_all_images: bool,
    /// Answer every chat request with this status.
    pub chat_status: Option<StatusCode>,
    /// Answer image requests with a `url` to download instead of `b64_json`.
    pub image_urls: bool,
}

#[derive(Clone, Debug)]
struct MockState {
    behaviour: Behaviour,
    base_url: String,
    image_bodies: Arc<Mutex<Vec<Value>>>,
    chat_bodies: Arc<Mutex<Vec<Value>>>,
    downloads: Arc<Mutex<Vec<String>>>,
}

pub struct MockApi {
    pub base_url: String,
    image_bodies: Arc<Mutex<Vec<Value>>>,
    chat_bodies: Arc<Mutex<Vec<Value>>>,
    downloads: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    pub async fn start(behaviour: Behaviour) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock");
        let addr = listener.local_addr().expect("mock addr");
        let state = MockState {
            behaviour,
            base_url: format!("http://{addr}/v1"),
            image_bodies: Arc::default(),
            chat_bodies: Arc::default(),
            downloads: Arc::default(),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(chat_handler))
            .route("/v1/images/generations", post(images_handler))
            .route("/v1/files/{name}", get(download_handler))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        Self {
            base_url: state.base_url,
            image_bodies: state.image_bodies,
            chat_bodies: state.chat_bodies,
            downloads: state.downloads,
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            base_url: parse_base_url(&self.base_url).expect("base url"),
            api_key: Some("sk-test".to_string()),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            dialogue_language: "English".to_string(),
            debug_dir: None,
        }
    }

    pub fn client(&self) -> OpenAiClient {
        self.client_for("dall-e-3")
    }

    pub fn client_for(&self, image_model: &str) -> OpenAiClient {
        let config = ModelConfig {
            image_model: image_model.to_string(),
            ..self.model_config()
        };
        config
            .client(reqwest::Client::new(), "sk-test".to_string())
            .expect("client")
    }

    pub fn image_bodies(&self) -> Vec<Value> {
        self.image_bodies.lock().expect("lock").clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_bodies()
            .iter()
            .map(|body| body["prompt"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().expect("lock").clone()
    }

    pub fn chat_bodies(&self) -> Vec<Value> {
        self.chat_bodies.lock().expect("lock").clone()
    }
}

pub fn solid_png(color: [u8; 3], width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut output = Cursor::new(Vec::new());
    image
        .write_to(&mut output, ImageFormat::Png)
        .expect("encode png");
    output.into_inner()
}

fn chat_reply(content: &str) -> Response {
    Json(json!({
        "id": "chatcmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

const PANELS_REPLY: &str = r#"```json
{"panels": [
    {"description": "Our hero wakes up late", "dialogue": "Oh no, I overslept!"},
    {"description": "Running across a stormy rooftop", "dialogue": "Almost there"},
    {"description": "Bursting into the office", "dialogue": "Made it!"}
]}
```"#;

async fn chat_handler(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.chat_bodies.lock().expect("lock").push(body.clone());
    if let Some(status) = state.behaviour.chat_status {
        return (status, Json(json!({"error": {"message": "mock failure"}}))).into_response();
    }
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    if system.contains("\"panels\"") {
        // three panels, the fourth gets padded
        chat_reply(PANELS_REPLY)
    } else if system.contains("\"prompts\"") {
        let prompts = json!({"prompts": [
            "a sleepy person in bed, morning light",
            format!("a person running across a {STORMY}"),
            "a person bursting through an office door",
        ]});
        chat_reply(&prompts.to_string())
    } else {
        chat_reply("A young adult with short black hair, round glasses and a striped shirt.")
    }
}

async fn images_handler(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    state.image_bodies.lock().expect("lock").push(body);

    let behaviour = &state.behaviour;
    let simplified = prompt.starts_with("single comic panel,");
    let fail = behaviour.fail_all_images
        || prompt.contains(STORMY)
        || (simplified && behaviour.fail_simplified);
    if fail {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "content_policy_violation"}})),
        )
            .into_response();
    }
    if behaviour.image_urls {
        let count = state.image_bodies.lock().expect("lock").len();
        return Json(json!({
            "created": 0,
            "data": [{"url": format!("{}/files/image-{count}.png", state.base_url)}]
        }))
        .into_response();
    }
    let png = solid_png([90, 140, 200], 64, 64);
    Json(json!({
        "created": 0,
        "data": [{
            "b64_json": general_purpose::STANDARD.encode(png),
            "revised_prompt": prompt
        }]
    }))
    .into_response()
}

async fn download_handler(State(state): State<MockState>, Path(name): Path<String>) -> Response {
    state.downloads.lock().expect("lock").push(name);
    (
        [(axum::http::header::CONTENT_TYPE, "image/png")],
        solid_png([200, 60, 60], 32, 32),
    )
        .into_response()
}
