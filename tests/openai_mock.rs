//! Image and chat requests as the model API sees them.

mod common;

use common::{Behaviour, MockApi};
use fourcut::openai::{ChatOptions, ImageQuality, ImageStyle};
use serde_json::{Value, json};

fn decoded_size(bytes: &[u8]) -> (u32, u32) {
    fourcut::render::decode_rgb(bytes)
        .expect("png")
        .dimensions()
}

#[tokio::test]
async fn dall_e_3_gets_quality_style_and_base64() {
    let mock = MockApi::start(Behaviour::default()).await;
    let bytes = mock
        .client_for("dall-e-3")
        .generate_image("a cat on a fence", ImageQuality::Hd, ImageStyle::Natural)
        .await
        .expect("image");
    assert_eq!(decoded_size(&bytes), (64, 64));

    let body = &mock.image_bodies()[0];
    assert_eq!(body["model"], "dall-e-3");
    assert_eq!(body["n"], 1);
    assert_eq!(body["size"], "1024x1024");
    assert_eq!(body["quality"], "hd");
    assert_eq!(body["style"], "natural");
    assert_eq!(body["response_format"], "b64_json");
    assert_eq!(body.get("output_format"), None);
}

#[tokio::test]
async fn gpt_image_models_get_mapped_quality_and_png() {
    let mock = MockApi::start(Behaviour::default()).await;
    let client = mock.client_for("gpt-image-1");
    client
        .generate_image("a cat", ImageQuality::Standard, ImageStyle::Natural)
        .await
        .expect("image");
    client
        .generate_image("a cat", ImageQuality::Hd, ImageStyle::Vivid)
        .await
        .expect("image");

    let bodies = mock.image_bodies();
    assert_eq!(bodies[0]["quality"], "medium");
    assert_eq!(bodies[1]["quality"], "high");
    for body in &bodies {
        assert_eq!(body["model"], "gpt-image-1");
        assert_eq!(body["output_format"], "png");
        assert_eq!(body.get("response_format"), None);
        assert_eq!(body.get("style"), None);
    }
}

#[tokio::test]
async fn other_image_models_get_neither() {
    let mock = MockApi::start(Behaviour::default()).await;
    mock.client_for("dall-e-2")
        .generate_image("a cat", ImageQuality::Hd, ImageStyle::Natural)
        .await
        .expect("image");

    let body = &mock.image_bodies()[0];
    assert_eq!(body["response_format"], "b64_json");
    for field in ["quality", "style", "output_format"] {
        assert_eq!(body.get(field), None, "{field} should not be sent");
    }
}

#[tokio::test]
async fn url_responses_are_downloaded() {
    let mock = MockApi::start(Behaviour {
        image_urls: true,
        ..Default::default()
    })
    .await;
    let bytes = mock
        .client()
        .generate_image("a dog", ImageQuality::Standard, ImageStyle::Vivid)
        .await
        .expect("image");
    assert_eq!(decoded_size(&bytes), (32, 32));
    assert_eq!(mock.downloads(), vec!["image-1.png".to_string()]);
}

#[tokio::test]
async fn debug_dir_receives_raw_responses() {
    let mock = MockApi::start(Behaviour {
        image_urls: true,
        ..Default::default()
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dump = dir.path().join("dumps");
    let client = mock.client().with_debug_dir(Some(dump.clone()));

    let reply = client
        .chat(
            "Describe the person.",
            json!("who is this?"),
            ChatOptions::default(),
        )
        .await
        .expect("chat");
    assert!(reply.contains("round glasses"));
    client
        .generate_image("a dog", ImageQuality::Standard, ImageStyle::Vivid)
        .await
        .expect("image");

    let names: Vec<String> = std::fs::read_dir(&dump)
        .expect("dump dir was created")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
        .collect();
    let chat_dump = names
        .iter()
        .find(|name| name.starts_with("debug_chat_") && name.ends_with(".json"))
        .expect("chat response dumped");
    let saved: Value =
        serde_json::from_slice(&std::fs::read(dump.join(chat_dump)).expect("read dump"))
            .expect("dump is the raw json");
    assert_eq!(saved["id"], "chatcmpl-test");
    assert!(
        names
            .iter()
            .any(|name| name.starts_with("debug_images_generate_") && name.ends_with(".json"))
    );
    assert!(
        names
            .iter()
            .any(|name| name.starts_with("debug_image_download_") && name.ends_with(".bin"))
    );
}
