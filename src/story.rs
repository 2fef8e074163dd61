//! The text-model stages: describing the photo, splitting the story into
//! panels, and writing an image prompt for each panel.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::constants::{
    CHARACTER_PROMPT_CHARS, CHARACTER_PROMPT_MIN_CHARS, CHARACTER_PROMPT_WORDS, DEFAULT_DIALOGUE,
    MAX_IMAGE_PROMPT_CHARS, PANEL_COUNT, PHOTO_DESCRIPTION_MAX_TOKENS, STORY_TEMPERATURE,
};
use crate::openai::{ChatOptions, ModelError, OpenAiClient, data_url};
use crate::render::Layout;

/// One frame of the comic.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// What the scene shows.
    #[serde(default)]
    pub description: String,
    /// What goes in the bubble.
    #[serde(default)]
    pub dialogue: String,
}

#[derive(Debug, Deserialize)]
struct PanelsReply {
    #[serde(default)]
    panels: Vec<Panel>,
}

#[derive(Debug, Deserialize)]
struct PromptsReply {
    #[serde(default)]
    prompts: Vec<String>,
}

static CODE_FENCE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$"));

/// Parses a JSON reply, tolerating a Markdown code fence around it.
fn parse_json_reply<T: for<'de> Deserialize<'de>>(reply: &str) -> Result<T, ModelError> {
    let body = match CODE_FENCE.as_ref() {
        Ok(fence) => fence
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .map_or(reply, |inner| inner.as_str()),
        Err(_) => reply,
    };
    serde_json::from_str(body.trim())
        .map_err(|err| ModelError::InvalidResponse(format!("structured reply: {err}: {reply}")))
}

const PHOTO_INSTRUCTIONS: &str = "You are an expert at analysing photos of people. Describe the \
    person's appearance in detail: age, gender, hair style, facial features, expression and \
    clothing. The description will be used to design a comic character, so focus on what an \
    illustrator would need.";

const PHOTO_REQUEST: &str = "Describe the person in this photo in detail so they can be drawn as \
    a comic character.";

/// Stage (a): asks the vision model to describe the person in the photo.
pub async fn describe_photo(
    client: &OpenAiClient,
    photo: &[u8],
    mime: &str,
) -> Result<String, ModelError> {
    info!(
        "Describing photo ({}, {} bytes) with model {}",
        mime,
        photo.len(),
        client.text_model()
    );
    let content = json!([
        {"type": "text", "text": PHOTO_REQUEST},
        {"type": "image_url", "image_url": {"url": data_url(mime, photo)}}
    ]);
    let description = client
        .chat(
            PHOTO_INSTRUCTIONS,
            content,
            ChatOptions {
                max_tokens: Some(PHOTO_DESCRIPTION_MAX_TOKENS),
                ..Default::default()
            },
        )
        .await?;
    let description = description.trim().to_string();
    debug!("Character description: {description}");
    Ok(description)
}

fn storyboard_instructions(layout: Layout, language: &str) -> String {
    format!(
        r#"You are a comic artist. Split the user's story into {PANEL_COUNT} panels and describe in detail what each panel should show.
The main character is based on the person in the user's photo; use the character description you are given.

The chosen page layout is '{letter}': {layout_description} Compose each scene to suit its panel's size and place on the page.

Every panel must have a short line of dialogue or narration written in {language}.

Return JSON in this shape:
{{
    "panels": [
        {{"description": "panel 1 scene, reflecting the character's features", "dialogue": "dialogue in {language} (required)"}},
        ...
        {{"description": "panel {PANEL_COUNT} scene, reflecting the character's features", "dialogue": "dialogue in {language} (required)"}}
    ]
}}

Keep the dialogue brief but make sure it carries the story."#,
        letter = layout.letter(),
        layout_description = layout.description(),
    )
}

fn storyboard_request(story: &str, character: &str, layout: Layout, language: &str) -> String {
    format!(
        r#"Turn this story into a {PANEL_COUNT}-panel comic and describe what each panel shows.

Story: {story}

Main character (from the uploaded photo):
{character}

Layout: {letter}

Make this character the hero and reflect their looks in every panel description.
Give every panel brief, natural dialogue or narration in {language}."#,
        letter = layout.letter(),
    )
}

/// Pads or trims model output to exactly [`PANEL_COUNT`] panels.
pub fn normalize_panels(mut panels: Vec<Panel>) -> Vec<Panel> {
    if panels.len() != PANEL_COUNT {
        warn!(
            "Model returned {} panel(s), expected {}",
            panels.len(),
            PANEL_COUNT
        );
    }
    panels.truncate(PANEL_COUNT);
    while panels.len() < PANEL_COUNT {
        panels.push(Panel {
            description: format!("Panel {}", panels.len() + 1),
            dialogue: DEFAULT_DIALOGUE.to_string(),
        });
    }
    for (index, panel) in panels.iter_mut().enumerate() {
        if panel.description.trim().is_empty() {
            panel.description = format!("Panel {}", index + 1);
        }
    }
    panels
}

/// Stage (b): splits the story into exactly four panels of scene + dialogue.
pub async fn split_story(
    client: &OpenAiClient,
    story: &str,
    character: &str,
    layout: Layout,
    language: &str,
) -> Result<Vec<Panel>, ModelError> {
    info!("Splitting story into {} panels", PANEL_COUNT);
    let reply = client
        .chat(
            &storyboard_instructions(layout, language),
            json!(storyboard_request(story, character, layout, language)),
            ChatOptions {
                temperature: Some(STORY_TEMPERATURE),
                json: true,
                ..Default::default()
            },
        )
        .await?;
    let parsed: PanelsReply = parse_json_reply(&reply)?;
    Ok(normalize_panels(parsed.panels))
}

fn prompt_instructions(layout: Layout) -> String {
    format!(
        r#"You write prompts for an image generation model. Turn comic scene descriptions into detailed prompts the model will understand.
Describe the main character, who is based on the user's photo, accurately.

The page layout is '{letter}'. This is a {PANEL_COUNT}-panel comic.

Important: do not include speech bubbles or any text. They are added separately later.

Return JSON in this shape:
{{
    "prompts": [
        "prompt for panel 1 (no speech bubbles)",
        ...
        "prompt for panel {PANEL_COUNT} (no speech bubbles)"
    ]
}}

Every prompt must stress:
1. the comic style and a crisp, clear image
2. the character's features and expression
3. the scene, with expressions and gestures that fit the dialogue
4. that this is a single panel of a {PANEL_COUNT}-panel comic

Never include speech bubbles or text."#,
        letter = layout.letter(),
    )
}

fn prompt_request(panels: &[Panel], style: &str, character: &str, layout: Layout) -> String {
    let scenes = serde_json::to_string(panels).unwrap_or_default();
    format!(
        r#"Turn these comic scene descriptions into detailed image generation prompts.

Comic style: {style}
Layout: {letter}
Panels: {PANEL_COUNT}

Main character (from the uploaded photo):
{character}

Scenes: {scenes}

Every prompt must include:
1. "single comic panel, {style}, crisp image"
2. an accurate description of the character's features and expression
3. expressions and gestures that fit the dialogue

Important: no speech bubbles or text."#,
        letter = layout.letter(),
    )
}

/// Lines model prompts up with panels: missing ones fall back to the scene description.
pub fn align_prompts(prompts: Vec<String>, panels: &[Panel]) -> Vec<String> {
    let mut prompts = prompts.into_iter();
    panels
        .iter()
        .map(|panel| {
            prompts
                .next()
                .map(|prompt| prompt.trim().to_string())
                .filter(|prompt| !prompt.is_empty())
                .unwrap_or_else(|| panel.description.clone())
        })
        .collect()
}

/// Stage (c): writes one image prompt per panel.
pub async fn create_prompts(
    client: &OpenAiClient,
    panels: &[Panel],
    style: &str,
    character: &str,
    layout: Layout,
) -> Result<Vec<String>, ModelError> {
    info!("Writing image prompts for {} panels", panels.len());
    let reply = client
        .chat(
            &prompt_instructions(layout),
            json!(prompt_request(panels, style, character, layout)),
            ChatOptions {
                temperature: Some(STORY_TEMPERATURE),
                json: true,
                ..Default::default()
            },
        )
        .await?;
    let parsed: PromptsReply = parse_json_reply(&reply)?;
    if parsed.prompts.len() < panels.len() {
        warn!(
            "Model returned {} prompt(s) for {} panels, using scene descriptions for the rest",
            parsed.prompts.len(),
            panels.len()
        );
    }
    Ok(align_prompts(parsed.prompts, panels))
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The character description cut down for image prompts.
pub fn short_character(description: &str) -> String {
    let words: Vec<&str> = description
        .split_whitespace()
        .take(CHARACTER_PROMPT_WORDS)
        .collect();
    let joined = words.join(" ");
    if joined.chars().count() > CHARACTER_PROMPT_CHARS {
        format!("{}...", truncate_chars(&joined, CHARACTER_PROMPT_CHARS))
    } else {
        joined
    }
}

fn assemble_image_prompt(prompt: &str, character: &str, style: &str) -> String {
    format!(
        "{prompt}, character traits: {character}, style: {style}, single comic panel, no speech bubbles or text"
    )
}

/// Stage (d) input: the full image prompt for a panel, kept under [`MAX_IMAGE_PROMPT_CHARS`].
pub fn build_image_prompt(prompt: &str, style: &str, character: &str) -> String {
    let character = short_character(character);
    let full = assemble_image_prompt(prompt, &character, style);
    let length = full.chars().count();
    if length <= MAX_IMAGE_PROMPT_CHARS {
        return full;
    }

    let excess = length - MAX_IMAGE_PROMPT_CHARS;
    let keep = character
        .chars()
        .count()
        .saturating_sub(excess + 100)
        .max(CHARACTER_PROMPT_MIN_CHARS);
    let trimmed = format!("{}...", truncate_chars(&character, keep));
    let rebuilt = assemble_image_prompt(prompt, &trimmed, style);
    debug!(
        "Image prompt trimmed from {} to {} chars",
        length,
        rebuilt.chars().count()
    );
    truncate_chars(&rebuilt, MAX_IMAGE_PROMPT_CHARS).to_string()
}

/// The fallback prompt used when a panel's image fails once.
pub fn simplified_prompt(style: &str) -> String {
    format!("single comic panel, {style}, no speech bubbles or text")
}
