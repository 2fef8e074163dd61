use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use fourcut::config::{ModelConfig, parse_base_url, setup_logging};
use fourcut::constants::{DEFAULT_TEXT_SIZE, MAX_TEXT_SIZE, MIN_TEXT_SIZE};
use fourcut::pipeline::{self, ComicSettings};
use fourcut::render::font::{FontSources, load_font};
use fourcut::render::{self, Layout};
use fourcut::style;
use std::path::PathBuf;
use std::str::FromStr;

/// Make a four-panel comic from a photo and a story, without the web UI.
///
/// Minimal UX:
///   comic_from_cli me.jpg --story "I lost my keys, then found them in the fridge."
#[derive(Parser, Debug)]
#[command(name = "comic_from_cli")]
#[command(about = "Turn a photo and a short story into a four-panel comic")]
struct Args {
    /// Photo of the main character (PNG or JPEG)
    photo: PathBuf,

    /// The story, inline
    #[arg(long, conflicts_with = "story_file")]
    story: Option<String>,

    /// Read the story from a file
    #[arg(long)]
    story_file: Option<PathBuf>,

    /// OpenAI API key
    #[arg(required = true, long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Root of the OpenAI-compatible API
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "FOURCUT_OPENAI_BASE_URL"
    )]
    openai_base_url: String,

    /// Text model used for the photo, storyboard and prompts
    #[arg(long, default_value = "gpt-4o-mini", env = "FOURCUT_TEXT_MODEL")]
    text_model: String,

    /// Image model
    #[arg(long, default_value = "dall-e-3", env = "FOURCUT_IMAGE_MODEL")]
    image_model: String,

    /// One of the named styles, see the web UI's style guide
    #[arg(long)]
    style: Option<String>,

    /// Free-text style, overrides --style
    #[arg(long, default_value = "")]
    custom_style: String,

    /// Style guide strength: none, light, medium or heavy
    #[arg(long, default_value = "light")]
    style_guide: String,

    /// Page layout: A (2x2), B (strip), C (wide top) or D (tall left)
    #[arg(long, default_value = "A")]
    layout: String,

    /// standard or hd
    #[arg(long, default_value = "standard")]
    quality: String,

    /// vivid or natural
    #[arg(long, default_value = "vivid")]
    image_style: String,

    /// speech, cloud, rectangle or ellipse
    #[arg(long, default_value = "speech")]
    bubble_style: String,

    /// Bubble text size in pixels
    #[arg(long, default_value_t = DEFAULT_TEXT_SIZE)]
    text_size: u32,

    /// Language the dialogue is written in
    #[arg(long, default_value = "English", env = "FOURCUT_DIALOGUE_LANGUAGE")]
    language: String,

    /// TrueType font for bubble text
    #[arg(long, env = "FOURCUT_FONT_PATH")]
    font_path: Option<PathBuf>,

    /// Don't download a fallback font
    #[arg(long)]
    no_font_download: bool,

    /// Output directory for panel_N.png and comic_<layout>.png
    #[arg(long, default_value = "./comic")]
    out_dir: PathBuf,

    /// Write every raw API response into this directory
    #[arg(long, env = "FOURCUT_DEBUG_DIR")]
    debug_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_choice<T: FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("Unknown {what}: {value}"))
}

impl Args {
    fn settings(&self) -> Result<ComicSettings> {
        Ok(ComicSettings {
            style: style::resolve_style(self.style.as_deref().unwrap_or_default(), &self.custom_style),
            style_guide: parse_choice(&self.style_guide, "style guide level")?,
            layout: parse_choice::<Layout>(&self.layout, "layout")?,
            quality: parse_choice(&self.quality, "image quality")?,
            image_style: parse_choice(&self.image_style, "image style")?,
            bubble_style: parse_choice(&self.bubble_style, "bubble style")?,
            text_size: self.text_size.clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE),
            language: self.language.clone(),
        })
    }

    async fn story(&self) -> Result<String> {
        let story = match (&self.story, &self.story_file) {
            (Some(story), _) => story.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => bail!("Give the story with --story or --story-file"),
        };
        let story = story.trim().to_string();
        if story.is_empty() {
            bail!("The story is empty");
        }
        Ok(story)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Failed to set up logging: {err}"))?;

    if let Some(style) = args.style.as_deref()
        && !style::is_known_style(style)
        && args.custom_style.trim().is_empty()
    {
        bail!("Unknown style {style:?}, use --custom-style for free-text styles");
    }
    let settings = args.settings()?;
    let story = args.story().await?;

    let photo = tokio::fs::read(&args.photo)
        .await
        .with_context(|| format!("Failed to read {}", args.photo.display()))?;
    let mime = render::photo_mime(&photo)
        .ok_or_else(|| anyhow!("{} is not a PNG or JPEG image", args.photo.display()))?;

    let model = ModelConfig {
        base_url: parse_base_url(&args.openai_base_url).context("Invalid API base URL")?,
        api_key: Some(args.openai_api_key.clone()),
        text_model: args.text_model.clone(),
        image_model: args.image_model.clone(),
        dialogue_language: args.language.clone(),
        debug_dir: args.debug_dir.clone(),
    };
    let http = reqwest::Client::new();
    let client = model.client(http.clone(), args.openai_api_key.clone())?;

    let storyboard = pipeline::storyboard(&client, &photo, mime, &story, &settings)
        .await
        .map_err(|err| anyhow!(err.user_message()))?;
    eprintln!("Character: {}", storyboard.character);
    for (index, panel) in storyboard.panels.iter().enumerate() {
        eprintln!("Panel {}: {}", index + 1, panel.description);
        eprintln!("  \"{}\"", panel.dialogue);
    }

    let font = load_font(
        &FontSources {
            configured: args.font_path.clone(),
            allow_download: !args.no_font_download,
            ..Default::default()
        },
        &http,
    )
    .await;
    let rendered = pipeline::render(&client, &storyboard, &settings, font.as_ref())
        .await
        .map_err(|err| anyhow!(err.user_message()))?;
    for index in &rendered.failed {
        eprintln!("Panel {} could not be generated and was left blank", index + 1);
    }

    let written = pipeline::save_comic(&args.out_dir, &rendered, settings.layout)
        .await
        .with_context(|| format!("Failed to write into {}", args.out_dir.display()))?;
    for path in written {
        eprintln!("Saved: {}", path.display());
    }
    Ok(())
}
