//! Runs the stages in order: photo → storyboard → prompts → images → bubbles → page.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use image::RgbImage;
use tracing::{error, info, instrument, warn};

use crate::openai::{ImageQuality, ImageStyle, ModelError, OpenAiClient};
use crate::render::{self, BubbleStyle, Layout};
use crate::story::{self, Panel};
use crate::style::{self, StyleGuideLevel};

/// Everything the user picked for one comic, apart from the photo.
#[derive(Clone, Debug)]
pub struct ComicSettings {
    /// The resolved style (custom or picked).
    pub style: String,
    /// How much style guide to mix in.
    pub style_guide: StyleGuideLevel,
    /// Page layout.
    pub layout: Layout,
    /// Image quality.
    pub quality: ImageQuality,
    /// Image rendering style.
    pub image_style: ImageStyle,
    /// Bubble shape.
    pub bubble_style: BubbleStyle,
    /// Bubble text size in pixels.
    pub text_size: u32,
    /// Language the dialogue is written in.
    pub language: String,
}

impl ComicSettings {
    /// The style with its guide suffix.
    pub fn enhanced_style(&self) -> String {
        style::enhanced_style(&self.style, self.style_guide)
    }
}

/// Output of the first two stages. The user may edit the dialogue before rendering.
#[derive(Clone, Debug)]
pub struct Storyboard {
    /// What the photo's subject looks like.
    pub character: String,
    /// Exactly four panels.
    pub panels: Vec<Panel>,
}

/// The finished comic.
#[derive(Clone, Debug)]
pub struct RenderedComic {
    /// PNG per panel, with its bubble. `None` where generation failed twice.
    pub panels: Vec<Option<Vec<u8>>>,
    /// The composed page as PNG.
    pub page: Vec<u8>,
    /// 0-based indices of the panels that failed.
    pub failed: Vec<usize>,
}

/// Why a run stopped.
#[derive(Debug)]
pub enum PipelineError {
    /// A model call failed.
    Model {
        /// Which stage it was.
        stage: &'static str,
        /// The underlying failure.
        source: ModelError,
    },
    /// Every panel failed to generate.
    NoPanels(ModelError),
    /// Couldn't encode the output.
    Image(image::ImageError),
}

impl PipelineError {
    /// A message that tells the user what went wrong.
    pub fn user_message(&self) -> String {
        match self {
            Self::Model { stage, source } => format!("{stage} failed. {}", source.user_message()),
            Self::NoPanels(source) => {
                format!("Every panel failed to generate. {}", source.user_message())
            }
            Self::Image(err) => format!("Failed to assemble the comic: {err}"),
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model { stage, source } => write!(f, "{stage} failed: {source}"),
            Self::NoPanels(source) => write!(f, "every panel failed, last error: {source}"),
            Self::Image(err) => write!(f, "image error: {err}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

fn stage(stage: &'static str) -> impl FnOnce(ModelError) -> PipelineError {
    move |source| PipelineError::Model { stage, source }
}

/// Stages (a) and (b): describe the photo and split the story.
#[instrument(skip_all, fields(layout = %settings.layout))]
pub async fn storyboard(
    client: &OpenAiClient,
    photo: &[u8],
    mime: &str,
    story_text: &str,
    settings: &ComicSettings,
) -> Result<Storyboard, PipelineError> {
    let character = story::describe_photo(client, photo, mime)
        .await
        .map_err(stage("Photo analysis"))?;
    let panels = story::split_story(
        client,
        story_text,
        &character,
        settings.layout,
        &settings.language,
    )
    .await
    .map_err(stage("Story analysis"))?;
    info!("Storyboard ready");
    Ok(Storyboard { character, panels })
}

async fn generate_panel_image(
    client: &OpenAiClient,
    settings: &ComicSettings,
    prompt: &str,
    index: usize,
) -> Result<RgbImage, ModelError> {
    let bytes = client
        .generate_image(prompt, settings.quality, settings.image_style)
        .await?;
    render::decode_rgb(&bytes).map_err(|err| {
        ModelError::InvalidResponse(format!("panel {} image did not decode: {err}", index + 1))
    })
}

/// Stage (d) for one panel, with one retry on a simplified prompt.
async fn generate_with_retry(
    client: &OpenAiClient,
    settings: &ComicSettings,
    prompt: &str,
    index: usize,
) -> Result<RgbImage, ModelError> {
    match generate_panel_image(client, settings, prompt, index).await {
        Ok(image) => Ok(image),
        Err(err) => {
            warn!(
                "Panel {} failed ({}), retrying with a simplified prompt",
                index + 1,
                err
            );
            let fallback = story::simplified_prompt(&settings.style);
            generate_panel_image(client, settings, &fallback, index).await
        }
    }
}

/// Stages (c) to (f): prompts, images, bubbles and the page.
///
/// Panels are generated one at a time. A panel that fails twice is left
/// blank; the run only fails when no panel could be generated.
#[instrument(skip_all, fields(layout = %settings.layout))]
pub async fn render(
    client: &OpenAiClient,
    storyboard: &Storyboard,
    settings: &ComicSettings,
    font: Option<&FontVec>,
) -> Result<RenderedComic, PipelineError> {
    let enhanced_style = settings.enhanced_style();
    let prompts = story::create_prompts(
        client,
        &storyboard.panels,
        &enhanced_style,
        &storyboard.character,
        settings.layout,
    )
    .await
    .map_err(stage("Prompt generation"))?;
    let guide = style::guide_suffix(&settings.style, settings.style_guide);

    let mut images: Vec<Option<RgbImage>> = Vec::with_capacity(prompts.len());
    let mut failed = Vec::new();
    let mut last_error = None;
    for (index, (prompt, panel)) in prompts.iter().zip(&storyboard.panels).enumerate() {
        info!("Generating panel {}/{}", index + 1, prompts.len());
        let full_prompt = story::build_image_prompt(
            &format!("{prompt}{guide}"),
            &enhanced_style,
            &storyboard.character,
        );
        match generate_with_retry(client, settings, &full_prompt, index).await {
            Ok(mut image) => {
                render::draw_bubble(
                    &mut image,
                    &panel.dialogue,
                    settings.bubble_style,
                    font,
                    settings.text_size,
                );
                images.push(Some(image));
            }
            Err(err) => {
                error!("Panel {} failed to generate: {}", index + 1, err);
                failed.push(index);
                images.push(None);
                last_error = Some(err);
            }
        }
    }

    if images.iter().all(Option::is_none) {
        return Err(PipelineError::NoPanels(last_error.unwrap_or_else(|| {
            ModelError::InvalidResponse("no panels to generate".to_string())
        })));
    }

    let mut panel_pngs = Vec::with_capacity(images.len());
    for image in &images {
        panel_pngs.push(image.as_ref().map(render::encode_png).transpose()?);
    }

    let blank = RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
    let page_panels: Vec<RgbImage> = images
        .into_iter()
        .map(|image| image.unwrap_or_else(|| blank.clone()))
        .collect();
    let page = render::compose(&page_panels, settings.layout);

    Ok(RenderedComic {
        panels: panel_pngs,
        page: render::encode_png(&page)?,
        failed,
    })
}

/// Writes `panel_N.png` for every generated panel and `comic_<layout>.png` into `dir`.
///
/// Returns the paths written, panels first.
pub async fn save_comic(
    dir: &Path,
    rendered: &RenderedComic,
    layout: Layout,
) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::with_capacity(rendered.panels.len() + 1);
    for (index, panel) in rendered.panels.iter().enumerate() {
        let Some(png) = panel else {
            continue;
        };
        let path = dir.join(format!("panel_{}.png", index + 1));
        tokio::fs::write(&path, png).await?;
        written.push(path);
    }
    let page_path = dir.join(format!("comic_{layout}.png"));
    tokio::fs::write(&page_path, &rendered.page).await?;
    written.push(page_path);
    Ok(written)
}
