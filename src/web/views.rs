use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::Utc;

use super::csrf::{csrf_token, validate_csrf};
use super::flash::{self, FlashMessage};
use super::images::{ImageCacheHeaders, png_download};
use super::prelude::*;
use super::runs::ComicRun;
use crate::constants::{
    DEFAULT_TEXT_SIZE, IMAGE_CACHE_CONTROL, MAX_TEXT_SIZE, MIN_TEXT_SIZE, PANEL_COUNT,
};
use crate::openai::{ImageQuality, ImageStyle};
use crate::pipeline::{self, ComicSettings};
use crate::render::{self, BubbleStyle, Layout};
use crate::style::{self, STYLE_CATEGORIES, StyleCategory, StyleGuideLevel};

const CURRENT_RUN_KEY: &str = "current_run";
/// Ids of the runs this session started. Only these can be viewed or rendered from it.
const OWNED_RUNS_KEY: &str = "owned_runs";

const FRAME_THUMBNAIL_SIZE: u32 = 120;

#[derive(Clone, Debug)]
pub(crate) struct Choice {
    pub(crate) value: &'static str,
    pub(crate) label: &'static str,
    pub(crate) selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct LayoutChoice {
    pub(crate) letter: &'static str,
    pub(crate) label: &'static str,
    pub(crate) description: &'static str,
    pub(crate) selected: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    csrf_token: String,
    needs_api_key: bool,
    categories: &'static [StyleCategory],
    layouts: Vec<LayoutChoice>,
    guide_levels: Vec<Choice>,
    qualities: Vec<Choice>,
    image_styles: Vec<Choice>,
    bubble_styles: Vec<Choice>,
    min_text_size: u32,
    max_text_size: u32,
    default_text_size: u32,
    has_current_run: bool,
    current_run: String,
    has_flash: bool,
    flash_message: String,
    flash_class: String,
}

#[derive(Clone, Debug)]
pub(crate) struct PanelView {
    number: usize,
    description: String,
    dialogue: String,
    has_image: bool,
    failed: bool,
    on_page: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "comic.html")]
pub(crate) struct ComicTemplate {
    run_id: String,
    csrf_token: String,
    character: String,
    style: String,
    layout_letter: &'static str,
    layout_label: &'static str,
    bubble_label: &'static str,
    text_size: u32,
    panels: Vec<PanelView>,
    has_render: bool,
    version: i64,
    has_flash: bool,
    flash_message: String,
    flash_class: String,
}

#[derive(Clone, Debug)]
pub(crate) struct StyleGuideEntry {
    name: &'static str,
    note: &'static str,
    /// False for display-only notes.
    in_prompt: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "style_guide.html")]
pub(crate) struct StyleGuideTemplate {
    categories: &'static [StyleCategory],
    guides: Vec<StyleGuideEntry>,
    layouts: Vec<LayoutChoice>,
}

fn choices<T: Copy + PartialEq>(
    all: &[T],
    selected: T,
    value: impl Fn(T) -> &'static str,
    label: impl Fn(T) -> &'static str,
) -> Vec<Choice> {
    all.iter()
        .map(|item| Choice {
            value: value(*item),
            label: label(*item),
            selected: *item == selected,
        })
        .collect()
}

fn layout_choices() -> Vec<LayoutChoice> {
    Layout::ALL
        .iter()
        .map(|layout| LayoutChoice {
            letter: layout.letter(),
            label: layout.label(),
            description: layout.description(),
            selected: *layout == Layout::default(),
        })
        .collect()
}

/// Splits a flash message into the fields the templates expect.
fn flash_fields(flash: Option<FlashMessage>) -> (bool, String, String) {
    match flash {
        Some(message) => (true, message.text, message.class),
        None => (false, String::new(), String::new()),
    }
}

/// handles the / GET
pub(crate) async fn home_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<HomeTemplate, ComicError> {
    let csrf_token = csrf_token(&session).await?;
    let (has_flash, flash_message, flash_class) =
        flash_fields(flash::take_flash_message(&session).await?);

    let mut current_run = String::new();
    if let Some(run_id) = session.get::<String>(CURRENT_RUN_KEY).await? {
        if state.runs.get(&run_id).await.is_some() {
            current_run = run_id;
        } else {
            session.remove::<String>(CURRENT_RUN_KEY).await?;
        }
    }

    Ok(HomeTemplate {
        csrf_token,
        needs_api_key: state.model.api_key.is_none(),
        categories: STYLE_CATEGORIES,
        layouts: layout_choices(),
        guide_levels: choices(
            &StyleGuideLevel::ALL,
            StyleGuideLevel::default(),
            StyleGuideLevel::as_str,
            StyleGuideLevel::label,
        ),
        qualities: choices(
            &[ImageQuality::Standard, ImageQuality::Hd],
            ImageQuality::default(),
            ImageQuality::as_str,
            ImageQuality::as_str,
        ),
        image_styles: choices(
            &[ImageStyle::Vivid, ImageStyle::Natural],
            ImageStyle::default(),
            ImageStyle::as_str,
            ImageStyle::as_str,
        ),
        bubble_styles: choices(
            &BubbleStyle::ALL,
            BubbleStyle::default(),
            BubbleStyle::as_str,
            BubbleStyle::label,
        ),
        min_text_size: MIN_TEXT_SIZE,
        max_text_size: MAX_TEXT_SIZE,
        default_text_size: DEFAULT_TEXT_SIZE,
        has_current_run: !current_run.is_empty(),
        current_run,
        has_flash,
        flash_message,
        flash_class,
    })
}

/// What came in on the upload form.
#[derive(Debug, Default)]
struct ComicForm {
    csrf_token: Option<String>,
    api_key: Option<String>,
    story: String,
    photo: Vec<u8>,
    style: String,
    custom_style: String,
    layout: Option<String>,
    style_guide: Option<String>,
    quality: Option<String>,
    image_style: Option<String>,
    bubble_style: Option<String>,
    text_size: Option<String>,
}

impl ComicForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ComicError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            if field_name == "photo" {
                form.photo = field.bytes().await?.to_vec();
                continue;
            }
            let value = field.text().await?;
            match field_name.as_str() {
                "csrf_token" => form.csrf_token = Some(value),
                "api_key" => form.api_key = Some(value),
                "story" => form.story = value,
                "style" => form.style = value,
                "custom_style" => form.custom_style = value,
                "layout" => form.layout = Some(value),
                "style_guide" => form.style_guide = Some(value),
                "quality" => form.quality = Some(value),
                "image_style" => form.image_style = Some(value),
                "bubble_style" => form.bubble_style = Some(value),
                "text_size" => form.text_size = Some(value),
                other => debug!("Ignoring form field {other}"),
            }
        }
        Ok(form)
    }

    /// Parses the picker values. Absent fields take their defaults, unknown values are rejected.
    fn settings(&self, language: &str) -> Result<ComicSettings, ComicError> {
        fn pick<T: std::str::FromStr + Default>(
            value: Option<&String>,
            field: &str,
        ) -> Result<T, ComicError> {
            match value.map(|value| value.trim()).filter(|value| !value.is_empty()) {
                Some(value) => value
                    .parse::<T>()
                    .map_err(|_| ComicError::BadRequest(format!("invalid {field}: {value}"))),
                None => Ok(T::default()),
            }
        }

        let text_size = match self.text_size.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value
                .parse::<u32>()
                .map_err(|_| ComicError::BadRequest(format!("invalid text size: {value}")))?
                .clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE),
            _ => DEFAULT_TEXT_SIZE,
        };

        Ok(ComicSettings {
            style: style::resolve_style(&self.style, &self.custom_style),
            style_guide: pick(self.style_guide.as_ref(), "style guide level")?,
            layout: pick(self.layout.as_ref(), "layout")?,
            quality: pick(self.quality.as_ref(), "image quality")?,
            image_style: pick(self.image_style.as_ref(), "image style")?,
            bubble_style: pick(self.bubble_style.as_ref(), "bubble style")?,
            text_size,
            language: language.to_string(),
        })
    }
}

/// Records that this session started `run_id`, forgetting any runs that have since expired.
async fn claim_run(state: &AppState, session: &Session, run_id: &str) -> Result<(), ComicError> {
    let owned = session
        .get::<Vec<String>>(OWNED_RUNS_KEY)
        .await?
        .unwrap_or_default();
    let mut live = Vec::with_capacity(owned.len() + 1);
    for id in owned {
        if state.runs.get(&id).await.is_some() {
            live.push(id);
        }
    }
    live.push(run_id.to_string());
    session.insert(OWNED_RUNS_KEY, live).await?;
    Ok(())
}

async fn owns_run(session: &Session, run_id: &str) -> Result<bool, ComicError> {
    Ok(session
        .get::<Vec<String>>(OWNED_RUNS_KEY)
        .await?
        .is_some_and(|owned| owned.iter().any(|id| id == run_id)))
}

/// Form problems the user can fix, shown as a flash on the form.
fn validate_upload(form: &ComicForm) -> Result<&'static str, FlashMessage> {
    if form.story.trim().is_empty() {
        return Err(FlashMessage::error("Please enter a story."));
    }
    if form.photo.is_empty() {
        return Err(FlashMessage::error("Please upload a photo."));
    }
    let Some(mime) = render::photo_mime(&form.photo) else {
        return Err(FlashMessage::error("The photo must be a PNG or JPEG image."));
    };
    if let Err(err) = render::decode_rgb(&form.photo) {
        debug!("Uploaded photo failed to decode: {}", err);
        return Err(FlashMessage::error(
            "The photo could not be read. Please upload a different image.",
        ));
    }
    Ok(mime)
}

/// handles POST /comics: runs the storyboard stages and stores the run
#[instrument(skip_all)]
pub(crate) async fn create_comic_handler(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Redirect, ComicError> {
    let form = ComicForm::from_multipart(multipart).await?;
    let token = form
        .csrf_token
        .as_deref()
        .ok_or_else(|| ComicError::BadRequest("missing csrf token".to_string()))?;
    validate_csrf(&session, token).await?;

    let Some(api_key) = state.model.effective_key(form.api_key.as_deref()) else {
        flash::set_flash(&session, FlashMessage::error("Please enter your OpenAI API key.")).await?;
        return Ok(Redirect::to("/"));
    };
    let mime = match validate_upload(&form) {
        Ok(mime) => mime,
        Err(message) => {
            flash::set_flash(&session, message).await?;
            return Ok(Redirect::to("/"));
        }
    };
    let settings = form.settings(&state.model.dialogue_language)?;

    let client = state
        .model
        .client(state.http.clone(), api_key.clone())
        .map_err(|err| ComicError::InternalServerError(err.to_string()))?;
    info!(
        "Starting comic: style={:?} layout={} photo={} bytes",
        settings.style,
        settings.layout,
        form.photo.len()
    );
    let storyboard =
        match pipeline::storyboard(&client, &form.photo, mime, form.story.trim(), &settings).await
        {
            Ok(storyboard) => storyboard,
            Err(err) => {
                error!("Storyboard failed: {}", err);
                flash::set_flash(&session, FlashMessage::error(err.user_message())).await?;
                return Ok(Redirect::to("/"));
            }
        };

    let run = ComicRun::new(api_key, settings, storyboard);
    let run_id = run.id.clone();
    state.runs.insert(run).await;
    claim_run(&state, &session, &run_id).await?;
    session.insert(CURRENT_RUN_KEY, run_id.clone()).await?;
    flash::set_flash(
        &session,
        FlashMessage::success("Storyboard ready. Check the dialogue, then draw the comic."),
    )
    .await?;
    Ok(Redirect::to(&format!("/comics/{run_id}")))
}

/// handles GET /comics/{id}
pub(crate) async fn comic_handler(
    State(state): State<AppState>,
    session: Session,
    Path(run_id): Path<String>,
) -> Result<ComicTemplate, ComicError> {
    let Some(run) = state.runs.get(&run_id).await else {
        flash::set_flash(
            &session,
            FlashMessage::warning("That comic has expired. Please start a new one."),
        )
        .await?;
        return Err(ComicError::RunExpired);
    };
    if !owns_run(&session, &run.id).await? {
        warn!("Session tried to open a run it didn't start");
        return Err(ComicError::Unauthorized);
    }
    let csrf_token = csrf_token(&session).await?;
    let (has_flash, flash_message, flash_class) =
        flash_fields(flash::take_flash_message(&session).await?);

    let slots = run.settings.layout.slots().len();
    let panels = run
        .storyboard
        .panels
        .iter()
        .enumerate()
        .map(|(index, panel)| {
            let has_image = run
                .rendered
                .as_ref()
                .and_then(|rendered| rendered.panels.get(index))
                .is_some_and(Option::is_some);
            PanelView {
                number: index + 1,
                description: panel.description.clone(),
                dialogue: panel.dialogue.clone(),
                has_image,
                failed: run.rendered.is_some() && !has_image,
                on_page: index < slots,
            }
        })
        .collect();

    Ok(ComicTemplate {
        csrf_token,
        character: run.storyboard.character.clone(),
        style: run.settings.enhanced_style(),
        layout_letter: run.settings.layout.letter(),
        layout_label: run.settings.layout.label(),
        bubble_label: run.settings.bubble_style.label(),
        text_size: run.settings.text_size,
        panels,
        has_render: run.rendered.is_some(),
        version: run.rendered_at.timestamp_millis(),
        run_id: run.id,
        has_flash,
        flash_message,
        flash_class,
    })
}

/// handles POST /comics/{id}/render: applies edited dialogue and draws the comic
#[instrument(skip_all)]
pub(crate) async fn render_comic_handler(
    State(state): State<AppState>,
    session: Session,
    Path(run_id): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, ComicError> {
    let token = form
        .get("csrf_token")
        .ok_or_else(|| ComicError::BadRequest("missing csrf token".to_string()))?;
    validate_csrf(&session, token).await?;
    let Some(mut run) = state.runs.get(&run_id).await else {
        flash::set_flash(
            &session,
            FlashMessage::warning("That comic has expired. Please start a new one."),
        )
        .await?;
        return Err(ComicError::RunExpired);
    };
    if !owns_run(&session, &run.id).await? {
        warn!("Session tried to render a run it didn't start");
        return Err(ComicError::Unauthorized);
    }

    info!("Rendering run {}", run.id);
    for (index, panel) in run.storyboard.panels.iter_mut().enumerate() {
        if let Some(dialogue) = form.get(&format!("dialogue_{}", index + 1)) {
            panel.dialogue = dialogue.trim().to_string();
        }
    }

    let client = state
        .model
        .client(state.http.clone(), run.api_key.clone())
        .map_err(|err| ComicError::InternalServerError(err.to_string()))?;
    let message = match pipeline::render(
        &client,
        &run.storyboard,
        &run.settings,
        (*state.font).as_ref(),
    )
    .await
    {
        Ok(rendered) => {
            let message = flash::render_outcome(&rendered.failed);
            run.rendered = Some(rendered);
            run.rendered_at = Utc::now();
            message
        }
        Err(err) => {
            error!("Render failed: {}", err);
            FlashMessage::error(err.user_message())
        }
    };

    if !state.runs.update(run).await {
        warn!("Run expired while rendering");
        flash::set_flash(
            &session,
            FlashMessage::warning("That comic expired while it was being drawn. Please start a new one."),
        )
        .await?;
        return Ok(Redirect::to("/"));
    }
    flash::set_flash(&session, message).await?;
    Ok(Redirect::to(&format!("/comics/{run_id}")))
}

/// Parses `3.png` into a 0-based panel index.
fn panel_index(file: &str) -> Option<usize> {
    let number = file.strip_suffix(".png")?.parse::<usize>().ok()?;
    (1..=PANEL_COUNT).contains(&number).then(|| number - 1)
}

/// handles GET /comics/{id}/panels/{n}.png
pub(crate) async fn panel_image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((run_id, file)): Path<(String, String)>,
) -> Result<Response, ComicError> {
    let not_found = || ComicError::NotFound(format!("/comics/{run_id}/panels/{file}"));
    let index = panel_index(&file).ok_or_else(not_found)?;
    let run = state.runs.get(&run_id).await.ok_or_else(not_found)?;
    let bytes = run
        .rendered
        .as_ref()
        .and_then(|rendered| rendered.panels.get(index).cloned().flatten())
        .ok_or_else(not_found)?;
    let name = format!("panel_{}", index + 1);
    let cache = ImageCacheHeaders::for_render(&run.id, &name, run.rendered_at);
    png_download(&headers, &cache, &format!("{name}.png"), bytes)
}

/// handles GET /comics/{id}/comic.png
pub(crate) async fn page_image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<Response, ComicError> {
    let not_found = || ComicError::NotFound(format!("/comics/{run_id}/comic.png"));
    let run = state.runs.get(&run_id).await.ok_or_else(not_found)?;
    let rendered = run.rendered.as_ref().ok_or_else(not_found)?;
    let cache = ImageCacheHeaders::for_render(&run.id, "comic", run.rendered_at);
    png_download(
        &headers,
        &cache,
        &format!("comic_{}.png", run.settings.layout),
        rendered.page.clone(),
    )
}

/// handles GET /static/frames/{layout}.png
pub(crate) async fn frame_handler(Path(file): Path<String>) -> Result<Response, ComicError> {
    let layout = file
        .strip_suffix(".png")
        .and_then(|letter| letter.parse::<Layout>().ok())
        .ok_or_else(|| ComicError::NotFound(format!("/static/frames/{file}")))?;
    let png = render::encode_png(&render::frame_thumbnail(layout, FRAME_THUMBNAIL_SIZE))?;
    Ok((
        [
            (CONTENT_TYPE, "image/png"),
            (axum::http::header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str()),
        ],
        png,
    )
        .into_response())
}

/// handles GET /style-guide
pub(crate) async fn style_guide_handler() -> StyleGuideTemplate {
    StyleGuideTemplate {
        categories: STYLE_CATEGORIES,
        guides: style::all_styles()
            .filter_map(|name| {
                style::reference_note(name).map(|note| StyleGuideEntry {
                    name,
                    note,
                    in_prompt: style::guide_for(name).is_some(),
                })
            })
            .collect(),
        layouts: layout_choices(),
    }
}

pub(crate) async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_files_map_to_indices() {
        assert_eq!(panel_index("1.png"), Some(0));
        assert_eq!(panel_index("4.png"), Some(3));
        assert_eq!(panel_index("5.png"), None);
        assert_eq!(panel_index("0.png"), None);
        assert_eq!(panel_index("2.jpg"), None);
    }

    #[test]
    fn form_settings_take_defaults_and_clamp_text_size() {
        let form = ComicForm {
            style: "Watercolor style".to_string(),
            layout: Some("c".to_string()),
            text_size: Some("90".to_string()),
            ..Default::default()
        };
        let settings = form.settings("English").expect("settings");
        assert_eq!(settings.layout, Layout::C);
        assert_eq!(settings.text_size, MAX_TEXT_SIZE);
        assert_eq!(settings.bubble_style, BubbleStyle::Speech);
        assert_eq!(settings.style, "Watercolor style");

        let form = ComicForm {
            layout: Some("Z".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            form.settings("English"),
            Err(ComicError::BadRequest(_))
        ));
    }

    #[test]
    fn upload_validation_reports_the_first_problem() {
        let form = ComicForm::default();
        assert_eq!(
            validate_upload(&form).map_err(|message| message.text),
            Err("Please enter a story.".to_string())
        );
        let form = ComicForm {
            story: "A day at the beach".to_string(),
            photo: b"not an image".to_vec(),
            ..Default::default()
        };
        assert_eq!(
            validate_upload(&form).map_err(|message| message.text),
            Err("The photo must be a PNG or JPEG image.".to_string())
        );
    }
}
