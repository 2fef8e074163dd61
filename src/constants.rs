//! Shared constants/setters for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;

/// Every comic has exactly this many panels.
pub const PANEL_COUNT: usize = 4;

/// Side length of a generated panel, and of blank filler panels.
pub const PANEL_SIZE: u32 = 1024;

/// Size string sent to the image generation endpoint.
pub const IMAGE_GENERATION_SIZE: &str = "1024x1024";

/// Image prompts longer than this are trimmed before being sent.
pub const MAX_IMAGE_PROMPT_CHARS: usize = 3800;

/// The character description is cut to this many words for image prompts.
pub const CHARACTER_PROMPT_WORDS: usize = 20;

/// ...and then to this many characters.
pub const CHARACTER_PROMPT_CHARS: usize = 150;

/// Shortest the character description gets when a prompt needs trimming.
pub const CHARACTER_PROMPT_MIN_CHARS: usize = 50;

/// Token cap for the photo description call.
pub const PHOTO_DESCRIPTION_MAX_TOKENS: u32 = 500;

/// Sampling temperature for the storyboard and prompt stages.
pub const STORY_TEMPERATURE: f32 = 0.7;

/// Characters per line in a speech bubble.
pub const BUBBLE_WRAP_CHARS: usize = 15;

/// Padding between the bubble edge and its text, and between the bubble and the panel top.
pub const BUBBLE_MARGIN: i32 = 20;

/// Extra space between two lines of bubble text.
pub const BUBBLE_LINE_SPACING: i32 = 5;

/// Height of the speech bubble tail.
pub const BUBBLE_TAIL: i32 = 15;

/// Default bubble text size in pixels.
pub const DEFAULT_TEXT_SIZE: u32 = 30;

/// Smallest bubble text size the form accepts.
pub const MIN_TEXT_SIZE: u32 = 20;

/// Largest bubble text size the form accepts.
pub const MAX_TEXT_SIZE: u32 = 50;

/// Dialogue used when the model gives us fewer panels than we asked for.
pub const DEFAULT_DIALOGUE: &str = "Hello!";

/// Largest accepted upload (photo plus form fields), in bytes.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// How long a run stays available after it was created.
pub const RUN_TTL_MINUTES: i64 = 60;

/// Length of random run identifiers.
pub const RUN_ID_LENGTH: usize = 24;

/// Where a downloaded fallback font is cached.
pub static FONT_CACHE_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./fonts"));

/// File name of the cached fallback font.
pub const FALLBACK_FONT_FILE: &str = "NanumGothic.ttf";

/// Where the fallback font is downloaded from when nothing else is installed.
pub const FALLBACK_FONT_URL: &str =
    "https://github.com/googlefonts/nanum-gothic/raw/main/fonts/NanumGothic-Regular.ttf";

/// Fonts tried on the local system, CJK-capable ones first.
pub const SYSTEM_FONT_PATHS: &[&str] = &[
    "C:/Windows/Fonts/malgun.ttf",
    "C:/Windows/Fonts/NotoSansKR-Regular.ttf",
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/System/Library/Fonts/AppleGothic.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:/Windows/Fonts/arial.ttf",
];

/// Max age (in seconds) for generated image downloads. Runs never change once rendered.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Cache-Control value for generated image responses.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> =
    LazyLock::new(|| format!("private, max-age={}", IMAGE_CACHE_MAX_AGE_SECONDS));

/// Length of CSRF session tokens
pub const CSRF_TOKEN_LENGTH: usize = 32;
