//! Speech bubbles: wrapping the dialogue and drawing it onto a panel.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut,
    draw_hollow_circle_mut, draw_hollow_ellipse_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_polygon_mut, draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::constants::{BUBBLE_LINE_SPACING, BUBBLE_MARGIN, BUBBLE_TAIL, BUBBLE_WRAP_CHARS};

const FILL: Rgb<u8> = Rgb([255, 255, 255]);

const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Shape of the bubble.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BubbleStyle {
    /// Round bubble with a tail pointing down.
    #[default]
    Speech,
    /// Puffy thought bubble.
    Cloud,
    /// Caption box.
    Rectangle,
    /// Round bubble without a tail.
    Ellipse,
}

impl BubbleStyle {
    /// All styles, in picker order.
    pub const ALL: [BubbleStyle; 4] = [Self::Speech, Self::Cloud, Self::Rectangle, Self::Ellipse];

    /// Form value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Cloud => "cloud",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
        }
    }

    /// Label shown on the form.
    pub fn label(self) -> &'static str {
        match self {
            Self::Speech => "Speech bubble",
            Self::Cloud => "Thought cloud",
            Self::Rectangle => "Caption box",
            Self::Ellipse => "Oval",
        }
    }
}

impl fmt::Display for BubbleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BubbleStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speech" => Ok(Self::Speech),
            "cloud" => Ok(Self::Cloud),
            "rectangle" => Ok(Self::Rectangle),
            "ellipse" => Ok(Self::Ellipse),
            _ => Err(()),
        }
    }
}

/// Word-wraps `text` into lines of at most `width` characters.
///
/// Words longer than `width` (and text in scripts that don't use spaces) are
/// split every `width` characters.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(width) {
                let piece: String = chunk.iter().collect();
                let piece_len = chunk.len();
                if current_len == 0 {
                    current = piece;
                    current_len = piece_len;
                } else if current_len + 1 + piece_len <= width {
                    current.push(' ');
                    current.push_str(&piece);
                    current_len += 1 + piece_len;
                } else {
                    lines.push(std::mem::take(&mut current));
                    current = piece;
                    current_len = piece_len;
                }
            }
        }
        if current_len > 0 {
            lines.push(current);
        }
    }
    lines
}

/// Where a bubble sits on a panel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BubbleBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height, not counting a tail.
    pub height: i32,
}

impl BubbleBox {
    /// Centred horizontally, [`BUBBLE_MARGIN`] below the top edge, sized to fit the text plus margins.
    pub fn for_text(image_width: u32, text_width: i32, line_count: usize, text_size: u32) -> Self {
        let size = text_size as i32;
        let text_height = line_count as i32 * (size + BUBBLE_LINE_SPACING) + BUBBLE_LINE_SPACING;
        let x = ((image_width as i32 - text_width) / 2 - BUBBLE_MARGIN).max(0);
        Self {
            x,
            y: BUBBLE_MARGIN,
            width: text_width + BUBBLE_MARGIN * 2,
            height: text_height + BUBBLE_MARGIN * 2,
        }
    }

    fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    fn radii(&self) -> (i32, i32) {
        ((self.width / 2).max(1), (self.height / 2).max(1))
    }

    fn rect(&self) -> Rect {
        Rect::at(self.x, self.y).of_size(self.width.max(3) as u32, self.height.max(3) as u32)
    }
}

/// Width of a line of text rendered at `size` pixels.
pub fn measure_text_width(text: &str, font: &FontVec, size: f32) -> f32 {
    let scaled_font = font.as_scaled(PxScale::from(size));
    text.chars()
        .map(|ch| scaled_font.h_advance(scaled_font.glyph_id(ch)))
        .sum()
}

fn draw_ellipse_outline(image: &mut RgbImage, bubble: &BubbleBox) {
    let center = bubble.center();
    let (rx, ry) = bubble.radii();
    draw_hollow_ellipse_mut(image, center, rx, ry, INK);
    draw_hollow_ellipse_mut(image, center, (rx - 1).max(1), (ry - 1).max(1), INK);
}

fn draw_rectangle(image: &mut RgbImage, bubble: &BubbleBox) {
    let rect = bubble.rect();
    draw_filled_rect_mut(image, rect, FILL);
    draw_hollow_rect_mut(image, rect, INK);
    draw_hollow_rect_mut(
        image,
        Rect::at(rect.left() + 1, rect.top() + 1).of_size(rect.width() - 2, rect.height() - 2),
        INK,
    );
}

fn draw_ellipse(image: &mut RgbImage, bubble: &BubbleBox) {
    let (rx, ry) = bubble.radii();
    draw_filled_ellipse_mut(image, bubble.center(), rx, ry, FILL);
    draw_ellipse_outline(image, bubble);
}

fn draw_speech(image: &mut RgbImage, bubble: &BubbleBox) {
    draw_ellipse(image, bubble);

    let (cx, _) = bubble.center();
    let base_y = bubble.y + bubble.height;
    // tuck the base into the ellipse so the outline under the tail is covered
    let tail = [
        Point::new(cx - BUBBLE_TAIL, base_y - 2),
        Point::new(cx, base_y + BUBBLE_TAIL),
        Point::new(cx + BUBBLE_TAIL, base_y - 2),
    ];
    draw_polygon_mut(image, &tail, FILL);
    for offset in [0.0, 1.0] {
        let tip = (cx as f32, (base_y + BUBBLE_TAIL) as f32 - offset);
        draw_line_segment_mut(
            image,
            ((cx - BUBBLE_TAIL) as f32 + offset, base_y as f32),
            tip,
            INK,
        );
        draw_line_segment_mut(
            image,
            ((cx + BUBBLE_TAIL) as f32 - offset, base_y as f32),
            tip,
            INK,
        );
    }
}

fn draw_cloud(image: &mut RgbImage, bubble: &BubbleBox) {
    let (cx, cy) = bubble.center();
    let (rx, ry) = bubble.radii();
    let puff = (ry / 2).max(12);
    let puffs = 12;

    for i in 0..puffs {
        let angle = TAU * i as f32 / puffs as f32;
        let px = cx + (rx as f32 * angle.cos()) as i32;
        let py = cy + (ry as f32 * angle.sin()) as i32;
        draw_filled_circle_mut(image, (px, py), puff, FILL);
        draw_hollow_circle_mut(image, (px, py), puff, INK);
        draw_hollow_circle_mut(image, (px, py), puff - 1, INK);
    }
    // cover the inner halves of the puff outlines
    draw_filled_ellipse_mut(image, (cx, cy), rx, ry, FILL);

    // trailing thought dots
    let dots = [(cx, cy + ry + puff + 8, 7), (cx + 10, cy + ry + puff + 24, 4)];
    for (x, y, r) in dots {
        draw_filled_circle_mut(image, (x, y), r, FILL);
        draw_hollow_circle_mut(image, (x, y), r, INK);
    }
}

/// Draws `text` in a bubble at the top of `image`.
///
/// Blank text draws nothing. Without a font there is nothing to measure or
/// render, so the panel is left untouched.
pub fn draw_bubble(
    image: &mut RgbImage,
    text: &str,
    style: BubbleStyle,
    font: Option<&FontVec>,
    text_size: u32,
) {
    let lines = wrap_text(text, BUBBLE_WRAP_CHARS);
    if lines.is_empty() {
        debug!("No dialogue, skipping bubble");
        return;
    }
    let Some(font) = font else {
        warn!("No font available, skipping bubble text");
        return;
    };

    let size = text_size as f32;
    let text_width = lines
        .iter()
        .map(|line| measure_text_width(line, font, size))
        .fold(0.0_f32, f32::max)
        .ceil() as i32;
    let bubble = BubbleBox::for_text(image.width(), text_width, lines.len(), text_size);

    match style {
        BubbleStyle::Speech => draw_speech(image, &bubble),
        BubbleStyle::Cloud => draw_cloud(image, &bubble),
        BubbleStyle::Rectangle => draw_rectangle(image, &bubble),
        BubbleStyle::Ellipse => draw_ellipse(image, &bubble),
    }

    let text_x = bubble.x + BUBBLE_MARGIN;
    let mut text_y = bubble.y + BUBBLE_MARGIN;
    for line in &lines {
        draw_text_mut(image, INK, text_x, text_y, size, font, line);
        text_y += text_size as i32 + BUBBLE_LINE_SPACING;
    }
}
