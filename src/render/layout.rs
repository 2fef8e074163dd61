//! The four fixed page layouts, and the code that pastes panels into them.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::constants::{PANEL_COUNT, PANEL_SIZE};

const PAGE_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

const FRAME_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Where one panel goes on the page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Panel is resized to this width.
    pub width: u32,
    /// Panel is resized to this height.
    pub height: u32,
}

const fn slot(x: u32, y: u32, width: u32, height: u32) -> Slot {
    Slot {
        x,
        y,
        width,
        height,
    }
}

const STRIP_PANEL_HEIGHT: u32 = 768;
const STRIP_GAP: u32 = 20;

const GRID_SLOTS: [Slot; 4] = [
    slot(0, 0, 1024, 1024),
    slot(1024, 0, 1024, 1024),
    slot(0, 1024, 1024, 1024),
    slot(1024, 1024, 1024, 1024),
];

const STRIP_SLOTS: [Slot; 4] = [
    slot(0, 0, 1024, STRIP_PANEL_HEIGHT),
    slot(0, STRIP_PANEL_HEIGHT + STRIP_GAP, 1024, STRIP_PANEL_HEIGHT),
    slot(0, 2 * (STRIP_PANEL_HEIGHT + STRIP_GAP), 1024, STRIP_PANEL_HEIGHT),
    slot(0, 3 * (STRIP_PANEL_HEIGHT + STRIP_GAP), 1024, STRIP_PANEL_HEIGHT),
];

const WIDE_TOP_SLOTS: [Slot; 3] = [
    slot(0, 0, 2048, 1024),
    slot(0, 1024, 1024, 1024),
    slot(1024, 1024, 1024, 1024),
];

const TALL_LEFT_SLOTS: [Slot; 3] = [
    slot(0, 0, 1024, 2048),
    slot(1024, 0, 1024, 1024),
    slot(1024, 1024, 1024, 1024),
];

/// Page layout picked on the form.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Layout {
    /// 2x2 grid.
    #[default]
    A,
    /// Vertical strip.
    B,
    /// One wide panel on top, two below.
    C,
    /// One tall panel on the left, two on the right.
    D,
}

impl Layout {
    /// All layouts, in picker order.
    pub const ALL: [Layout; 4] = [Layout::A, Layout::B, Layout::C, Layout::D];

    /// Single-letter name used in URLs and file names.
    pub fn letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Short label.
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "2x2 grid",
            Self::B => "Vertical strip",
            Self::C => "One on top, two below",
            Self::D => "Tall left, two on the right",
        }
    }

    /// Longer description, shown in the picker and handed to the storyboard model.
    pub fn description(self) -> &'static str {
        match self {
            Self::A => "2x2 grid: four equal square panels.",
            Self::B => "Vertical strip: four wide panels stacked top to bottom.",
            Self::C => "One large panel across the top and two smaller panels below it.",
            Self::D => "One tall panel on the left and two smaller panels stacked on the right.",
        }
    }

    /// Size of the finished page.
    pub fn canvas_size(self) -> (u32, u32) {
        match self {
            Self::A | Self::C | Self::D => (2 * PANEL_SIZE, 2 * PANEL_SIZE),
            Self::B => (
                PANEL_SIZE,
                STRIP_PANEL_HEIGHT * PANEL_COUNT as u32 + 3 * STRIP_GAP,
            ),
        }
    }

    /// Slots in panel order. Layouts C and D only have room for the first three panels.
    pub fn slots(self) -> &'static [Slot] {
        match self {
            Self::A => &GRID_SLOTS,
            Self::B => &STRIP_SLOTS,
            Self::C => &WIDE_TOP_SLOTS,
            Self::D => &TALL_LEFT_SLOTS,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for Layout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(()),
        }
    }
}

fn blank_panel() -> RgbImage {
    RgbImage::from_pixel(PANEL_SIZE, PANEL_SIZE, PAGE_BACKGROUND)
}

/// Pastes the panels into the layout. Missing panels are filled with white.
pub fn compose(panels: &[RgbImage], layout: Layout) -> RgbImage {
    let (width, height) = layout.canvas_size();
    let mut page = RgbImage::from_pixel(width, height, PAGE_BACKGROUND);
    let blank = blank_panel();

    let slots = layout.slots();
    if panels.len() > slots.len() {
        debug!(
            "Layout {} has {} slots, {} panel(s) left off the page",
            layout,
            slots.len(),
            panels.len() - slots.len()
        );
    }

    for (index, slot) in slots.iter().enumerate() {
        let panel = panels.get(index).unwrap_or(&blank);
        let resized = imageops::resize(panel, slot.width, slot.height, FilterType::CatmullRom);
        imageops::replace(&mut page, &resized, i64::from(slot.x), i64::from(slot.y));
    }
    page
}

/// Small outline drawing of a layout, used for the picker buttons.
pub fn frame_thumbnail(layout: Layout, side: u32) -> RgbImage {
    let side = side.max(16);
    let (canvas_w, canvas_h) = layout.canvas_size();
    let scale = f64::from(side) / f64::from(canvas_w.max(canvas_h));
    let thumb_w = ((f64::from(canvas_w) * scale).round() as u32).max(1);
    let thumb_h = ((f64::from(canvas_h) * scale).round() as u32).max(1);
    let mut thumb = RgbImage::from_pixel(thumb_w, thumb_h, PAGE_BACKGROUND);

    for slot in layout.slots() {
        let x = (f64::from(slot.x) * scale).round() as i32;
        let y = (f64::from(slot.y) * scale).round() as i32;
        let w = ((f64::from(slot.width) * scale).round() as u32).max(4);
        let h = ((f64::from(slot.height) * scale).round() as u32).max(4);
        // two pixel outline
        draw_hollow_rect_mut(&mut thumb, Rect::at(x, y).of_size(w, h), FRAME_COLOR);
        draw_hollow_rect_mut(
            &mut thumb,
            Rect::at(x + 1, y + 1).of_size(w - 2, h - 2),
            FRAME_COLOR,
        );
    }
    thumb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: [u8; 3], width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    fn four_panels() -> Vec<RgbImage> {
        vec![
            solid([255, 0, 0], 1024, 1024),
            solid([0, 255, 0], 1024, 1024),
            solid([0, 0, 255], 1024, 1024),
            solid([10, 10, 10], 1024, 1024),
        ]
    }

    #[test]
    fn grid_places_panels_in_quadrants() {
        let page = compose(&four_panels(), Layout::A);
        assert_eq!(page.dimensions(), (2048, 2048));
        assert_eq!(
            Layout::A.slots().iter().map(|s| (s.x, s.y)).collect::<Vec<_>>(),
            vec![(0, 0), (1024, 0), (0, 1024), (1024, 1024)]
        );
        assert_eq!(page.get_pixel(10, 10), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(1500, 10), &Rgb([0, 255, 0]));
        assert_eq!(page.get_pixel(10, 1500), &Rgb([0, 0, 255]));
        assert_eq!(page.get_pixel(1500, 1500), &Rgb([10, 10, 10]));
    }

    #[test]
    fn strip_has_gaps_between_panels() {
        let page = compose(&four_panels(), Layout::B);
        assert_eq!(page.dimensions(), (1024, 768 * 4 + 60));
        assert_eq!(page.get_pixel(500, 100), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(500, 770), &Rgb([255, 255, 255]));
        assert_eq!(page.get_pixel(500, 800), &Rgb([0, 255, 0]));
        assert_eq!(page.get_pixel(500, 3131), &Rgb([10, 10, 10]));
    }

    #[test]
    fn wide_top_and_tall_left_use_three_slots() {
        let page = compose(&four_panels(), Layout::C);
        assert_eq!(page.dimensions(), (2048, 2048));
        assert_eq!(page.get_pixel(2000, 500), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(10, 1500), &Rgb([0, 255, 0]));
        assert_eq!(page.get_pixel(1500, 1500), &Rgb([0, 0, 255]));

        let page = compose(&four_panels(), Layout::D);
        assert_eq!(page.get_pixel(500, 2000), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(1500, 500), &Rgb([0, 255, 0]));
        assert_eq!(page.get_pixel(1500, 1500), &Rgb([0, 0, 255]));
    }

    #[test]
    fn missing_panels_are_white() {
        let panels = vec![solid([255, 0, 0], 512, 512)];
        let page = compose(&panels, Layout::A);
        assert_eq!(page.get_pixel(1023, 1023), &Rgb([255, 0, 0]));
        assert_eq!(page.get_pixel(1500, 1500), &Rgb([255, 255, 255]));
    }

    #[test]
    fn thumbnails_keep_aspect_ratio() {
        assert_eq!(frame_thumbnail(Layout::A, 150).dimensions(), (150, 150));
        let (w, h) = frame_thumbnail(Layout::B, 150).dimensions();
        assert_eq!(h, 150);
        assert!(w < 60);
        let thumb = frame_thumbnail(Layout::C, 150);
        assert_eq!(thumb.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn layout_parses_letters() {
        assert_eq!("c".parse::<Layout>(), Ok(Layout::C));
        assert!("E".parse::<Layout>().is_err());
        assert_eq!(Layout::D.to_string(), "D");
    }
}
