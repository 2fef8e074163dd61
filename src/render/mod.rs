//! Local image work: speech bubbles, fonts and page layouts.

pub mod bubble;
pub mod font;
pub mod layout;

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

pub use bubble::{BubbleStyle, draw_bubble, wrap_text};
pub use layout::{Layout, compose, frame_thumbnail};

/// Decodes an encoded image (PNG, JPEG) into RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image.to_rgb8())
}

/// Encodes an image as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut output = Cursor::new(Vec::new());
    image.write_to(&mut output, ImageFormat::Png)?;
    Ok(output.into_inner())
}

/// The MIME type of an uploaded photo, if it's one we accept.
pub fn photo_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        _ => None,
    }
}
