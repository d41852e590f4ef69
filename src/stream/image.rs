//! Image responder.
//!
//! Serves a static image whole: decode, correct rotation, re-encode. JPEG is
//! the default output; PNG is forced when the source was PNG/WEBP or the
//! decoded image carries an alpha channel, to preserve transparency. This is
//! a heuristic, not a lossless guarantee: an animated GIF, for example,
//! degrades to its first frame.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::{Error, Result};
use crate::stream::descriptor::{Rotation, StreamDescriptor};

/// A fully rendered image payload.
#[derive(Debug)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Load, rotate and re-encode the image named by `descriptor`.
///
/// The descriptor's rotation records how far the source is rotated
/// clockwise; it is corrected by rotating the pixels the same amount
/// clockwise, expanding the canvas to fit.
pub fn render_image(descriptor: &StreamDescriptor) -> Result<RenderedImage> {
    let path = Path::new(&descriptor.source);
    if !path.exists() {
        return Err(Error::NotFound {
            path: descriptor.source.clone(),
        });
    }

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let source_format = reader.format();
    let decoded = reader.decode()?;

    let rotated = match descriptor.rotation {
        Rotation::None => decoded,
        Rotation::Cw90 => decoded.rotate90(),
        Rotation::Cw180 => decoded.rotate180(),
        Rotation::Cw270 => decoded.rotate270(),
    };

    let force_png = matches!(
        source_format,
        Some(ImageFormat::Png) | Some(ImageFormat::WebP)
    ) || rotated.color().has_alpha();

    let (format, content_type) = if force_png {
        (ImageFormat::Png, "image/png")
    } else {
        (ImageFormat::Jpeg, "image/jpeg")
    };

    let mut buf = Cursor::new(Vec::new());
    if format == ImageFormat::Jpeg {
        // JPEG cannot encode every decoded layout; normalize to 8-bit RGB.
        DynamicImage::ImageRgb8(rotated.to_rgb8()).write_to(&mut buf, format)?;
    } else {
        rotated.write_to(&mut buf, format)?;
    }

    Ok(RenderedImage {
        bytes: buf.into_inner(),
        content_type,
    })
}
