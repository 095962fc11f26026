use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::GenericImageView;

/// Largest edge of a stored avatar, in pixels.
pub const MAX_AVATAR_DIM: u32 = 128;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Load an image, shrink it to fit `MAX_AVATAR_DIM` and return it as a JPEG
/// data URI suitable for the contact's `avatar` field.
pub fn data_uri_from_path(path: &Path) -> Result<String> {
    if !path.exists() {
        bail!("avatar file not found: {}", path.display());
    }

    let img = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?;

    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_within(width, height, MAX_AVATAR_DIM);
    let resized = if (new_width, new_height) == (width, height) {
        img
    } else {
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut jpeg_data = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut jpeg_data);
        rgb.write_to(&mut cursor, image::ImageOutputFormat::Jpeg(85))
            .with_context(|| "failed to encode image as JPEG")?;
    }

    Ok(format!("{DATA_URI_PREFIX}{}", BASE64_STANDARD.encode(&jpeg_data)))
}

/// Scale `(width, height)` down to fit a `max_dim` square, keeping aspect ratio.
fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }
    let ratio = f64::min(
        max_dim as f64 / width as f64,
        max_dim as f64 / height as f64,
    );
    let new_w = (width as f64 * ratio).round() as u32;
    let new_h = (height as f64 * ratio).round() as u32;
    (new_w.max(1), new_h.max(1))
}
