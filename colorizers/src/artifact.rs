use std::io::Cursor;

use image::{imageops, ImageFormat, RgbImage};
use uuid::Uuid;

use crate::errors::{ColorizeError, Result};

pub const PNG_MIME: &str = "image/png";

/// How the downloadable artifact is named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArtifactNaming {
    /// `<uuid>.png`, a fresh name for every request.
    #[default]
    Unique,
    /// The same name every time. Only used for the download, never on disk.
    Fixed(String),
}

impl ArtifactNaming {
    pub fn file_name(&self, request_id: &Uuid) -> String {
        match self {
            ArtifactNaming::Unique => format!("{}.png", request_id),
            ArtifactNaming::Fixed(name) => name.clone(),
        }
    }
}

/// PNG bytes offered to the user as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn png(file_name: String, image: &RgbImage) -> Result<OutputArtifact> {
        Ok(OutputArtifact {
            file_name,
            mime: PNG_MIME,
            bytes: encode_png(image)?,
        })
    }
}

/// Encodes `image` as PNG in memory.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ColorizeError::Encode)?;
    Ok(buffer.into_inner())
}

/// Places `left` and `right` next to each other on one canvas.
///
/// The canvas is as tall as the taller of the two; any uncovered area stays black.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, i64::from(left.width()), 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn unique_names_differ_per_request() {
        let naming = ArtifactNaming::Unique;
        let a = naming.file_name(&Uuid::new_v4());
        let b = naming.file_name(&Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn fixed_name_is_kept() {
        let naming = ArtifactNaming::Fixed("colorized.png".to_owned());
        assert_eq!(naming.file_name(&Uuid::new_v4()), "colorized.png");
    }

    #[test]
    fn png_is_lossless() {
        let img = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 7]));
        let artifact = OutputArtifact::png("a.png".to_owned(), &img).unwrap();
        assert_eq!(artifact.mime, "image/png");
        let decoded = image::load_from_memory(&artifact.bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn side_by_side_doubles_width() {
        let left = RgbImage::from_pixel(4, 3, Rgb([255, 0, 0]));
        let right = RgbImage::from_pixel(4, 3, Rgb([0, 0, 255]));
        let both = side_by_side(&left, &right);
        assert_eq!(both.dimensions(), (8, 3));
        assert_eq!(both.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(both.get_pixel(7, 2), &Rgb([0, 0, 255]));
    }
}
