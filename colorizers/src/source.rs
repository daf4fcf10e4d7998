use image::{ImageFormat, RgbImage};

use crate::errors::{ColorizeError, Result};

/// An uploaded image, decoded into an RGB grid.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub format: ImageFormat,
    pub pixels: RgbImage,
}

impl SourceImage {
    /// Decodes an upload. Only JPEG and PNG are accepted.
    pub fn decode(bytes: &[u8]) -> Result<SourceImage> {
        if bytes.is_empty() {
            return Err(ColorizeError::decode("upload is empty"));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| ColorizeError::decode(format!("unrecognized image data: {}", e)))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(ColorizeError::decode(format!(
                "unsupported image format {:?}, expected JPEG or PNG",
                format
            )));
        }

        let pixels = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ColorizeError::decode(e.to_string()))?
            .to_rgb8();

        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ColorizeError::decode("image has no pixels"));
        }

        Ok(SourceImage {
            format,
            pixels,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma, GrayImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn decodes_grayscale_jpeg_into_rgb() {
        let gray = GrayImage::from_pixel(100, 100, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Jpeg);

        let source = SourceImage::decode(&bytes).unwrap();
        assert_eq!(source.format, ImageFormat::Jpeg);
        assert_eq!(source.dimensions(), (100, 100));
    }

    #[test]
    fn rejects_garbage() {
        let err = SourceImage::decode(b"definitely not a picture").unwrap_err();
        assert_eq!(err.kind(), "decode_error");
    }

    #[test]
    fn rejects_empty_upload() {
        assert!(matches!(
            SourceImage::decode(&[]),
            Err(ColorizeError::Decode { .. })
        ));
    }

    #[test]
    fn rejects_truncated_png() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([0])));
        let bytes = encode(img, ImageFormat::Png);
        let err = SourceImage::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert_eq!(err.kind(), "decode_error");
    }
}
