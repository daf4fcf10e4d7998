use std::{collections::HashMap, path::Path};

use image::RgbImage;

use crate::channel::ChannelOrder;
use crate::errors::{ColorizeError, Result};

/// Key under which a collaborator reports its colorized image.
pub const OUTPUT_IMG: &str = "output_img";

/// How a colorizer wants its input handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputContract {
    /// A path to an image file on local storage.
    Path,
    /// An in-memory grid with channels stored B, G, R.
    BgrArray,
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineInput<'a> {
    Path(&'a Path),
    Bgr(&'a RgbImage),
}

/// A raw pixel grid as produced by a collaborator, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGrid {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl RawGrid {
    pub fn from_image(image: RgbImage, order: ChannelOrder) -> Self {
        let (width, height) = image.dimensions();
        RawGrid {
            width,
            height,
            order,
            data: image.into_raw(),
        }
    }

    /// Turns the raw buffer into an image, keeping its channel order as is.
    pub fn into_image(self) -> Result<(RgbImage, ChannelOrder)> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                ColorizeError::inference(format!(
                    "output grid of {}x{} is too large",
                    self.width, self.height
                ))
            })?;
        if self.data.len() != expected {
            return Err(ColorizeError::inference(format!(
                "output grid of {}x{} carries {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                expected
            )));
        }
        let order = self.order;
        RgbImage::from_raw(self.width, self.height, self.data)
            .map(|image| (image, order))
            .ok_or_else(|| ColorizeError::inference("output grid has an invalid layout"))
    }
}

/// Structured result of a collaborator call.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    grids: HashMap<String, RawGrid>,
}

impl PipelineOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for an output holding only `output_img`.
    pub fn with_output(grid: RawGrid) -> Self {
        let mut output = Self::new();
        output.insert(OUTPUT_IMG, grid);
        output
    }

    pub fn insert(&mut self, key: impl Into<String>, grid: RawGrid) {
        self.grids.insert(key.into(), grid);
    }

    pub fn get(&self, key: &str) -> Option<&RawGrid> {
        self.grids.get(key)
    }

    pub fn take(&mut self, key: &str) -> Option<RawGrid> {
        self.grids.remove(key)
    }
}

/// The colorization collaborator.
///
/// Implementations are opaque: a pre-trained model behind some runtime. The
/// workflow only relies on the input contract and on `output_img` being
/// present in the returned mapping.
pub trait Colorizer: Send + Sync {
    fn input_contract(&self) -> InputContract;

    fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput>;
}

impl<C: Colorizer + ?Sized> Colorizer for std::sync::Arc<C> {
    fn input_contract(&self) -> InputContract {
        (**self).input_contract()
    }

    fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
        (**self).colorize(input)
    }
}

impl<C: Colorizer + ?Sized> Colorizer for Box<C> {
    fn input_contract(&self) -> InputContract {
        (**self).input_contract()
    }

    fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
        (**self).colorize(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn raw_grid_rejects_short_buffer() {
        let grid = RawGrid {
            width: 4,
            height: 4,
            order: ChannelOrder::Bgr,
            data: vec![0; 10],
        };
        assert_eq!(grid.into_image().unwrap_err().kind(), "inference_error");
    }

    #[test]
    fn raw_grid_with_overflowing_dimensions_is_an_inference_error() {
        let grid = RawGrid {
            width: u32::MAX,
            height: u32::MAX,
            order: ChannelOrder::Bgr,
            data: vec![],
        };
        assert_eq!(grid.into_image().unwrap_err().kind(), "inference_error");
    }

    #[test]
    fn raw_grid_keeps_order() {
        let img = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let (back, order) = RawGrid::from_image(img.clone(), ChannelOrder::Bgr)
            .into_image()
            .unwrap();
        assert_eq!(back, img);
        assert_eq!(order, ChannelOrder::Bgr);
    }

    #[test]
    fn output_is_keyed() {
        let img = RgbImage::new(1, 1);
        let mut out = PipelineOutput::with_output(RawGrid::from_image(img, ChannelOrder::Rgb));
        assert!(out.get(OUTPUT_IMG).is_some());
        assert!(out.take("mask").is_none());
        assert!(out.take(OUTPUT_IMG).is_some());
        assert!(out.get(OUTPUT_IMG).is_none());
    }
}
