use std::{path::PathBuf, time::Instant};

use image::RgbImage;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::artifact::{self, ArtifactNaming, OutputArtifact};
use crate::channel;
use crate::errors::{ColorizeError, Result};
use crate::pipeline::{Colorizer, InputContract, PipelineInput, PipelineOutput, OUTPUT_IMG};
use crate::source::SourceImage;
use crate::transient::TransientFile;

/// Everything the presentation layer needs after a successful run.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub request_id: Uuid,
    pub original: RgbImage,
    pub colorized: RgbImage,
    pub artifact: OutputArtifact,
}

impl Conversion {
    /// Original and colorized image next to each other, encoded as PNG.
    pub fn side_by_side(&self) -> Result<OutputArtifact> {
        let canvas = artifact::side_by_side(&self.original, &self.colorized);
        let stem = self
            .artifact
            .file_name
            .strip_suffix(".png")
            .unwrap_or(&self.artifact.file_name);
        OutputArtifact::png(format!("{}-comparison.png", stem), &canvas)
    }
}

/// Decode, colorize, convert and encode one uploaded image.
///
/// A run is single-shot and synchronous. Nothing is cached between runs; the
/// only thing written to disk is the transient input file for colorizers that
/// want a path, and that file is gone again when `run` returns.
#[derive(Debug)]
pub struct ConversionWorkflow<C> {
    colorizer: C,
    work_dir: PathBuf,
    naming: ArtifactNaming,
}

impl<C: Colorizer> ConversionWorkflow<C> {
    pub fn new(colorizer: C, work_dir: impl Into<PathBuf>) -> Self {
        ConversionWorkflow {
            colorizer,
            work_dir: work_dir.into(),
            naming: ArtifactNaming::default(),
        }
    }

    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn run(&self, upload: &[u8]) -> Result<Conversion> {
        self.run_with_id(upload, Uuid::new_v4())
    }

    pub fn run_with_id(&self, upload: &[u8], request_id: Uuid) -> Result<Conversion> {
        let span = info_span!("colorize", request_id = %request_id);
        let _enter = span.enter();
        let started = Instant::now();

        let source = SourceImage::decode(upload)?;
        let (width, height) = source.dimensions();
        debug!(width, height, format = ?source.format, "decoded upload");

        let mut output = self.infer(&source, &request_id)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "inference finished");

        let grid = output.take(OUTPUT_IMG).ok_or_else(|| {
            ColorizeError::inference(format!("colorizer result has no `{}` entry", OUTPUT_IMG))
        })?;
        let (raw, order) = grid.into_image()?;
        if raw.dimensions() != source.dimensions() {
            return Err(ColorizeError::inference(format!(
                "colorizer returned {}x{} for a {}x{} input",
                raw.width(),
                raw.height(),
                width,
                height
            )));
        }
        let colorized = channel::into_rgb(raw, order);

        let artifact = OutputArtifact::png(self.naming.file_name(&request_id), &colorized)?;
        info!(
            width,
            height,
            file_name = %artifact.file_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "colorization finished"
        );

        Ok(Conversion {
            request_id,
            original: source.pixels,
            colorized,
            artifact,
        })
    }

    fn infer(&self, source: &SourceImage, request_id: &Uuid) -> Result<PipelineOutput> {
        let result = match self.colorizer.input_contract() {
            InputContract::Path => {
                let transient = TransientFile::with_png(&self.work_dir, request_id, &source.pixels)?;
                let result = self.colorizer.colorize(PipelineInput::Path(transient.path()));
                let path = transient.to_path_buf();
                if let Err(e) = transient.close() {
                    warn!(path = ?path, error = %e, "could not remove transient input");
                }
                result
            }
            InputContract::BgrArray => {
                let bgr = channel::reversed(&source.pixels);
                self.colorizer.colorize(PipelineInput::Bgr(&bgr))
            }
        };
        result.map_err(as_inference_error)
    }
}

// Whatever goes wrong inside the collaborator is an inference failure, unless
// the model itself could not be provisioned.
fn as_inference_error(e: ColorizeError) -> ColorizeError {
    match e {
        ColorizeError::Inference { .. } | ColorizeError::ModelUnavailable { .. } => e,
        other => match std::error::Error::source(&other) {
            Some(source) => ColorizeError::inference(format!("{}: {}", other, source)),
            None => ColorizeError::inference(other.to_string()),
        },
    }
}
