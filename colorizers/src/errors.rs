use std::{io, path::PathBuf, result};

use thiserror::Error;

pub type Result<T> = result::Result<T, ColorizeError>;

#[derive(Debug, Error)]
pub enum ColorizeError {
    /// The upload is not an image we can decode.
    #[error("could not decode uploaded image: {reason}")]
    Decode { reason: String },

    /// The colorization collaborator failed or handed back something unusable.
    #[error("colorization failed: {reason}")]
    Inference { reason: String },

    #[error("model {model_id} is not available at {dir:?}: {reason}")]
    ModelUnavailable {
        model_id: String,
        dir: PathBuf,
        reason: String,
    },

    #[error("could not encode colorized image as PNG")]
    Encode(#[source] image::ImageError),

    #[error("i/o error")]
    Io(#[from] io::Error),
}

impl ColorizeError {
    pub fn decode(reason: impl Into<String>) -> Self {
        ColorizeError::Decode {
            reason: reason.into(),
        }
    }

    pub fn inference(reason: impl Into<String>) -> Self {
        ColorizeError::Inference {
            reason: reason.into(),
        }
    }

    /// Short, stable name of the error class, used in user-facing payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ColorizeError::Decode { .. } => "decode_error",
            ColorizeError::Inference { .. } => "inference_error",
            ColorizeError::ModelUnavailable { .. } => "model_unavailable",
            ColorizeError::Encode(_) => "encode_error",
            ColorizeError::Io(_) => "io_error",
        }
    }
}
