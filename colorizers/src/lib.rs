//! Turning black-and-white photographs into colorized ones.
//!
//! The colorization model itself is an external collaborator behind the
//! [`Colorizer`] trait. This crate holds everything around it: decoding the
//! upload, handing it over the way the collaborator wants it, normalizing the
//! channel order of the answer, and packaging the result as PNG.

pub mod artifact;
pub mod channel;
pub mod command;
pub mod errors;
pub mod lazy;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod transient;
pub mod workflow;

pub use image::{ImageFormat, RgbImage};

pub use artifact::{ArtifactNaming, OutputArtifact};
pub use channel::ChannelOrder;
pub use command::{expand, CommandColorizer};
pub use errors::{ColorizeError, Result};
pub use lazy::LazyColorizer;
pub use model::ModelStore;
pub use pipeline::{Colorizer, InputContract, PipelineInput, PipelineOutput, RawGrid, OUTPUT_IMG};
pub use source::SourceImage;
pub use transient::TransientFile;
pub use workflow::{Conversion, ConversionWorkflow};
