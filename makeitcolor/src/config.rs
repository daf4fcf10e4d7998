use std::path::PathBuf;

use colorizers::{ArtifactNaming, ChannelOrder, InputContract};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::errors::{Result, ServiceError};

pub const ENV_PREFIX: &str = "MAKEITCOLOR";

/// Service settings, read from an optional TOML file and `MAKEITCOLOR_*`
/// environment variables (nested keys use `__`, e.g. `MAKEITCOLOR_MODEL__DIR`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP server listens on.
    pub bind: String,
    /// Where transient files are created.
    pub work_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Fixed download name; a fresh `<uuid>.png` per request when unset.
    pub artifact_name: Option<String>,
    /// Sample photos offered on the upload page.
    pub samples_dir: Option<PathBuf>,
    pub model: ModelSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub id: String,
    pub dir: PathBuf,
    /// Run once when `dir` is missing; `{model_id}` and `{dir}` are substituted.
    pub fetch_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Inference program. `{model_dir}` is substituted, plus `{input}`/`{output}`
    /// or `{width}`/`{height}` depending on `input`.
    pub command: Vec<String>,
    pub input: InputKind,
    /// Channel order the program answers in. Defaults to RGB for files and
    /// BGR for raw arrays.
    pub output_order: Option<OrderSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Path,
    BgrArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSetting {
    Rgb,
    Bgr,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind: "127.0.0.1:7860".to_owned(),
            work_dir: PathBuf::from("./work"),
            max_upload_bytes: 20 * 1024 * 1024,
            artifact_name: None,
            samples_dir: None,
            model: ModelSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            id: "damo/cv_ddcolor_image-colorization".to_owned(),
            dir: PathBuf::from("./makeitcolor"),
            fetch_command: Vec::new(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            command: Vec::new(),
            input: InputKind::Path,
            output_order: None,
        }
    }
}

impl From<InputKind> for InputContract {
    fn from(kind: InputKind) -> Self {
        match kind {
            InputKind::Path => InputContract::Path,
            InputKind::BgrArray => InputContract::BgrArray,
        }
    }
}

impl From<OrderSetting> for ChannelOrder {
    fn from(order: OrderSetting) -> Self {
        match order {
            OrderSetting::Rgb => ChannelOrder::Rgb,
            OrderSetting::Bgr => ChannelOrder::Bgr,
        }
    }
}

impl Settings {
    /// Loads `<name>.toml` (if present) and overlays the environment.
    pub fn load(name: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(environment())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses settings from TOML text, without looking at the environment.
    pub fn from_toml(text: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.command.is_empty() {
            return Err(ServiceError::InvalidSetting {
                key: "pipeline.command",
                reason: "no colorization program configured".to_owned(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ServiceError::InvalidSetting {
                key: "max_upload_bytes",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if matches!(&self.artifact_name, Some(name) if name.trim().is_empty() || name.contains(['/', '\\', '"'])) {
            return Err(ServiceError::InvalidSetting {
                key: "artifact_name",
                reason: "must be a plain file name".to_owned(),
            });
        }
        Ok(())
    }

    pub fn naming(&self) -> ArtifactNaming {
        match &self.artifact_name {
            Some(name) => ArtifactNaming::Fixed(name.clone()),
            None => ArtifactNaming::Unique,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(" ")
        .with_list_parse_key("pipeline.command")
        .with_list_parse_key("model.fetch_command")
        .try_parsing(true)
}
