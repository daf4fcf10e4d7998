use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::command::{expand, stderr_tail};
use crate::errors::{ColorizeError, Result};

/// Makes sure the weights of a model are present in a local directory.
///
/// Fetching itself is left to an external command (for example a model hub
/// CLI). It runs at most once per store; later calls only look at the disk.
#[derive(Debug)]
pub struct ModelStore {
    model_id: String,
    dir: PathBuf,
    fetch: Option<Vec<String>>,
    fetched: OnceCell<std::result::Result<(), String>>,
}

impl ModelStore {
    pub fn new(model_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        ModelStore {
            model_id: model_id.into(),
            dir: dir.into(),
            fetch: None,
            fetched: OnceCell::new(),
        }
    }

    /// Command used to download missing weights. `{model_id}` and `{dir}` are
    /// substituted in every argument.
    pub fn with_fetch_command(mut self, argv: Vec<String>) -> Self {
        self.fetch = if argv.is_empty() { None } else { Some(argv) };
        self
    }

    pub fn fetch_attempted(&self) -> bool {
        self.fetched.get().is_some()
    }

    /// Returns the weights directory, fetching it first if it is missing.
    pub fn ensure(&self) -> Result<&Path> {
        if has_weights(&self.dir) {
            return Ok(&self.dir);
        }

        let argv = match &self.fetch {
            Some(argv) => argv,
            None => return Err(self.unavailable("no local weights and no fetch command configured")),
        };

        let outcome = self.fetched.get_or_init(|| self.run_fetch(argv));
        if let Err(reason) = outcome {
            return Err(self.unavailable(reason.clone()));
        }

        if has_weights(&self.dir) {
            Ok(&self.dir)
        } else {
            Err(self.unavailable("fetch command finished but the directory is still empty"))
        }
    }

    fn run_fetch(&self, argv: &[String]) -> std::result::Result<(), String> {
        let dir = self.dir.to_string_lossy();
        let argv = expand(argv, &[("model_id", self.model_id.as_str()), ("dir", &*dir)]);
        let program = &argv[0];
        info!(model_id = %self.model_id, dir = ?self.dir, %program, "fetching model weights");

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("could not start {}: {}", argv[0], e))?;

        if output.status.success() {
            Ok(())
        } else {
            let reason = format!(
                "{} exited with {}: {}",
                argv[0],
                output.status,
                stderr_tail(&output.stderr)
            );
            warn!(model_id = %self.model_id, %reason, "model fetch failed");
            Err(reason)
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> ColorizeError {
        ColorizeError::ModelUnavailable {
            model_id: self.model_id.clone(),
            dir: self.dir.clone(),
            reason: reason.into(),
        }
    }
}

fn has_weights(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
