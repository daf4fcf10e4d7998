use std::{
    fs,
    io::Write,
    path::PathBuf,
    process::{Command, Output, Stdio},
    thread,
};

use image::RgbImage;
use tracing::debug;
use uuid::Uuid;

use crate::channel::ChannelOrder;
use crate::errors::{ColorizeError, Result};
use crate::pipeline::{Colorizer, InputContract, PipelineInput, PipelineOutput, RawGrid};
use crate::transient::TransientFile;

const STDERR_TAIL: usize = 512;

/// Runs colorization in an external program.
///
/// With the `Path` contract the argv gets `{input}` and `{output}` substituted:
/// the program reads the image at `{input}` and writes its result to `{output}`,
/// a transient file removed again after reading.
///
/// With the `BgrArray` contract the argv gets `{width}` and `{height}`; the
/// program receives `width * height * 3` BGR bytes on stdin and must answer
/// with the same amount of BGR bytes on stdout.
#[derive(Debug, Clone)]
pub struct CommandColorizer {
    argv: Vec<String>,
    contract: InputContract,
    output_order: ChannelOrder,
    work_dir: PathBuf,
}

impl CommandColorizer {
    pub fn new(argv: Vec<String>, contract: InputContract, work_dir: impl Into<PathBuf>) -> Result<Self> {
        if argv.is_empty() {
            return Err(ColorizeError::inference("colorizer command is empty"));
        }
        Ok(CommandColorizer {
            argv,
            contract,
            // image files are stored RGB; raw stdout follows the BGR convention
            output_order: match contract {
                InputContract::Path => ChannelOrder::Rgb,
                InputContract::BgrArray => ChannelOrder::Bgr,
            },
            work_dir: work_dir.into(),
        })
    }

    /// Overrides the channel order the program's output is declared in.
    pub fn with_output_order(mut self, order: ChannelOrder) -> Self {
        self.output_order = order;
        self
    }

    fn colorize_file(&self, input: &std::path::Path) -> Result<PipelineOutput> {
        let output_file = TransientFile::create(&self.work_dir, &Uuid::new_v4(), ".png")?;
        let input = input.to_string_lossy();
        let output = output_file.path().to_string_lossy();
        let argv = expand(&self.argv, &[("input", &*input), ("output", &*output)]);

        let result = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| spawn_error(&argv[0], e))?;
        check_status(&argv[0], &result)?;

        let bytes = fs::read(output_file.path())?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ColorizeError::inference(format!("{} wrote an unreadable image: {}", argv[0], e)))?
            .to_rgb8();
        let program = &argv[0];
        debug!(%program, width = image.width(), height = image.height(), "read colorizer output file");

        Ok(PipelineOutput::with_output(RawGrid::from_image(image, self.output_order)))
    }

    fn colorize_array(&self, grid: &RgbImage) -> Result<PipelineOutput> {
        let (width, height) = grid.dimensions();
        let (w, h) = (width.to_string(), height.to_string());
        let argv = expand(&self.argv, &[("width", w.as_str()), ("height", h.as_str())]);

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&argv[0], e))?;

        // feed stdin from a separate thread so a chatty child can't block us on stdout
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ColorizeError::inference("colorizer stdin is not available"))?;
        let payload = grid.as_raw().clone();
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let result = child
            .wait_with_output()
            .map_err(|e| ColorizeError::inference(format!("could not collect output of {}: {}", argv[0], e)))?;
        let written = writer
            .join()
            .map_err(|_| ColorizeError::inference("stdin writer panicked"))?;
        check_status(&argv[0], &result)?;
        written.map_err(|e| ColorizeError::inference(format!("could not feed the grid to {}: {}", argv[0], e)))?;

        Ok(PipelineOutput::with_output(RawGrid {
            width,
            height,
            order: self.output_order,
            data: result.stdout,
        }))
    }
}

impl Colorizer for CommandColorizer {
    fn input_contract(&self) -> InputContract {
        self.contract
    }

    fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
        match (self.contract, input) {
            (InputContract::Path, PipelineInput::Path(path)) => self.colorize_file(path),
            (InputContract::BgrArray, PipelineInput::Bgr(grid)) => self.colorize_array(grid),
            (contract, _) => Err(ColorizeError::inference(format!(
                "colorizer command takes {:?} input",
                contract
            ))),
        }
    }
}

/// Substitutes `{name}` placeholders in every argument.
pub fn expand(argv: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

/// Last few hundred bytes of a program's stderr, for error messages.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| text.len() - i <= STDERR_TAIL)
        .unwrap_or(text.len());
    text[start..].to_owned()
}

fn spawn_error(program: &str, e: std::io::Error) -> ColorizeError {
    ColorizeError::inference(format!("could not start {}: {}", program, e))
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(ColorizeError::inference(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr_tail(&output.stderr)
        )))
    }
}
