use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::errors::{ColorizeError, Result};
use crate::pipeline::{Colorizer, InputContract, PipelineInput, PipelineOutput};

type Init = Box<dyn Fn() -> Result<Box<dyn Colorizer>> + Send + Sync>;

/// A colorizer that is built on first use and then kept for the life of the
/// process.
///
/// Construction usually means provisioning model weights and loading them, so
/// it is deferred until a request actually needs it. If construction fails the
/// error goes back to that request and the next request tries again.
pub struct LazyColorizer {
    contract: InputContract,
    cell: OnceCell<Box<dyn Colorizer>>,
    init: Init,
}

impl LazyColorizer {
    /// `contract` must match what `init` builds; it is needed before the
    /// pipeline exists.
    pub fn new<F>(contract: InputContract, init: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Colorizer>> + Send + Sync + 'static,
    {
        LazyColorizer {
            contract,
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns the pipeline, constructing it if absent.
    pub fn get(&self) -> Result<&dyn Colorizer> {
        let colorizer = self.cell.get_or_try_init(|| {
            info!(contract = ?self.contract, "constructing colorization pipeline");
            let built = (self.init)().map_err(|e| {
                warn!(error = %e, "pipeline construction failed");
                e
            })?;
            if built.input_contract() != self.contract {
                return Err(ColorizeError::inference(format!(
                    "pipeline expects {:?} input but was declared as {:?}",
                    built.input_contract(),
                    self.contract
                )));
            }
            Ok(built)
        })?;
        Ok(colorizer.as_ref())
    }
}

impl Colorizer for LazyColorizer {
    fn input_contract(&self) -> InputContract {
        self.contract
    }

    fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
        self.get()?.colorize(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelOrder;
    use crate::pipeline::RawGrid;
    use image::RgbImage;
    use std::{
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    struct Echo;

    impl Colorizer for Echo {
        fn input_contract(&self) -> InputContract {
            InputContract::BgrArray
        }

        fn colorize(&self, input: PipelineInput<'_>) -> Result<PipelineOutput> {
            match input {
                PipelineInput::Bgr(grid) => Ok(PipelineOutput::with_output(RawGrid::from_image(
                    grid.clone(),
                    ChannelOrder::Bgr,
                ))),
                PipelineInput::Path(_) => Err(ColorizeError::inference("unexpected path")),
            }
        }
    }

    fn unavailable() -> ColorizeError {
        ColorizeError::ModelUnavailable {
            model_id: "test/model".to_owned(),
            dir: PathBuf::from("/nowhere"),
            reason: "missing".to_owned(),
        }
    }

    #[test]
    fn constructs_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let lazy = LazyColorizer::new(InputContract::BgrArray, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Echo) as Box<dyn Colorizer>)
        });

        assert!(!lazy.is_initialized());
        let grid = RgbImage::new(2, 2);
        for _ in 0..3 {
            lazy.colorize(PipelineInput::Bgr(&grid)).unwrap();
        }
        assert!(lazy.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let lazy = LazyColorizer::new(InputContract::BgrArray, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(unavailable())
            } else {
                Ok(Box::new(Echo) as Box<dyn Colorizer>)
            }
        });

        let grid = RgbImage::new(1, 1);
        let first = lazy.colorize(PipelineInput::Bgr(&grid)).unwrap_err();
        assert_eq!(first.kind(), "model_unavailable");
        assert!(lazy.colorize(PipelineInput::Bgr(&grid)).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn contract_mismatch_is_refused() {
        let lazy = LazyColorizer::new(InputContract::Path, || {
            Ok(Box::new(Echo) as Box<dyn Colorizer>)
        });
        assert!(lazy.get().is_err());
        assert!(!lazy.is_initialized());
    }
}
