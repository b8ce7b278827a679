//! Resumable batch pipeline: candidates in, polyphone dictionary out

pub mod aggregate;
pub mod checkpoint;
pub mod scheduler;

pub use aggregate::{Aggregator, BatchResult, ProgressState};
pub use checkpoint::{CheckpointManager, LoadOutcome};
pub use scheduler::{PassOutcome, Scheduler, SchedulerOptions};

use crate::dict::PhoneticCapability;
use crate::error::Result;
use crate::export::{self, PolyphoneDictionary};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// All batches were merged
    Completed(ProgressState),
    /// Stopped early; progress was saved to the checkpoint
    Interrupted { current_index: usize, processed: usize },
}

/// How a full build ended
#[derive(Debug)]
pub enum BuildOutcome {
    /// The output module was written and the checkpoint removed
    Built(PolyphoneDictionary),
    Interrupted { current_index: usize, processed: usize },
}

/// Ties the scheduler, the aggregator and the checkpoint together
pub struct Pipeline<C: ?Sized> {
    scheduler: Scheduler<C>,
    checkpoint: CheckpointManager,
    stop: Arc<AtomicBool>,
}

impl<C> Pipeline<C>
where
    C: PhoneticCapability + ?Sized + 'static,
{
    pub fn new(capability: Arc<C>, options: SchedulerOptions, checkpoint: CheckpointManager) -> Self {
        Self::with_stop(capability, options, checkpoint, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`Pipeline::new`], sharing an existing stop flag
    pub fn with_stop(
        capability: Arc<C>,
        options: SchedulerOptions,
        checkpoint: CheckpointManager,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(capability, options, Arc::clone(&stop)),
            checkpoint,
            stop,
        }
    }

    /// Flag that stops submission of new batches when set (e.g. from a signal handler)
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    /// Process every candidate, resuming from the checkpoint if there is one.
    ///
    /// On interruption the state is saved before returning. On any other error
    /// a best-effort save is attempted and the error is returned.
    pub async fn run(&self, candidates: &BTreeSet<String>) -> Result<RunOutcome> {
        let sequence: Vec<String> = candidates.iter().cloned().collect();
        let mut aggregator = Aggregator::new(self.checkpoint.load().into_state());

        match self.scheduler.run(&sequence, &mut aggregator, &self.checkpoint).await {
            Ok(PassOutcome::Finished) => {
                aggregator.report_progress(sequence.len());
                Ok(RunOutcome::Completed(aggregator.into_state()))
            }
            Ok(PassOutcome::Stopped) => {
                tracing::warn!("Interrupted, saving progress to {}", self.checkpoint.path().display());
                self.checkpoint.save(aggregator.state())?;
                let state = aggregator.state();
                Ok(RunOutcome::Interrupted {
                    current_index: state.current_index,
                    processed: state.processed_phrases.len(),
                })
            }
            Err(e) => {
                self.save_best_effort(aggregator.state());
                Err(e)
            }
        }
    }

    /// Run, then filter and write the output module to `output`
    pub async fn build(&self, candidates: &BTreeSet<String>, output: &Path) -> Result<BuildOutcome> {
        let state = match self.run(candidates).await? {
            RunOutcome::Completed(state) => state,
            RunOutcome::Interrupted {
                current_index,
                processed,
            } => {
                return Ok(BuildOutcome::Interrupted {
                    current_index,
                    processed,
                })
            }
        };

        tracing::info!("Filtering final polyphone phrases...");
        let dictionary = export::finalize(&state);
        if let Err(e) = export::write_module(&dictionary, output) {
            self.save_best_effort(&state);
            return Err(e);
        }
        self.checkpoint.clear()?;

        tracing::info!(
            "Done: {} polyphonic characters, {} polyphonic phrases written to {}",
            dictionary.chars.len(),
            dictionary.phrases.len(),
            output.display()
        );
        Ok(BuildOutcome::Built(dictionary))
    }

    fn save_best_effort(&self, state: &ProgressState) {
        match self.checkpoint.save(state) {
            Ok(()) => tracing::info!("Progress saved to {}", self.checkpoint.path().display()),
            Err(e) => tracing::error!("Failed to save progress after error: {}", e),
        }
    }
}
