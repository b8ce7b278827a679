//! Batch scheduling over a bounded pool of blocking workers

use super::aggregate::{Aggregator, BatchResult};
use super::checkpoint::CheckpointManager;
use crate::dict::{extract_phrase, PhoneticCapability};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Knobs of the worker pool
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Number of batches processed concurrently
    pub workers: usize,
    /// Phrases per batch
    pub batch_size: usize,
    /// Save a checkpoint every this many merged batches
    pub checkpoint_interval: usize,
    /// Abandon a batch that runs longer than this
    pub batch_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: 8,
            batch_size: 1000,
            checkpoint_interval: 10,
            batch_timeout: None,
        }
    }
}

impl SchedulerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(Error::Config("checkpoint_interval must be at least 1".into()));
        }
        Ok(())
    }
}

/// How a scheduling pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every batch was submitted and drained
    Finished,
    /// The stop flag was raised before all batches were submitted
    Stopped,
}

/// Run the extractor over one batch. Failing phrases are logged and left out.
pub fn process_batch<C>(capability: &C, start: usize, end: usize, phrases: Vec<String>) -> BatchResult
where
    C: PhoneticCapability + ?Sized,
{
    let mut readings = Vec::with_capacity(phrases.len());
    for phrase in &phrases {
        match extract_phrase(capability, phrase) {
            Ok(Some(reading)) => readings.push(reading),
            Ok(None) => tracing::debug!("No valid syllables for '{}', skipping", phrase),
            Err(e) => tracing::warn!("{}", e),
        }
    }
    BatchResult { start, end, readings }
}

type BatchTask = std::result::Result<Option<BatchResult>, tokio::task::JoinError>;

async fn run_batch<C>(
    capability: Arc<C>,
    start: usize,
    end: usize,
    phrases: Vec<String>,
    timeout: Option<Duration>,
) -> BatchTask
where
    C: PhoneticCapability + ?Sized + 'static,
{
    let handle =
        tokio::task::spawn_blocking(move || process_batch(capability.as_ref(), start, end, phrases));
    match timeout {
        None => handle.await.map(Some),
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined.map(Some),
            Err(_) => {
                tracing::warn!(
                    "Batch {}..{} exceeded {:?}, abandoning it until the next run",
                    start,
                    end,
                    limit
                );
                Ok(None)
            }
        },
    }
}

/// Partitions the candidate sequence and fans batches out to workers.
///
/// Results are merged into the [`Aggregator`] in completion order by the task
/// driving [`Scheduler::run`], which is the only writer of dictionary state.
pub struct Scheduler<C: ?Sized> {
    capability: Arc<C>,
    options: SchedulerOptions,
    stop: Arc<AtomicBool>,
}

impl<C> Scheduler<C>
where
    C: PhoneticCapability + ?Sized + 'static,
{
    pub fn new(capability: Arc<C>, options: SchedulerOptions, stop: Arc<AtomicBool>) -> Self {
        Self {
            capability,
            options,
            stop,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Batch boundaries from `start` to the end of a sequence of `total` phrases
    pub fn partition(start: usize, total: usize, batch_size: usize) -> Vec<(usize, usize)> {
        (start.min(total)..total)
            .step_by(batch_size.max(1))
            .map(|s| (s, (s + batch_size).min(total)))
            .collect()
    }

    /// Process `candidates` from the aggregator's progress index onwards
    pub async fn run(
        &self,
        candidates: &[String],
        aggregator: &mut Aggregator,
        checkpoint: &CheckpointManager,
    ) -> Result<PassOutcome> {
        self.options.validate()?;

        let total = candidates.len();
        let batches = Self::partition(aggregator.current_index(), total, self.options.batch_size);
        tracing::info!(
            "Processing {} batches of up to {} phrases with {} workers (starting at {}/{})",
            batches.len(),
            self.options.batch_size,
            self.options.workers,
            aggregator.current_index().min(total),
            total
        );

        let mut pending = batches.into_iter();
        let mut in_flight: JoinSet<BatchTask> = JoinSet::new();
        let mut exhausted = false;

        loop {
            while !exhausted && in_flight.len() < self.options.workers && !self.stopped() {
                let Some((start, end)) = pending.next() else {
                    exhausted = true;
                    break;
                };
                let phrases = aggregator.pending(&candidates[start..end]);
                let capability = Arc::clone(&self.capability);
                let timeout = self.options.batch_timeout;
                in_flight.spawn(run_batch(capability, start, end, phrases, timeout));
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let Some(result) = joined?? else {
                continue;
            };

            let merged = aggregator.merge_batch(&result);
            tracing::debug!(
                "Merged batch {}..{} ({} new phrases)",
                result.start,
                result.end,
                merged
            );

            if aggregator.batches_merged() % self.options.checkpoint_interval == 0 {
                self.save_in_background(aggregator, checkpoint).await;
                aggregator.report_progress(total);
            }
        }

        if pending.as_slice().is_empty() {
            Ok(PassOutcome::Finished)
        } else {
            Ok(PassOutcome::Stopped)
        }
    }

    /// Periodic save; a failure here is logged and the run goes on
    async fn save_in_background(&self, aggregator: &Aggregator, checkpoint: &CheckpointManager) {
        let bytes = match CheckpointManager::encode(aggregator.state()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode checkpoint: {}", e);
                return;
            }
        };
        let checkpoint = checkpoint.clone();
        match tokio::task::spawn_blocking(move || checkpoint.write_encoded(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to save checkpoint: {}", e),
            Err(e) => tracing::warn!("Checkpoint writer failed: {}", e),
        }
    }
}
