//! Batched delivery with bounded retries.
//!
//! [`plan_batches`] partitions a frozen recipient set into fixed-size batches
//! in stable order. [`DeliveryOrchestrator`] then drives each batch through
//! the `Queued -> Sending -> {Sent | Failed}` lifecycle, retrying failed
//! sends with a configurable delay and recording every attempt. A batch that
//! exhausts its retries is marked failed and the run continues; only
//! run-level preconditions (bad config, oversized or missing attachments)
//! abort the run, and they do so before the first send.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{BroadsideError, Result};
use crate::mailer::{Mailer, Message};
use crate::recipients::RecipientSet;
use crate::validate::sanitize_filename;

pub mod transitions;
pub mod types;

pub use types::{
    AttemptOutcome, BatchData, BatchId, BatchState, DeliveryAttempt, DeliveryReport, Failed,
    MailBatch, Queued, RunId, Sending, Sent,
};

/// Per-attachment size ceiling: attachments are shared across all batches,
/// so a violation is fatal to the whole run.
pub const MAX_ATTACHMENT_BYTES: u64 = 15 * 1024 * 1024;

/// Configuration for a delivery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Mail relay address handed to the send capability.
    pub relay: String,

    /// Perform all validation but issue no network sends.
    pub dry_run: bool,

    /// Maximum number of recipients per batch.
    pub batch_size: usize,

    /// Additional attempts after the first; total attempts per batch is
    /// `retries + 1`.
    pub retries: u32,

    /// Delay between attempts of the same batch, in milliseconds.
    pub retry_delay_ms: u64,

    /// Cap on concurrently in-flight batches. 1 means sequential, in-order
    /// delivery where a retry wait blocks the run (the baseline model).
    pub max_concurrent_batches: usize,

    /// Per-attachment size ceiling in bytes.
    pub max_attachment_bytes: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            relay: "127.0.0.1:25".to_string(),
            dry_run: false,
            batch_size: 50,
            retries: 2,
            retry_delay_ms: 5000,
            max_concurrent_batches: 1,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

/// Partition a recipient set into batches of at most `batch_size`, in the
/// set's insertion order.
///
/// The last batch may be smaller. An empty set yields zero batches; whether
/// that is acceptable is the caller's decision. A zero `batch_size` is a
/// configuration error.
pub fn plan_batches(
    run_id: RunId,
    recipients: &RecipientSet,
    batch_size: usize,
) -> Result<Vec<MailBatch<Queued>>> {
    if batch_size == 0 {
        return Err(BroadsideError::Config(
            "batch size must be positive".to_string(),
        ));
    }

    Ok(recipients
        .as_slice()
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| MailBatch {
            state: Queued { attempts: 0 },
            data: BatchData {
                id: BatchId::from(Uuid::new_v4()),
                run_id,
                index,
                recipients: chunk.to_vec(),
            },
        })
        .collect())
}

/// Drives batches through the delivery lifecycle against a [`Mailer`].
pub struct DeliveryOrchestrator<M: Mailer> {
    mailer: Arc<M>,
    config: DeliveryConfig,
    shutdown_token: CancellationToken,
}

impl<M: Mailer + 'static> DeliveryOrchestrator<M> {
    /// Create a new orchestrator.
    pub fn new(mailer: Arc<M>, config: DeliveryConfig) -> Self {
        Self {
            mailer,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Use an external shutdown token. Cancelling it stops the run from
    /// scheduling further batches and cuts retry waits short.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Deliver `message` to `recipients` in batches.
    ///
    /// Returns the per-attempt log and run summary. Individual batch
    /// failures are recorded, never propagated; `Err` means the run's
    /// preconditions failed and nothing was dispatched.
    #[tracing::instrument(skip(self, recipients, message), fields(dry_run = self.config.dry_run))]
    pub async fn deliver(
        &self,
        recipients: &RecipientSet,
        message: &Message,
    ) -> Result<DeliveryReport> {
        let run_id = RunId::new();
        tracing::info!(
            run_id = %run_id,
            recipients = recipients.len(),
            config = ?serde_json::to_value(&self.config).ok(),
            "Starting delivery run"
        );

        self.check_attachments(message).await?;

        let batches = plan_batches(run_id, recipients, self.config.batch_size)?;
        if batches.is_empty() {
            tracing::info!(run_id = %run_id, "No recipients, nothing to send");
            return Ok(DeliveryReport::default());
        }
        tracing::debug!(run_id = %run_id, batches = batches.len(), "Planned batches");

        let report = if self.config.max_concurrent_batches <= 1 {
            self.deliver_sequential(run_id, batches, message).await
        } else {
            self.deliver_parallel(run_id, batches, message).await
        };

        tracing::info!(
            run_id = %run_id,
            sent_batches = report.sent_batches,
            failed_batches = report.failed_batches,
            attempts = report.attempts.len(),
            "Delivery run complete"
        );
        Ok(report)
    }

    /// Baseline model: batches one at a time, in order. A retry wait blocks
    /// the run, preserving the global batch ordering guarantee.
    async fn deliver_sequential(
        &self,
        run_id: RunId,
        batches: Vec<MailBatch<Queued>>,
        message: &Message,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for batch in batches {
            if self.shutdown_token.is_cancelled() {
                tracing::info!(run_id = %run_id, "Shutdown requested, not scheduling further batches");
                break;
            }

            let (_, attempts, sent) = process_batch(
                self.mailer.clone(),
                self.config.clone(),
                message.clone(),
                batch,
                self.shutdown_token.clone(),
            )
            .await;

            report.attempts.extend(attempts);
            if sent {
                report.sent_batches += 1;
            } else {
                report.failed_batches += 1;
            }
        }

        report
    }

    /// Parallel model: independent batches run concurrently under a global
    /// in-flight cap; one batch's retry wait never delays another. Attempts
    /// are merged back into batch-index order for a deterministic report.
    async fn deliver_parallel(
        &self,
        run_id: RunId,
        batches: Vec<MailBatch<Queued>>,
        message: &Message,
    ) -> DeliveryReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches));
        let mut join_set: JoinSet<(usize, Vec<DeliveryAttempt>, bool)> = JoinSet::new();

        for batch in batches {
            if self.shutdown_token.is_cancelled() {
                tracing::info!(run_id = %run_id, "Shutdown requested, not scheduling further batches");
                break;
            }

            let semaphore = semaphore.clone();
            let mailer = self.mailer.clone();
            let config = self.config.clone();
            let message = message.clone();
            let shutdown = self.shutdown_token.clone();

            join_set.spawn(async move {
                // Permit is held for the duration of this batch
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                process_batch(mailer, config, message, batch, shutdown).await
            });
        }

        let mut report = DeliveryReport::default();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((_, attempts, sent)) => {
                    report.attempts.extend(attempts);
                    if sent {
                        report.sent_batches += 1;
                    } else {
                        report.failed_batches += 1;
                    }
                }
                Err(join_error) => {
                    tracing::error!(run_id = %run_id, error = %join_error, "Batch task panicked");
                    report.failed_batches += 1;
                }
            }
        }

        report
            .attempts
            .sort_by_key(|a| (a.batch_index, a.attempt));
        report
    }

    /// Enforce the per-attachment ceiling and existence check before the
    /// first send attempt of the first batch. Attachments are shared across
    /// batches, so any violation is fatal to the whole run.
    async fn check_attachments(&self, message: &Message) -> Result<()> {
        for path in &message.attachments {
            let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                BroadsideError::Config(format!(
                    "attachment {} is not readable: {}",
                    path.display(),
                    e
                ))
            })?;

            let size = metadata.len();
            if size > self.config.max_attachment_bytes {
                return Err(BroadsideError::AttachmentTooLarge {
                    path: path.clone(),
                    size,
                    limit: self.config.max_attachment_bytes,
                });
            }

            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment");
            tracing::debug!(
                path = %path.display(),
                size,
                name = %sanitize_filename(name),
                "Attachment validated"
            );
        }
        Ok(())
    }
}

/// Run one batch through the retry state machine.
///
/// Returns the batch index, its attempt log, and whether it was sent.
async fn process_batch<M: Mailer>(
    mailer: Arc<M>,
    config: DeliveryConfig,
    message: Message,
    batch: MailBatch<Queued>,
    shutdown: CancellationToken,
) -> (usize, Vec<DeliveryAttempt>, bool) {
    let index = batch.data.index;
    let batch_id = batch.data.id;
    let mut attempts = Vec::new();
    let mut queued = batch;

    loop {
        let sending = queued.begin();
        let attempt = sending.state.attempt;
        tracing::debug!(
            batch_id = %batch_id,
            attempt,
            recipients = sending.data.recipients.len(),
            "Sending batch"
        );

        match mailer
            .send(
                &sending.data.recipients,
                &message,
                &config.relay,
                config.dry_run,
            )
            .await
        {
            Ok(()) => {
                let sent = sending.sent();
                attempts.push(DeliveryAttempt {
                    batch_index: index,
                    attempt,
                    outcome: AttemptOutcome::Sent,
                    error: None,
                    at: sent.state.completed_at,
                });
                tracing::info!(batch_id = %batch_id, attempt, "Batch sent");
                return (index, attempts, true);
            }
            Err(e) => {
                let failed = sending.failed(e.to_string());
                attempts.push(DeliveryAttempt {
                    batch_index: index,
                    attempt,
                    outcome: AttemptOutcome::Failed,
                    error: Some(failed.state.error.clone()),
                    at: failed.state.failed_at,
                });

                match failed.retry(config.retries) {
                    Ok(requeued) => {
                        tracing::warn!(
                            batch_id = %batch_id,
                            attempt,
                            delay_ms = config.retry_delay_ms,
                            error = %e,
                            "Batch send failed, retrying after delay"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)) => {
                                queued = requeued;
                            }
                            _ = shutdown.cancelled() => {
                                tracing::info!(batch_id = %batch_id, "Shutdown during retry wait, abandoning batch");
                                return (index, attempts, false);
                            }
                        }
                    }
                    Err(failed) => {
                        tracing::warn!(
                            batch_id = %batch_id,
                            attempts = failed.state.attempts,
                            error = %failed.state.error,
                            "Batch failed permanently (no retries remaining)"
                        );
                        return (index, attempts, false);
                    }
                }
            }
        }
    }
}
