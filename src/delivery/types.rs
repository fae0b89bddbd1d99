//! Batch delivery state types using the typestate pattern.
//!
//! Each batch progresses through `Queued -> Sending -> {Sent | Failed}`,
//! with a failed attempt optionally returning to `Queued` while retries
//! remain. Transitions are enforced at compile time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Unique identifier for a delivery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        RunId(uuid)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a batch within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        BatchId(uuid)
    }
}

impl std::ops::Deref for BatchId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Marker trait for valid batch states.
pub trait BatchState: Send + Sync {}

/// A batch of recipients moving through the delivery lifecycle.
///
/// The generic parameter `T` represents the current state of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct MailBatch<T: BatchState> {
    /// The current state of the batch.
    pub state: T,
    /// The batch payload, fixed at planning time.
    pub data: BatchData,
}

/// Immutable batch payload: a contiguous slice of the recipient set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchData {
    pub id: BatchId,
    pub run_id: RunId,
    /// Zero-based position of this batch within the run.
    pub index: usize,
    pub recipients: Vec<String>,
}

// ============================================================================
// Batch States
// ============================================================================

/// Batch is waiting for its next send attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Queued {
    /// Number of attempts already made (0 = not yet attempted).
    pub attempts: u32,
}

impl BatchState for Queued {}

/// Batch send is in flight.
#[derive(Debug, Clone, Serialize)]
pub struct Sending {
    /// 1-based number of the attempt currently in flight.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

impl BatchState for Sending {}

/// Batch was accepted by the relay (terminal state).
#[derive(Debug, Clone, Serialize)]
pub struct Sent {
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

impl BatchState for Sent {}

/// Batch exhausted its attempts (terminal state for the run; never fatal to
/// the run itself).
#[derive(Debug, Clone, Serialize)]
pub struct Failed {
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl BatchState for Failed {}

// ============================================================================
// Attempt log
// ============================================================================

/// Outcome of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Sent,
    Failed,
}

/// One send attempt for one batch, as recorded for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    /// Zero-based index of the batch within the run.
    pub batch_index: usize,
    /// 1-based attempt number within the batch.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Summary of a delivery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    /// Every attempt made, ordered by batch index then attempt number.
    pub attempts: Vec<DeliveryAttempt>,
    pub sent_batches: usize,
    pub failed_batches: usize,
}

impl DeliveryReport {
    /// Attempts recorded for one batch, in order.
    pub fn attempts_for(&self, batch_index: usize) -> Vec<&DeliveryAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.batch_index == batch_index)
            .collect()
    }
}
