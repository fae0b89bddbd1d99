//! State transitions for mail batches using the typestate pattern.
//!
//! ```text
//! MailBatch<Queued> ──begin()──> MailBatch<Sending> ──sent()────> MailBatch<Sent>
//!        ^                              │
//!        │                              └──failed()──> MailBatch<Failed>
//!        │                                                   │
//!        └───────────── retry() if attempts remain ──────────┘
//! ```
//!
//! # Retry convention
//!
//! `retries` counts *additional* attempts after the first: a batch is allowed
//! `retries + 1` total attempts. [`MailBatch::<Failed>::retry`] returns the
//! batch back to `Queued` while attempts remain and hands the `Failed` batch
//! back otherwise.

use chrono::Utc;

use super::types::{Failed, MailBatch, Queued, Sending, Sent};

impl MailBatch<Queued> {
    /// Start the next send attempt.
    pub fn begin(self) -> MailBatch<Sending> {
        MailBatch {
            state: Sending {
                attempt: self.state.attempts + 1,
                started_at: Utc::now(),
            },
            data: self.data,
        }
    }
}

impl MailBatch<Sending> {
    /// The relay accepted the batch.
    pub fn sent(self) -> MailBatch<Sent> {
        MailBatch {
            state: Sent {
                attempts: self.state.attempt,
                completed_at: Utc::now(),
            },
            data: self.data,
        }
    }

    /// The send attempt failed.
    pub fn failed(self, error: String) -> MailBatch<Failed> {
        MailBatch {
            state: Failed {
                attempts: self.state.attempt,
                error,
                failed_at: Utc::now(),
            },
            data: self.data,
        }
    }
}

impl MailBatch<Failed> {
    /// Attempt to retry this failed batch.
    ///
    /// Returns the batch back to `Queued` if attempts remain under the
    /// `retries + 1` total-attempt bound; otherwise returns the `Failed`
    /// batch unchanged.
    pub fn retry(self, retries: u32) -> std::result::Result<MailBatch<Queued>, Box<Self>> {
        if self.state.attempts <= retries {
            Ok(MailBatch {
                state: Queued {
                    attempts: self.state.attempts,
                },
                data: self.data,
            })
        } else {
            Err(Box::new(self))
        }
    }
}
