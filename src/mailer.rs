//! Send-capability abstraction.
//!
//! This module defines the `Mailer` trait to abstract message dispatch,
//! enabling testability with mock implementations. The crate deliberately
//! ships no SMTP transport: the embedding application implements `Mailer`
//! over whatever relay client it uses, and the delivery orchestrator stays
//! testable without network I/O.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// The message to be dispatched to each batch of recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
    /// Paths of files to attach; size-checked before the first send.
    pub attachments: Vec<PathBuf>,
}

impl Message {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Trait for dispatching a composed message to a batch of recipients.
///
/// One call is one SMTP transaction: either every recipient in the slice is
/// handed to the relay, or the call fails as a whole with a transport error.
///
/// In dry-run mode the implementation must perform its own validation but
/// issue no network I/O.
#[async_trait]
pub trait Mailer: Send + Sync + Clone {
    /// Send `message` to `recipients` via `relay`.
    ///
    /// # Errors
    /// Returns `BroadsideError::Transport` if the relay rejects the
    /// transaction or the connection fails.
    async fn send(
        &self,
        recipients: &[String],
        message: &Message,
        relay: &str,
        dry_run: bool,
    ) -> Result<()>;
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Record of a call made to the mock mailer.
#[derive(Debug, Clone)]
pub struct MailCall {
    pub recipients: Vec<String>,
    pub subject: String,
    pub relay: String,
    pub dry_run: bool,
}

/// How many failures remain for a recipient-keyed failure rule.
#[derive(Debug, Clone, Copy)]
enum FailureBudget {
    Always,
    Remaining(u32),
}

/// Mock mailer for testing.
///
/// Succeeds by default. Failures are scripted per recipient: any send whose
/// batch contains a scripted address fails with a transport error, either
/// forever or for a bounded number of calls.
///
/// # Example
/// ```ignore
/// let mock = MockMailer::new();
/// mock.fail_containing("victim@example.com");        // fails every attempt
/// mock.fail_containing_times("flaky@example.com", 1); // fails once, then succeeds
/// ```
#[derive(Clone, Default)]
pub struct MockMailer {
    calls: Arc<Mutex<Vec<MailCall>>>,
    failures: Arc<Mutex<HashMap<String, FailureBudget>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send whose batch contains `address`.
    pub fn fail_containing(&self, address: &str) {
        self.failures
            .lock()
            .insert(address.to_lowercase(), FailureBudget::Always);
    }

    /// Fail the first `times` sends whose batch contains `address`, then
    /// succeed.
    pub fn fail_containing_times(&self, address: &str, times: u32) {
        self.failures
            .lock()
            .insert(address.to_lowercase(), FailureBudget::Remaining(times));
    }

    /// Get all calls that have been made to this mock mailer.
    pub fn get_calls(&self) -> Vec<MailCall> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get the number of calls whose batch contained `address`.
    pub fn calls_containing(&self, address: &str) -> usize {
        let needle = address.to_lowercase();
        self.calls
            .lock()
            .iter()
            .filter(|call| call.recipients.iter().any(|r| r.to_lowercase() == needle))
            .count()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(
        &self,
        recipients: &[String],
        message: &Message,
        relay: &str,
        dry_run: bool,
    ) -> Result<()> {
        self.calls.lock().push(MailCall {
            recipients: recipients.to_vec(),
            subject: message.subject.clone(),
            relay: relay.to_string(),
            dry_run,
        });

        let mut failures = self.failures.lock();
        for recipient in recipients {
            let key = recipient.to_lowercase();
            match failures.get_mut(&key) {
                Some(FailureBudget::Always) => {
                    return Err(crate::error::BroadsideError::Transport(format!(
                        "simulated relay failure for {}",
                        recipient
                    )));
                }
                Some(FailureBudget::Remaining(n)) if *n > 0 => {
                    *n -= 1;
                    return Err(crate::error::BroadsideError::Transport(format!(
                        "simulated relay failure for {}",
                        recipient
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
