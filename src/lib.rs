//! Bulk email notification sender.
//!
//! This crate assembles a recipient list from static lists plus dynamic
//! filtering against an inventory dataset, deduplicates and validates it,
//! and dispatches a message in fixed-size batches over a pluggable send
//! capability, retrying failed batches with a bounded attempt count and
//! inter-retry delay.
//!
//! The pipeline: filter file → [`FilterSet`] → [`MatchEngine`] (against
//! inventory) → matched addresses → [`assemble`] (with static lists) →
//! [`RecipientSet`] → batches → [`DeliveryOrchestrator`] → per-batch
//! outcomes in a [`DeliveryReport`].

pub mod delivery;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod mailer;
pub mod recipients;
pub mod validate;

// Re-export commonly used types
pub use delivery::{
    AttemptOutcome, DeliveryAttempt, DeliveryConfig, DeliveryOrchestrator, DeliveryReport,
    MAX_ATTACHMENT_BYTES, plan_batches,
};
pub use error::{BroadsideError, Result};
pub use filter::{
    FilterSet, MatchEngine, MatchMode, PredicateRule, RegexFlags, RuleDefaults, RuleGroup, parse,
    parse_with_defaults,
};
pub use inventory::{InventoryRecord, parse_inventory};
pub use mailer::{MailCall, Mailer, Message, MockMailer};
pub use recipients::{AssemblyReport, RecipientSet, assemble};
pub use validate::{is_valid_email, sanitize_filename};
