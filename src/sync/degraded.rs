//! Degraded Modes
//!
//! Some checks guard a write but depend on services that may be down
//! (content moderation, encryption key preparation). Whether a failed check
//! lets the operation through is a per-deployment policy, recorded here
//! instead of being a silent default.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::sync::{BackendError, EventBus, SyncEvent};

// == Policy Types ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Proceed as if the check passed
    FailOpen,
    /// Refuse the operation
    FailClosed,
}

impl FailurePolicy {
    pub fn from_fail_open(fail_open: bool) -> Self {
        if fail_open {
            FailurePolicy::FailOpen
        } else {
            FailurePolicy::FailClosed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardedCheck {
    ContentModeration,
    EncryptionPreparation,
}

impl fmt::Display for GuardedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardedCheck::ContentModeration => f.write_str("content moderation"),
            GuardedCheck::EncryptionPreparation => f.write_str("encryption preparation"),
        }
    }
}

/// Policy per guarded check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedModes {
    pub moderation: FailurePolicy,
    pub encryption: FailurePolicy,
}

impl DegradedModes {
    pub fn policy_for(&self, check: GuardedCheck) -> FailurePolicy {
        match check {
            GuardedCheck::ContentModeration => self.moderation,
            GuardedCheck::EncryptionPreparation => self.encryption,
        }
    }
}

impl Default for DegradedModes {
    fn default() -> Self {
        Self {
            moderation: FailurePolicy::FailOpen,
            encryption: FailurePolicy::FailOpen,
        }
    }
}

// == Check Outcome ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Rejected(String),
    /// The check could not run and the fail-open policy let it through
    Degraded(String),
}

impl CheckOutcome {
    /// True when the guarded operation may proceed.
    pub fn allows(&self) -> bool {
        !matches!(self, CheckOutcome::Rejected(_))
    }
}

/// Runs `check` under `policy`.
///
/// `Ok(Ok(()))` passes, `Ok(Err(reason))` rejects, and an `Err` from the
/// check itself is resolved by the policy.
pub async fn run_guarded<Fut>(
    check: GuardedCheck,
    policy: FailurePolicy,
    events: &EventBus,
    future: Fut,
) -> Result<CheckOutcome>
where
    Fut: Future<Output = std::result::Result<std::result::Result<(), String>, BackendError>>,
{
    match future.await {
        Ok(Ok(())) => Ok(CheckOutcome::Passed),
        Ok(Err(reason)) => Ok(CheckOutcome::Rejected(reason)),
        Err(e) => match policy {
            FailurePolicy::FailOpen => {
                let reason = e.to_string();
                warn!(%check, %reason, "check unavailable, failing open");
                events.emit(SyncEvent::DegradedMode {
                    check,
                    reason: reason.clone(),
                });
                Ok(CheckOutcome::Degraded(reason))
            }
            FailurePolicy::FailClosed => Err(SyncError::CheckFailed {
                check,
                reason: e.to_string(),
            }),
        },
    }
}

// == Content Moderation ==
#[async_trait]
pub trait ContentModerator: Send + Sync {
    /// Whether `text` is acceptable to publish.
    async fn is_safe(&self, text: &str) -> std::result::Result<bool, BackendError>;
}
