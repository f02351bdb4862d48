use crate::chain::TxDigest;
use crate::config::KeeperOpts;
use crate::error::Error;
use crate::trigger::TriggerExecutor;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

impl From<&KeeperOpts> for RetryPolicy {
    fn from(opts: &KeeperOpts) -> Self {
        Self {
            max_attempts: opts.max_attempts.max(1),
            delay: opts.retry_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Triggered { digest: TxDigest, attempts: u32 },
    /// Someone else advanced the round; nothing left to do.
    AlreadyAdvanced { attempts: u32 },
    /// Gave up on this round.
    Exhausted { attempts: u32, last_error: Error },
}

impl RetryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Triggered { attempts, .. }
            | RetryOutcome::AlreadyAdvanced { attempts }
            | RetryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Bounded fixed-delay retry around [`TriggerExecutor::trigger_expired_round`].
pub struct RetryingTrigger {
    executor: Arc<TriggerExecutor>,
    policy: RetryPolicy,
}

impl RetryingTrigger {
    pub fn new(executor: Arc<TriggerExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Never fails: exhaustion is reported in the outcome and only ends the
    /// attempt cycle for `round_number`.
    pub async fn run_with_retry(&self, round_number: u64) -> RetryOutcome {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.executor.trigger_expired_round(round_number).await {
                Ok(digest) => {
                    info!("round {} triggered on attempt {}: {}", round_number, attempts, digest);
                    return RetryOutcome::Triggered { digest, attempts };
                }
                Err(e @ Error::AlreadyAdvanced { .. }) => {
                    info!("{}, stop retrying", e);
                    return RetryOutcome::AlreadyAdvanced { attempts };
                }
                Err(e) => {
                    warn!("trigger attempt #{} for round {} failed: {}", attempts, round_number, e);
                    if attempts >= self.policy.max_attempts || !e.is_retryable() {
                        error!(
                            "all {} trigger attempts for round {} failed, giving up until the next round: {}",
                            attempts, round_number, e
                        );
                        return RetryOutcome::Exhausted {
                            attempts,
                            last_error: e,
                        };
                    }
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}
