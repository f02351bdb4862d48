use crate::config::KeeperOpts;
use crate::error::Error;
use crate::retry::{RetryOutcome, RetryPolicy, RetryingTrigger};
use crate::trigger::TriggerExecutor;
use crate::utils::wait_until;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What one pass of the keeper loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No active round; slept the idle poll interval.
    Idle { round_number: u64 },
    /// Woken before expiry because a trigger landed through another path.
    Interrupted { round_number: u64 },
    Triggered { round_number: u64, outcome: RetryOutcome },
    /// Reading round state failed; slept the recovery interval.
    ReadFailed(Error),
    Shutdown,
}

/// Autonomous loop: Idle -> Waiting -> Triggering -> Idle.
pub struct RoundScheduler {
    executor: Arc<TriggerExecutor>,
    retry: RetryingTrigger,
    idle_poll: Duration,
    recovery: Duration,
    shutdown: watch::Receiver<bool>,
}

impl RoundScheduler {
    pub fn new(executor: Arc<TriggerExecutor>, opts: &KeeperOpts, shutdown: watch::Receiver<bool>) -> Self {
        let retry = RetryingTrigger::new(executor.clone(), RetryPolicy::from(opts));
        Self {
            executor,
            retry,
            idle_poll: opts.idle_poll(),
            recovery: opts.recovery(),
            shutdown,
        }
    }

    /// Runs until shutdown is signalled. Errors never end the loop.
    pub async fn run(mut self) {
        info!(
            "keeper loop started, max attempts {}, retry delay {:?}",
            self.retry.policy().max_attempts,
            self.retry.policy().delay
        );
        loop {
            if let Step::Shutdown = self.step().await {
                break;
            }
        }
        info!("keeper loop stopped");
    }

    pub async fn step(&mut self) -> Step {
        let state = match self.executor.chain().read_round_state().await {
            Ok(state) => state,
            Err(e) => {
                error!("keeper loop error, retrying in {:?}: {}", self.recovery, e);
                return match self.pause(self.recovery).await {
                    true => Step::Shutdown,
                    false => Step::ReadFailed(e),
                };
            }
        };

        if !state.has_active_round {
            info!("no active round yet, retrying in {:?}", self.idle_poll);
            return match self.pause(self.idle_poll).await {
                true => Step::Shutdown,
                false => Step::Idle {
                    round_number: state.round_number,
                },
            };
        }

        let wait = wait_until(state.end_time_ms, self.executor.now_ms());
        info!(
            "round {} ({} bets) ends at {}, next trigger in {}s",
            state.round_number,
            state.bets,
            state.end_time_ms,
            (wait.as_millis() + 999) / 1000
        );
        if !wait.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.executor.round_advanced() => {
                    info!("round {} advanced by another trigger, re-reading state", state.round_number);
                    return Step::Interrupted {
                        round_number: state.round_number,
                    };
                }
                _ = shutdown_signal(&mut self.shutdown) => return Step::Shutdown,
            }
        }

        let outcome = self.retry.run_with_retry(state.round_number).await;
        Step::Triggered {
            round_number: state.round_number,
            outcome,
        }
    }

    /// Sleep for `d`; true if shutdown arrived first.
    async fn pause(&mut self, d: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(d) => false,
            _ = shutdown_signal(&mut self.shutdown) => true,
        }
    }
}

async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
