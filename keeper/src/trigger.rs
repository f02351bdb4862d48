use crate::chain::{ChainGateway, TxDigest};
use crate::error::{Error, Result};
use crate::prover::VrfProver;
use crate::utils::{alpha_from_millis, now_ms};
use log::{info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify};

/// One round-advance attempt, kept only for logging.
#[derive(Debug, Default)]
struct TriggerAttempt {
    alpha: Vec<u8>,
    proof: Option<Vec<u8>>,
    output: Option<Vec<u8>>,
    digest: Option<TxDigest>,
}

impl fmt::Display for TriggerAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alpha={} output={} proof={} digest={}",
            String::from_utf8_lossy(&self.alpha),
            self.output.as_deref().map(hex::encode).unwrap_or_default(),
            self.proof.as_deref().map(hex::encode).unwrap_or_default(),
            self.digest.as_deref().unwrap_or("-"),
        )
    }
}

/// Derives alpha, proves it and submits `trigger_new_round`.
///
/// Every entry point holds `lock` for the whole attempt, so the scheduler and
/// the http gateway never have two submissions in flight.
pub struct TriggerExecutor {
    chain: Arc<dyn ChainGateway>,
    prover: Arc<dyn VrfProver>,
    lock: Mutex<()>,
    advanced: Notify,
    clock: fn() -> u64,
}

impl TriggerExecutor {
    pub fn new(chain: Arc<dyn ChainGateway>, prover: Arc<dyn VrfProver>) -> Self {
        Self {
            chain,
            prover,
            lock: Mutex::new(()),
            advanced: Notify::new(),
            clock: now_ms,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn chain(&self) -> &Arc<dyn ChainGateway> {
        &self.chain
    }

    pub fn now_ms(&self) -> u64 {
        (self.clock)()
    }

    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Resolves the next time any caller successfully advances a round.
    pub fn round_advanced(&self) -> Notified<'_> {
        self.advanced.notified()
    }

    /// Unconditional trigger; waits for any in-flight trigger to finish first.
    pub async fn trigger_round(&self) -> Result<TxDigest> {
        let _guard = self.lock.lock().await;
        self.attempt().await
    }

    /// Unconditional trigger that refuses to queue behind another one.
    pub async fn try_trigger_round(&self) -> Result<TxDigest> {
        let _guard = self.lock.try_lock().map_err(|_| Error::InProgress)?;
        self.attempt().await
    }

    /// Trigger `round_number` only if the ledger still shows it as the active round.
    pub async fn trigger_expired_round(&self, round_number: u64) -> Result<TxDigest> {
        let _guard = self.lock.lock().await;
        let state = self.chain.read_round_state().await?;
        if !state.has_active_round {
            return Err(Error::AlreadyAdvanced {
                expected: round_number,
                current: None,
            });
        }
        if state.round_number != round_number {
            return Err(Error::AlreadyAdvanced {
                expected: round_number,
                current: Some(state.round_number),
            });
        }
        self.attempt().await
    }

    async fn attempt(&self) -> Result<TxDigest> {
        let mut attempt = TriggerAttempt {
            alpha: alpha_from_millis(self.now_ms()),
            ..Default::default()
        };
        info!("trigger_new_round, alpha={}", String::from_utf8_lossy(&attempt.alpha));

        let vrf = self.prover.prove(&attempt.alpha).await.map_err(|e| {
            warn!("vrf prove failed: {}", e);
            e
        })?;
        attempt.proof = Some(vrf.proof.clone());
        attempt.output = Some(vrf.output.clone());

        let digest = self
            .chain
            .submit_trigger(&vrf.output, &attempt.alpha, &vrf.proof)
            .await
            .map_err(|e| {
                warn!("trigger submit failed ({}): {}", attempt, e);
                e
            })?;
        attempt.digest = Some(digest.clone());
        info!("trigger tx sent: {}", attempt);

        self.advanced.notify_waiters();
        Ok(digest)
    }
}
