//! In-memory ledger and prover doubles shared by the unit tests.

use crate::chain::{ChainGateway, RoundState, TxDigest};
use crate::error::{Error, Result};
use crate::prover::{VrfOutput, VrfProver};
use crate::utils::now_ms;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submission {
    pub output: Vec<u8>,
    pub alpha: Vec<u8>,
    pub proof: Vec<u8>,
}

/// A ledger holding one game object. A successful submit starts the next
/// round `round_ms` from now.
pub(crate) struct StubChain {
    state: Mutex<RoundState>,
    round_ms: u64,
    submit_delay: Duration,
    read_errors: AtomicUsize,
    submit_errors: Mutex<VecDeque<Error>>,
    pub reads: AtomicUsize,
    pub submissions: Mutex<Vec<Submission>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl StubChain {
    pub fn new(state: RoundState) -> Self {
        Self {
            state: Mutex::new(state),
            round_ms: 60_000,
            submit_delay: Duration::ZERO,
            read_errors: AtomicUsize::new(0),
            submit_errors: Mutex::new(VecDeque::new()),
            reads: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn active(round_number: u64, end_time_ms: u64) -> Self {
        Self::new(RoundState {
            round_number,
            end_time_ms,
            has_active_round: true,
            bets: 0,
        })
    }

    pub fn idle(round_number: u64) -> Self {
        Self::new(RoundState {
            round_number,
            ..Default::default()
        })
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn fail_reads(&self, n: usize) {
        self.read_errors.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_submit(&self, e: Error) {
        self.submit_errors.lock().unwrap().push_back(e);
    }

    pub fn state(&self) -> RoundState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: RoundState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainGateway for StubChain {
    async fn read_round_state(&self) -> Result<RoundState> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let pending = self.read_errors.load(Ordering::SeqCst);
        if pending > 0 {
            self.read_errors.store(pending - 1, Ordering::SeqCst);
            return Err(Error::Read("fullnode unreachable".to_string()));
        }
        Ok(self.state())
    }

    async fn submit_trigger(&self, output: &[u8], alpha: &[u8], proof: &[u8]) -> Result<TxDigest> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(e) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(e);
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(Submission {
            output: output.to_vec(),
            alpha: alpha.to_vec(),
            proof: proof.to_vec(),
        });
        let mut state = self.state.lock().unwrap();
        state.round_number += 1;
        state.end_time_ms = now_ms() + self.round_ms;
        state.has_active_round = true;
        state.bets = 0;
        Ok(format!("digest-{}", submissions.len()))
    }
}

pub(crate) struct StubProver {
    fail: bool,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<Vec<u8>>>,
}

impl StubProver {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VrfProver for StubProver {
    async fn prove(&self, alpha: &[u8]) -> Result<VrfOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(alpha.to_vec());
        if self.fail {
            return Err(Error::Prover("ecvrf-cli: no such file".to_string()));
        }
        Ok(VrfOutput {
            proof: vec![0xaa, 0xbb],
            output: vec![0x00, 0xff],
        })
    }
}
