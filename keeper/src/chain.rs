use crate::config::Config;
use crate::error::{Error, Result};
use crate::signer::{transaction_digest, KeeperKey};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const GAME_MODULE: &str = "spot_game";
pub const TRIGGER_FUNCTION: &str = "trigger_new_round";
pub const CLOCK_OBJECT_ID: &str = "0x6";

/// Snapshot of the game object's round fields.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundState {
    pub round_number: u64,
    /// Only meaningful when `has_active_round` is set.
    pub end_time_ms: u64,
    pub has_active_round: bool,
    pub bets: usize,
}

pub type TxDigest = String;

#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn read_round_state(&self) -> Result<RoundState>;

    async fn submit_trigger(&self, output: &[u8], alpha: &[u8], proof: &[u8]) -> Result<TxDigest>;
}

/// Json-rpc gateway to a Sui fullnode.
#[derive(Debug)]
pub struct SuiGateway {
    client: Client,
    url: Url,
    package_id: String,
    game_id: String,
    gas_budget: u64,
    key: KeeperKey,
    next_id: AtomicU64,
}

impl SuiGateway {
    pub fn setup(config: &Config, key: KeeperKey) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.chain.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("http client: {}", e)))?;
        let url = Url::parse(config.chain.endpoint.as_str())
            .map_err(|e| Error::Config(format!("invalid rpc endpoint: {}", e)))?;

        Ok(Self {
            client,
            url,
            package_id: config.chain.package_id.clone(),
            game_id: config.chain.game_id.clone(),
            gas_budget: config.chain.gas_budget,
            key,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn sender(&self) -> &str {
        self.key.address()
    }

    async fn rpc(&self, method: &str, params: Value) -> std::result::Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc {} id={}", method, id);

        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("{} request failed: {}", method, e))?;
        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(format!("{} http {} {}", method, status, t));
        }
        let mut reply: Value = resp
            .json()
            .await
            .map_err(|e| format!("{} bad json: {}", method, e))?;

        if let Some(err) = reply.get("error").filter(|e| !e.is_null()) {
            return Err(format!("{} rpc error: {}", method, err));
        }
        match reply.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(format!("{} reply has no result", method)),
        }
    }
}

#[async_trait]
impl ChainGateway for SuiGateway {
    async fn read_round_state(&self) -> Result<RoundState> {
        let object = self
            .rpc(
                "sui_getObject",
                json!([self.game_id, {"showContent": true, "showOwner": true}]),
            )
            .await
            .map_err(Error::Read)?;
        parse_round_state(&object)
    }

    async fn submit_trigger(&self, output: &[u8], alpha: &[u8], proof: &[u8]) -> Result<TxDigest> {
        let built = self
            .rpc(
                "unsafe_moveCall",
                json!([
                    self.sender(),
                    self.package_id,
                    GAME_MODULE,
                    TRIGGER_FUNCTION,
                    [],
                    trigger_arguments(&self.game_id, output, alpha, proof),
                    null,
                    self.gas_budget.to_string(),
                ]),
            )
            .await
            .map_err(Error::Submit)?;
        let tx_bytes = built
            .get("txBytes")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Submit("unsafe_moveCall returned no txBytes".to_string()))?;
        let raw = base64_decode(tx_bytes)?;
        let signature = self.key.sign_transaction(&raw);
        let local_digest = transaction_digest(&raw);
        debug!("signed trigger tx {}", local_digest);

        let executed = self
            .rpc(
                "sui_executeTransactionBlock",
                json!([
                    tx_bytes,
                    [signature],
                    {"showEffects": true},
                    "WaitForLocalExecution",
                ]),
            )
            .await
            .map_err(|e| {
                // the node may still have the transaction
                warn!("execution of tx {} not confirmed: {}", local_digest, e);
                Error::Submit(format!("tx {}: {}", local_digest, e))
            })?;

        let digest = check_execution(&executed)?;
        info!("trigger tx executed: {}", digest);
        Ok(digest)
    }
}

/// Move call arguments in the order `trigger_new_round` takes them.
pub fn trigger_arguments(game_id: &str, output: &[u8], alpha: &[u8], proof: &[u8]) -> Value {
    json!([game_id, output, alpha, proof, CLOCK_OBJECT_ID])
}

fn base64_decode(s: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| Error::Submit(format!("txBytes is not base64: {}", e)))
}

fn check_execution(executed: &Value) -> Result<TxDigest> {
    let digest = executed
        .get("digest")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Submit("execution result has no digest".to_string()))?
        .to_string();
    let status = &executed["effects"]["status"];
    match status.get("status").and_then(Value::as_str) {
        Some("success") => Ok(digest),
        Some(_) => Err(Error::Rejected {
            digest,
            reason: status
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown failure")
                .to_string(),
        }),
        // effects not reported; the node accepted the transaction
        None => Ok(digest),
    }
}

fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Extract the round fields from a `sui_getObject` result.
pub fn parse_round_state(object: &Value) -> Result<RoundState> {
    if let Some(err) = object.get("error") {
        return Err(Error::Read(format!("game object unavailable: {}", err)));
    }
    let fields = object
        .pointer("/data/content/fields")
        .ok_or_else(|| Error::Read("game object has no content fields".to_string()))?;

    let round_number = match fields.get("round_number") {
        None | Some(Value::Null) => 0,
        Some(v) => as_u64(v).ok_or_else(|| Error::Read(format!("bad round_number: {}", v)))?,
    };

    let round = match fields.get("current_round") {
        None | Some(Value::Null) => None,
        // Option<Round> rendered as a vector
        Some(v) if v.pointer("/fields/vec").is_some() => v.pointer("/fields/vec/0"),
        Some(v) => Some(v),
    };
    let round = match round {
        Some(round) => round,
        None => {
            return Ok(RoundState {
                round_number,
                ..Default::default()
            })
        }
    };

    let round_fields = round
        .get("fields")
        .ok_or_else(|| Error::Read("current_round has no fields".to_string()))?;
    let end_time_ms = round_fields
        .get("end_time_ms")
        .and_then(as_u64)
        .ok_or_else(|| Error::Read("current_round has no valid end_time_ms".to_string()))?;
    let bets = round_fields
        .get("bets")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or_default();

    Ok(RoundState {
        round_number,
        end_time_ms,
        has_active_round: true,
        bets,
    })
}
