use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RPC: &str = "https://fullnode.devnet.sui.io:443";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PROVER_CMD: &str = "ecvrf-cli";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub chain: Chain,
    pub vrf: Vrf,
    pub keeper: KeeperOpts,
    #[serde(rename = "httpPort")]
    pub http_port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Chain {
    pub endpoint: String,
    #[serde(rename = "packageId")]
    pub package_id: String,
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "adminSecret")]
    pub admin_secret: String,
    #[serde(rename = "gasBudget")]
    pub gas_budget: u64,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Vrf {
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    /// Program followed by any leading arguments, e.g. `cargo run --bin ecvrf-cli --`.
    pub command: Vec<String>,
    pub workdir: Option<PathBuf>,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct KeeperOpts {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(rename = "retryDelayMs")]
    pub retry_delay_ms: u64,
    #[serde(rename = "idlePollMs")]
    pub idle_poll_ms: u64,
    #[serde(rename = "recoveryMs")]
    pub recovery_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: Chain::default(),
            vrf: Vrf::default(),
            keeper: KeeperOpts::default(),
            http_port: DEFAULT_PORT,
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC.to_string(),
            package_id: String::new(),
            game_id: String::new(),
            admin_secret: String::new(),
            gas_budget: 100_000_000,
            timeout_secs: 30,
        }
    }
}

impl Default for Vrf {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            command: vec![DEFAULT_PROVER_CMD.to_string()],
            workdir: None,
            timeout_secs: 60,
        }
    }
}

impl Default for KeeperOpts {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 1000,
            idle_poll_ms: 1000,
            recovery_ms: 5000,
        }
    }
}

impl KeeperOpts {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn recovery(&self) -> Duration {
        Duration::from_millis(self.recovery_ms)
    }
}

impl Config {
    /// Load the optional JSON file, then let the process environment override it.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(file) => Self::parse_from_file(file)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_from_file(file: &Path) -> Result<Self> {
        let confstr = std::fs::read_to_string(file)
            .map_err(|e| Error::Config(format!("read {}: {}", file.display(), e)))?;
        serde_json::from_str(&confstr)
            .map_err(|e| Error::Config(format!("parse {}: {}", file.display(), e)))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("SUI_RPC") {
            self.chain.endpoint = v;
        }
        if let Some(v) = lookup("SPOT_PKG_ID") {
            self.chain.package_id = v;
        }
        if let Some(v) = lookup("SPOT_GAME_ID") {
            self.chain.game_id = v;
        }
        if let Some(v) = lookup("ADMIN_SECRET_KEY") {
            self.chain.admin_secret = v;
        }
        if let Some(v) = lookup("VRF_SECRET_KEY") {
            self.vrf.secret_key = v;
        }
        if let Some(v) = lookup("VRF_PROVER_CMD") {
            self.vrf.command = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = lookup("VRF_PROVER_DIR") {
            self.vrf.workdir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PORT") {
            self.http_port = parse_num("PORT", &v)?;
        }
        if let Some(v) = lookup("KEEPER_MAX_ATTEMPTS") {
            self.keeper.max_attempts = parse_num("KEEPER_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("KEEPER_RETRY_DELAY_MS") {
            self.keeper.retry_delay_ms = parse_num("KEEPER_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("KEEPER_IDLE_POLL_MS") {
            self.keeper.idle_poll_ms = parse_num("KEEPER_IDLE_POLL_MS", &v)?;
        }
        if let Some(v) = lookup("KEEPER_RECOVERY_MS") {
            self.keeper.recovery_ms = parse_num("KEEPER_RECOVERY_MS", &v)?;
        }
        if let Some(v) = lookup("KEEPER_GAS_BUDGET") {
            self.chain.gas_budget = parse_num("KEEPER_GAS_BUDGET", &v)?;
        }
        if let Some(v) = lookup("KEEPER_RPC_TIMEOUT_SECS") {
            self.chain.timeout_secs = parse_num("KEEPER_RPC_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("VRF_PROVER_TIMEOUT_SECS") {
            self.vrf.timeout_secs = parse_num("VRF_PROVER_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("SPOT_PKG_ID", &self.chain.package_id),
            ("SPOT_GAME_ID", &self.chain.game_id),
            ("ADMIN_SECRET_KEY", &self.chain.admin_secret),
            ("VRF_SECRET_KEY", &self.vrf.secret_key),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| *k)
        .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!("missing {}", missing.join(", "))));
        }
        if self.keeper.max_attempts == 0 {
            return Err(Error::Config("maxAttempts must be at least 1".to_string()));
        }
        if self.vrf.command.is_empty() {
            return Err(Error::Config("vrf prover command is empty".to_string()));
        }
        reqwest::Url::parse(&self.chain.endpoint)
            .map_err(|e| Error::Config(format!("invalid rpc endpoint {}: {}", self.chain.endpoint, e)))?;
        Ok(())
    }

    pub fn show() {
        let de: Self = Default::default();
        match serde_json::to_string_pretty(&de) {
            Ok(s) => println!("{}", s),
            Err(e) => log::error!("failed to render default config: {}", e),
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", key, value)))
}

/// Load variables from `KEEPER_ENV_FILE` or `.env`, if present.
pub fn load_env_file() {
    let env_file = std::env::var("KEEPER_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    if let Err(e) = dotenvy::from_filename(&env_file) {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("failed to load {}: {}", env_file, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SPOT_PKG_ID", "0xpkg"),
            ("SPOT_GAME_ID", "0xgame"),
            ("ADMIN_SECRET_KEY", "AAAA"),
            ("VRF_SECRET_KEY", "beef"),
        ]
    }

    #[test]
    fn test_defaults_apply_for_optional_values() {
        let vars = env(&required());
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.chain.endpoint, DEFAULT_RPC);
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.keeper.max_attempts, 5);
        assert_eq!(config.keeper.recovery(), Duration::from_secs(5));
        assert_eq!(config.vrf.command, vec!["ecvrf-cli".to_string()]);
    }

    #[test]
    fn test_missing_required_values_are_listed() {
        let vars = env(&[("SPOT_PKG_ID", "0xpkg")]);
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SPOT_GAME_ID"));
        assert!(err.contains("ADMIN_SECRET_KEY"));
        assert!(err.contains("VRF_SECRET_KEY"));
        assert!(!err.contains("SPOT_PKG_ID"));
    }

    #[test]
    fn test_env_overrides() {
        let mut pairs = required();
        pairs.extend([
            ("PORT", "9100"),
            ("KEEPER_MAX_ATTEMPTS", "3"),
            ("VRF_PROVER_CMD", "cargo run --bin ecvrf-cli --"),
        ]);
        let vars = env(&pairs);
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.http_port, 9100);
        assert_eq!(config.keeper.max_attempts, 3);
        assert_eq!(config.vrf.command, vec!["cargo", "run", "--bin", "ecvrf-cli", "--"]);
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let vars = env(&[("PORT", "eighty")]);
        let mut config = Config::default();
        let err = config.apply_env(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let vars = env(&required());
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        config.keeper.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() {
        let json = r#"{"chain": {"gameId": "0xgame"}, "keeper": {"maxAttempts": 2}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chain.game_id, "0xgame");
        assert_eq!(config.chain.endpoint, DEFAULT_RPC);
        assert_eq!(config.keeper.max_attempts, 2);
        assert_eq!(config.keeper.retry_delay_ms, 1000);
    }
}
