use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::decode_hex;
use async_trait::async_trait;
use log::{debug, error};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfOutput {
    pub proof: Vec<u8>,
    /// The pseudorandom value the game draws numbers from.
    pub output: Vec<u8>,
}

#[async_trait]
pub trait VrfProver: Send + Sync {
    async fn prove(&self, alpha: &[u8]) -> Result<VrfOutput>;
}

/// Runs an `ecvrf-cli` compatible binary:
/// `<command...> prove --input <hex alpha> --secret-key <key>`.
#[derive(Debug, Clone)]
pub struct CommandProver {
    program: String,
    prefix_args: Vec<String>,
    workdir: Option<PathBuf>,
    secret_key: String,
    timeout: Duration,
}

impl CommandProver {
    pub fn new(command: &[String], secret_key: impl Into<String>) -> Result<Self> {
        let (program, prefix_args) = command
            .split_first()
            .ok_or_else(|| Error::Config("vrf prover command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            prefix_args: prefix_args.to_vec(),
            workdir: None,
            secret_key: secret_key.into(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn setup(config: &Config) -> Result<Self> {
        let mut prover = Self::new(&config.vrf.command, config.vrf.secret_key.clone())?
            .with_timeout(Duration::from_secs(config.vrf.timeout_secs));
        prover.workdir = config.vrf.workdir.clone();
        Ok(prover)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl VrfProver for CommandProver {
    async fn prove(&self, alpha: &[u8]) -> Result<VrfOutput> {
        let input = hex::encode(alpha);
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(["prove", "--input", input.as_str(), "--secret-key", self.secret_key.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        debug!("running vrf prover {} for input {}", self.program, input);

        let out = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Prover(format!("{} timed out after {:?}", self.program, self.timeout)))?
            .map_err(|e| Error::Prover(format!("failed to run {}: {}", self.program, e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            error!("vrf prover exited with {}: {}", out.status, stderr.trim());
            return Err(Error::Prover(format!("{} exited with {}: {}", self.program, out.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_prover_output(&stdout)
    }
}

/// Parse the prover's stdout. Exactly one `Proof:` and one `Output:` line,
/// each carrying a non-empty hex value.
pub fn parse_prover_output(stdout: &str) -> Result<VrfOutput> {
    let proof = single_field(stdout, "Proof:")?;
    let output = single_field(stdout, "Output:")?;
    Ok(VrfOutput { proof, output })
}

fn single_field(stdout: &str, prefix: &str) -> Result<Vec<u8>> {
    let mut values = stdout
        .lines()
        .map(str::trim)
        .filter_map(|l| l.strip_prefix(prefix));
    let value = values
        .next()
        .ok_or_else(|| Error::Prover(format!("no `{}` line in prover output: {:?}", prefix, stdout)))?
        .trim();
    if values.next().is_some() {
        return Err(Error::Prover(format!("more than one `{}` line in prover output", prefix)));
    }
    if value.is_empty() {
        return Err(Error::Prover(format!("empty `{}` value", prefix)));
    }
    decode_hex(value).map_err(|e| Error::Prover(format!("`{}` value is not hex: {}", prefix, e)))
}
