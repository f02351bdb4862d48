pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod prover;
pub mod retry;
pub mod scheduler;
pub mod signer;
pub mod trigger;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use crate::{
    chain::{ChainGateway, SuiGateway},
    config::Config,
    error::Result,
    prover::{CommandProver, VrfProver},
    scheduler::RoundScheduler,
    signer::KeeperKey,
    trigger::TriggerExecutor,
};
use log::info;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the keeper needs, wired from one config.
pub struct Keeper {
    pub config: Config,
    pub executor: Arc<TriggerExecutor>,
}

impl Keeper {
    /// Fails only on bad configuration or an undecodable signing credential.
    pub fn setup(config: Config) -> Result<Self> {
        let key = KeeperKey::from_secret(&config.chain.admin_secret)?;
        info!(
            "keeper {} on {}, package {}, game {}",
            key.address(),
            config.chain.endpoint,
            config.chain.package_id,
            config.chain.game_id
        );
        let chain: Arc<dyn ChainGateway> = Arc::new(SuiGateway::setup(&config, key)?);
        let prover: Arc<dyn VrfProver> = Arc::new(CommandProver::setup(&config)?);
        Ok(Self::with_parts(config, chain, prover))
    }

    pub fn with_parts(config: Config, chain: Arc<dyn ChainGateway>, prover: Arc<dyn VrfProver>) -> Self {
        Self {
            config,
            executor: Arc::new(TriggerExecutor::new(chain, prover)),
        }
    }

    pub fn scheduler(&self, shutdown: watch::Receiver<bool>) -> RoundScheduler {
        RoundScheduler::new(self.executor.clone(), &self.config.keeper, shutdown)
    }

    /// Run the keeper loop and the http gateway until the server stops.
    pub async fn run(self) -> std::io::Result<()> {
        let (shutdown, rx) = watch::channel(false);
        let scheduler = tokio::spawn(self.scheduler(rx).run());

        let served = api::serve(self.executor.clone(), self.config.http_port).await;

        let _ = shutdown.send(true);
        let _ = scheduler.await;
        served
    }
}
