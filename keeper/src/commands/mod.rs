use clap::{Parser, Subcommand};
use keeper::{chain::RoundState, config::Config, Keeper};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Optional JSON config file; environment variables override it
    #[arg(short = 'c', long = "config", global = true)]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the keeper loop and the manual trigger endpoint
    Run,
    /// Trigger a new round once and print the transaction digest
    Trigger,
    /// Print the current round state
    Round,
    /// Print the default configuration as JSON
    ShowConfig,
}

impl Cli {
    pub(crate) async fn execute(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Commands::Run) {
            Commands::ShowConfig => Config::show(),
            Commands::Run => setup(self.config.as_deref())?.run().await?,
            Commands::Trigger => {
                let keeper = setup(self.config.as_deref())?;
                let digest = keeper.executor.trigger_round().await?;
                println!("{}", digest);
            }
            Commands::Round => {
                let keeper = setup(self.config.as_deref())?;
                let state = keeper.executor.chain().read_round_state().await?;
                println!("{}", render_round(&state, keeper.executor.now_ms()));
            }
        }
        Ok(())
    }
}

fn setup(config: Option<&Path>) -> anyhow::Result<Keeper> {
    let config = Config::load(config)?;
    Ok(Keeper::setup(config)?)
}

fn render_round(state: &RoundState, now_ms: u64) -> String {
    if !state.has_active_round {
        return format!("round {}: no active round", state.round_number);
    }
    let left = state.end_time_ms.saturating_sub(now_ms) / 1000;
    format!(
        "round {}: {} bets, ends at {} ({}s left)",
        state.round_number, state.bets, state.end_time_ms, left
    )
}
