mod commands;

use clap::Parser;
use commands::Cli;
use log::error;

#[actix_web::main]
async fn main() {
    keeper::config::load_env_file();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = cli.execute().await {
        error!("fatal: {:#}", e);
        std::process::exit(1);
    }
}
