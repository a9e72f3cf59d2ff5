mod catalog;
mod cli;
mod client;
mod diff;
mod error;
mod fmt;
mod matcher;
mod models;
mod rules;
mod settings;
mod state;
mod sync;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "ledgersync=debug" } else { "ledgersync=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sync {
            config,
            state,
            dry_run,
            from_date,
            to_date,
        } => cli::sync::run(config, state, dry_run, from_date, to_date),
        Commands::Rules { config } => cli::rules::list(config),
        Commands::Status { config, state } => cli::status::run(config, state),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
