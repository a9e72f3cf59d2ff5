pub mod rules;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};

use crate::error::{Result, SyncError};
use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(name = "ledgersync", about = "Keep a remote ledger in line with a declarative rule set.")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch entries, apply the first matching rule to each, and push the changes.
    Sync {
        /// Rules file (default: ~/.config/ledgersync/rules.yaml)
        #[arg(long)]
        config: Option<String>,
        /// Sync state file (default: ~/.config/ledgersync/state.json)
        #[arg(long)]
        state: Option<String>,
        /// Print the changes without sending them
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<NaiveDate>,
    },
    /// Compile the rules file and list the rules in match order.
    Rules {
        /// Rules file (default: ~/.config/ledgersync/rules.yaml)
        #[arg(long)]
        config: Option<String>,
    },
    /// Show the stored sync cursor and whether it is still valid for the rules.
    Status {
        /// Rules file (default: ~/.config/ledgersync/rules.yaml)
        #[arg(long)]
        config: Option<String>,
        /// Sync state file (default: ~/.config/ledgersync/state.json)
        #[arg(long)]
        state: Option<String>,
    },
}

pub(crate) fn rules_path(settings: &Settings, flag: Option<&str>) -> PathBuf {
    shellexpand_path(flag.unwrap_or(&settings.rules_path))
}

pub(crate) fn state_path(settings: &Settings, flag: Option<&str>) -> PathBuf {
    shellexpand_path(flag.unwrap_or(&settings.state_path))
}

/// Fills in missing bounds: `to` defaults to `today`, `from` to `lookback_days` before `to`.
pub(crate) fn date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    lookback_days: u32,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .ok_or_else(|| {
                SyncError::Settings(format!("lookback_days {lookback_days} reaches before any valid date"))
            })?,
    };
    if from > to {
        return Err(SyncError::Configuration(format!(
            "start date {from} is after end date {to}"
        )));
    }
    Ok((from, to))
}
