use chrono::{Local, NaiveDate};

use crate::client::HttpLedger;
use crate::error::Result;
use crate::rules::RuleSet;
use crate::settings::load_settings;
use crate::sync::{self, SyncOptions};

pub fn run(
    config: Option<String>,
    state: Option<String>,
    dry_run: bool,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
) -> Result<()> {
    let settings = load_settings()?;
    let rules = RuleSet::load(&super::rules_path(&settings, config.as_deref()))?;
    let state_path = super::state_path(&settings, state.as_deref());
    if rules.is_empty() {
        tracing::warn!("rules file has no rules, entries will only be fetched");
    }

    let (from, to) = super::date_range(
        from_date,
        to_date,
        settings.lookback_days,
        Local::now().date_naive(),
    )?;

    let mut ledger = HttpLedger::new(&settings.base_url, settings.require_token()?)?;
    let options = SyncOptions {
        from,
        to,
        per_page: settings.per_page,
        dry_run,
    };
    let stdout = std::io::stdout();
    let report = sync::run(&mut ledger, &rules, &state_path, &options, &mut stdout.lock())?;

    if report.fetched == 0 {
        return Ok(());
    }
    if dry_run {
        println!(
            "{} fetched, {} matched, {} would change (dry run)",
            report.fetched, report.matched, report.changed
        );
    } else {
        println!(
            "{} fetched, {} matched, {} updated",
            report.fetched, report.matched, report.applied
        );
    }
    if report.persisted {
        println!("Cursor: {}", report.state.since.as_deref().unwrap_or("(none)"));
    }
    Ok(())
}
