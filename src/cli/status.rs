use crate::error::Result;
use crate::rules::RuleSet;
use crate::settings::{load_settings, settings_path};
use crate::state::SyncState;

pub fn run(config: Option<String>, state: Option<String>) -> Result<()> {
    let settings = load_settings()?;
    let rules_path = super::rules_path(&settings, config.as_deref());
    let state_path = super::state_path(&settings, state.as_deref());

    println!("Settings:   {}", settings_path().display());
    println!("API:        {}", settings.base_url);
    println!("Token:      {}", if settings.token.is_empty() { "(not set)" } else { "(set)" });
    println!("Rules:      {}", rules_path.display());
    println!("State:      {}", state_path.display());

    let stored = SyncState::load(&state_path)?;
    println!();
    println!("Cursor:     {}", stored.since.as_deref().unwrap_or("(none)"));
    println!("Rules hash: {}", stored.rules_hash.as_deref().unwrap_or("(none)"));

    if rules_path.exists() {
        let rules = RuleSet::load(&rules_path)?;
        println!("Rule count: {}", rules.len());
        println!("Phase:      {}", stored.phase(rules.hash()));
    } else {
        println!();
        println!("Rules file not found. Create it before running `ledgersync sync`.");
    }
    Ok(())
}
