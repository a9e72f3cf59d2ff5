use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use colored::Colorize;

use crate::catalog::Context;
use crate::client::{Ledger, Query};
use crate::diff::Diff;
use crate::error::Result;
use crate::fmt::{amount, truncate};
use crate::models::Entry;
use crate::rules::RuleSet;
use crate::state::SyncState;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub per_page: u32,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub fetched: usize,
    pub matched: usize,
    pub changed: usize,
    pub applied: usize,
    pub state: SyncState,
    pub persisted: bool,
}

/// Entries that matched a rule and still need changing, in fetch order.
pub struct Plan {
    pub matched: usize,
    pub changes: Vec<(Entry, Diff)>,
}

/// First matching rule per entry; entries that already comply are dropped.
pub fn plan(rules: &RuleSet, entries: Vec<Entry>, ctx: &Context) -> Result<Plan> {
    let mut matched = 0usize;
    let mut changes = Vec::new();
    for entry in entries {
        let Some(rule) = rules.first_match(&entry, ctx)? else {
            continue;
        };
        matched += 1;
        let diff = rule.diff(&entry, ctx)?;
        if !diff.is_empty() {
            changes.push((entry, diff));
        }
    }
    Ok(Plan { matched, changes })
}

/// One sync pass. Updates go out one entry at a time; the first failure
/// aborts the pass and leaves the stored cursor where it was.
pub fn run<L: Ledger, W: Write>(
    ledger: &mut L,
    rules: &RuleSet,
    state_path: &Path,
    options: &SyncOptions,
    out: &mut W,
) -> Result<SyncReport> {
    let mut state = SyncState::load(state_path)?.resolve(rules.hash());

    let query = Query {
        per_page: options.per_page,
        from: Some(options.from),
        to: Some(options.to),
        since: state.since.clone(),
    };
    let (entries, watermark) = ledger.entries(&query)?;
    tracing::info!(count = entries.len(), since = ?query.since, "fetched entries");

    let mut report = SyncReport {
        fetched: entries.len(),
        matched: 0,
        changed: 0,
        applied: 0,
        state: state.clone(),
        persisted: false,
    };
    if entries.is_empty() {
        writeln!(out, "Nothing to sync.")?;
        return Ok(report);
    }

    let ctx = ledger.context(options.per_page)?;
    let Plan { matched, changes } = plan(rules, entries, &ctx)?;
    report.matched = matched;
    report.changed = changes.len();

    if changes.is_empty() {
        writeln!(out, "No changes.")?;
    }
    for (mut entry, diff) in changes {
        print_change(out, &entry, &diff)?;
        if options.dry_run {
            continue;
        }
        diff.apply(&mut entry);
        ledger.update_entry(&entry)?;
        report.applied += 1;
        tracing::info!(id = %entry.id, fields = diff.len(), "entry updated");
    }

    if !options.dry_run {
        state.advance(watermark);
        state.save(state_path)?;
        report.persisted = true;
    }
    report.state = state;
    Ok(report)
}

fn print_change<W: Write>(out: &mut W, entry: &Entry, diff: &Diff) -> Result<()> {
    writeln!(
        out,
        "{}  {:>16}  {}",
        entry.date,
        amount(entry.amount, &entry.currency.code),
        truncate(&entry.description(), 60).bold()
    )?;
    for (field, change) in diff.iter() {
        writeln!(
            out,
            "    {field}: {} \u{2192} {}",
            change.old.to_string().red(),
            change.new.to_string().green()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Fetched, Resource};
    use crate::error::SyncError;
    use serde_json::{json, Value};

    const WATERMARK: &str = "2025-03-05 12:00:00.000";

    #[derive(Default)]
    struct FakeLedger {
        entries: Vec<Value>,
        watermark: Option<String>,
        fail_update_at: Option<usize>,
        queries: Vec<(Resource, Query)>,
        updates: Vec<(String, Value)>,
    }

    impl FakeLedger {
        fn with_entries(entries: Vec<Value>) -> Self {
            Self {
                entries,
                watermark: Some(WATERMARK.into()),
                ..Default::default()
            }
        }

        fn entry_queries(&self) -> Vec<&Query> {
            self.queries
                .iter()
                .filter(|(r, _)| *r == Resource::Entries)
                .map(|(_, q)| q)
                .collect()
        }
    }

    impl Ledger for FakeLedger {
        fn fetch_all(&mut self, resource: Resource, query: &Query) -> Result<Fetched> {
            self.queries.push((resource, query.clone()));
            let records = match resource {
                Resource::Entries => self.entries.clone(),
                Resource::Accounts => vec![
                    json!({"id": "a1", "name": "Checking"}),
                    json!({"id": "a2", "name": "Savings"}),
                ],
                Resource::Categories => vec![
                    json!({"id": "7", "name": "Dining", "type": "expense"}),
                    json!({"id": "9", "name": "Salary", "type": "income"}),
                ],
                Resource::Tags => vec![json!({"id": "1", "name": "coffee", "type": "expense"})],
            };
            let watermark = match resource {
                Resource::Entries => self.watermark.clone(),
                _ => None,
            };
            Ok(Fetched { records, watermark })
        }

        fn replace(&mut self, resource: Resource, id: &str, record: &Value) -> Result<Value> {
            if self.fail_update_at == Some(self.updates.len()) {
                return Err(SyncError::Transport {
                    resource: resource.as_str().into(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.updates.push((id.to_string(), record.clone()));
            Ok(record.clone())
        }
    }

    fn raw(id: &str, desc: &str, amount: f64) -> Value {
        json!({
            "id": id,
            "desc": desc,
            "amount": amount,
            "currency": {"code": "EUR"},
            "date": "2025-03-01",
            "account": "a1",
            "category": null,
            "tags": [],
            "modified": "2025-03-01 10:00:00.000"
        })
    }

    fn options(dry_run: bool) -> SyncOptions {
        SyncOptions {
            from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            per_page: 100,
            dry_run,
        }
    }

    fn coffee_rules() -> RuleSet {
        RuleSet::parse("- {match: coffee, category: Dining}\n").unwrap()
    }

    #[test]
    fn test_applies_changes_and_advances_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let rules = coffee_rules();
        let mut ledger = FakeLedger::with_entries(vec![raw("e1", "Coffee shop", -4.50)]);
        let mut out = Vec::new();

        let report = run(&mut ledger, &rules, &state_path, &options(false), &mut out).unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(ledger.updates.len(), 1);
        let (id, record) = &ledger.updates[0];
        assert_eq!(id, "e1");
        assert_eq!(record["category"], "7");
        assert_eq!(record["modified"], "2025-03-01 10:00:00.000");

        let stored = SyncState::load(&state_path).unwrap();
        assert_eq!(stored.since.as_deref(), Some(WATERMARK));
        assert_eq!(stored.rules_hash.as_deref(), Some(rules.hash()));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("category: "));
        assert!(text.contains("Dining"));

        // The next pass starts from the stored cursor.
        let mut out = Vec::new();
        run(&mut ledger, &rules, &state_path, &options(false), &mut out).unwrap();
        let queries = ledger.entry_queries();
        assert_eq!(queries[0].since, None);
        assert_eq!(queries[1].since.as_deref(), Some(WATERMARK));
    }

    #[test]
    fn test_dry_run_never_updates_or_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut ledger = FakeLedger::with_entries(vec![raw("e1", "Coffee shop", -4.50)]);
        let mut out = Vec::new();

        let report = run(&mut ledger, &coffee_rules(), &state_path, &options(true), &mut out).unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.applied, 0);
        assert!(!report.persisted);
        assert!(ledger.updates.is_empty());
        assert!(!state_path.exists());
        assert!(String::from_utf8(out).unwrap().contains("Coffee shop"));
    }

    #[test]
    fn test_unmatched_entries_produce_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut ledger = FakeLedger::with_entries(vec![raw("e1", "Bookstore", -12.0)]);
        let mut out = Vec::new();

        let report = run(&mut ledger, &coffee_rules(), &state_path, &options(false), &mut out).unwrap();

        assert_eq!(report.matched, 0);
        assert!(ledger.updates.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("No changes."));
        assert!(report.persisted);
        assert_eq!(SyncState::load(&state_path).unwrap().since.as_deref(), Some(WATERMARK));
    }

    #[test]
    fn test_compliant_entry_is_matched_but_not_changed() {
        let mut compliant = raw("e1", "Coffee shop", -4.50);
        compliant["category"] = json!("7");
        let ctx = FakeLedger::default().context(10).unwrap();
        let entries = vec![serde_json::from_value(compliant).unwrap()];

        let planned = plan(&coffee_rules(), entries, &ctx).unwrap();
        assert_eq!(planned.matched, 1);
        assert!(planned.changes.is_empty());
    }

    #[test]
    fn test_first_matching_rule_decides() {
        let rules = RuleSet::parse(
            r#"
- {match: tea, category: Salary}
- {match: coffee, category: Dining}
- {match: shop, tags: [coffee]}
"#,
        )
        .unwrap();
        let ctx = FakeLedger::default().context(10).unwrap();
        let entries = vec![serde_json::from_value(raw("e1", "Coffee shop", -4.5)).unwrap()];

        let planned = plan(&rules, entries, &ctx).unwrap();
        let (_, diff) = &planned.changes[0];
        assert!(diff.get(crate::diff::Field::Category).is_some());
        assert!(diff.get(crate::diff::Field::Tags).is_none());
    }

    #[test]
    fn test_empty_fetch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut ledger = FakeLedger::with_entries(Vec::new());
        let mut out = Vec::new();

        let report = run(&mut ledger, &coffee_rules(), &state_path, &options(false), &mut out).unwrap();

        assert_eq!(report.fetched, 0);
        assert!(!report.persisted);
        assert_eq!(ledger.queries.len(), 1);
        assert!(!state_path.exists());
    }

    #[test]
    fn test_rules_change_forces_full_resync() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        SyncState {
            since: Some("X".into()),
            rules_hash: Some("A".into()),
        }
        .save(&state_path)
        .unwrap();
        let rules = coffee_rules();
        let mut ledger = FakeLedger::with_entries(vec![raw("e1", "Bookstore", -1.0)]);
        let mut out = Vec::new();

        run(&mut ledger, &rules, &state_path, &options(true), &mut out).unwrap();

        assert_eq!(ledger.entry_queries()[0].since, None);
        // dry run: the stale state stays on disk untouched
        assert_eq!(SyncState::load(&state_path).unwrap().rules_hash.as_deref(), Some("A"));
    }

    #[test]
    fn test_failed_update_stops_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut ledger = FakeLedger::with_entries(vec![
            raw("e1", "Coffee one", -1.0),
            raw("e2", "Coffee two", -2.0),
            raw("e3", "Coffee three", -3.0),
        ]);
        ledger.fail_update_at = Some(1);
        let mut out = Vec::new();

        let err = run(&mut ledger, &coffee_rules(), &state_path, &options(false), &mut out).unwrap_err();

        assert!(matches!(err, SyncError::Transport { status: 500, .. }));
        assert_eq!(ledger.updates.len(), 1);
        assert!(!state_path.exists());
    }

    #[test]
    fn test_unknown_reference_aborts_before_updates() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let rules = RuleSet::parse("- {match: coffee, category: Dinning}\n").unwrap();
        let mut ledger = FakeLedger::with_entries(vec![raw("e1", "Coffee shop", -4.5)]);
        let mut out = Vec::new();

        let err = run(&mut ledger, &rules, &state_path, &options(false), &mut out).unwrap_err();

        assert!(matches!(err, SyncError::UnknownReference { ref name, .. } if name == "Dinning"));
        assert!(ledger.updates.is_empty());
    }
}
