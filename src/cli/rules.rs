use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::rules::{Rule, RuleSet};
use crate::settings::load_settings;

pub fn list(config: Option<String>) -> Result<()> {
    let settings = load_settings()?;
    let path = super::rules_path(&settings, config.as_deref());
    let rules = RuleSet::load(&path)?;
    println!("Rules ({})\n{}", path.display(), rules_table(&rules));
    println!("Hash: {}", rules.hash());
    Ok(())
}

fn rules_table(rules: &RuleSet) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Kind", "Pattern", "Type", "Account", "Amount", "Sets"]);
    for (i, rule) in rules.rules().iter().enumerate() {
        let matcher = rule.matcher();
        let kind = match rule {
            Rule::Entry(_) => "entry",
            Rule::Transfer(_) => "transfer",
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(kind),
            Cell::new(matcher.pattern()),
            Cell::new(matcher.kind().map(|k| k.as_str()).unwrap_or("")),
            Cell::new(matcher.account().unwrap_or("")),
            Cell::new(matcher.amount().map(|a| a.to_string()).unwrap_or_default()),
            Cell::new(rule.action_summary()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_rules_in_order() {
        let rules = RuleSet::parse(
            r#"
- match: {pattern: "^acme", type: income, amount: ">= 1000"}
  category: Salary
- {match: transfer to savings, transfer: Savings}
"#,
        )
        .unwrap();
        let rendered = rules_table(&rules).to_string();
        let salary = rendered.find("category = Salary").unwrap();
        let savings = rendered.find("transfer = Savings").unwrap();
        assert!(salary < savings);
        assert!(rendered.contains(">= 1000"));
    }
}
