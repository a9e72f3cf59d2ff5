//! Read-only name ⇄ identifier lookups built once per run from full
//! catalog fetches.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Result, SyncError};
use crate::models::{Account, Category, EntryKind, Tag};

#[derive(Debug, Clone)]
pub struct Catalog<K> {
    label: &'static str,
    by_key: HashMap<K, String>,
    names: HashMap<String, String>,
}

impl<K: Hash + Eq + std::fmt::Debug> Catalog<K> {
    fn build(label: &'static str, records: impl IntoIterator<Item = (K, String, String)>) -> Self {
        let mut by_key = HashMap::new();
        let mut names = HashMap::new();
        for (key, id, name) in records {
            if let Some(existing) = by_key.get(&key) {
                tracing::warn!(catalog = label, ?key, kept = %existing, ignored = %id, "duplicate name in catalog");
                continue;
            }
            names.insert(id.clone(), name);
            by_key.insert(key, id);
        }
        Self { label, by_key, names }
    }

    /// Display name for an identifier, if the catalog knows it.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}

pub type Accounts = Catalog<String>;
pub type Categories = Catalog<(String, EntryKind)>;
pub type Tags = Catalog<(String, EntryKind)>;

impl Catalog<String> {
    pub fn accounts(records: Vec<Account>) -> Self {
        Self::build(
            "account",
            records
                .into_iter()
                .filter(|a| !a.deleted)
                .map(|a| (a.name.clone(), a.id, a.name)),
        )
    }

    pub fn resolve(&self, name: &str) -> Result<&str> {
        self.by_key
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| SyncError::unknown(self.label, name))
    }
}

impl Catalog<(String, EntryKind)> {
    pub fn categories(records: Vec<Category>) -> Self {
        Self::build(
            "category",
            records
                .into_iter()
                .filter(|c| !c.deleted)
                .map(|c| ((c.name.clone(), c.kind), c.id, c.name)),
        )
    }

    pub fn tags(records: Vec<Tag>) -> Self {
        Self::build(
            "tag",
            records
                .into_iter()
                .filter(|t| !t.deleted)
                .map(|t| ((t.name.clone(), t.kind), t.id, t.name)),
        )
    }

    pub fn resolve(&self, name: &str, kind: EntryKind) -> Result<&str> {
        self.by_key
            .get(&(name.to_string(), kind))
            .map(String::as_str)
            .ok_or_else(|| SyncError::unknown(format!("{kind} {}", self.label), name))
    }
}

/// Everything a matcher or diff needs to look up. Never mutated during a run.
#[derive(Debug, Clone)]
pub struct Context {
    pub accounts: Accounts,
    pub categories: Categories,
    pub tags: Tags,
}

impl Context {
    pub fn new(accounts: Vec<Account>, categories: Vec<Category>, tags: Vec<Tag>) -> Self {
        Self {
            accounts: Accounts::accounts(accounts),
            categories: Categories::categories(categories),
            tags: Tags::tags(tags),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn account(id: &str, name: &str) -> Account {
        Account {
            id: id.into(),
            name: name.into(),
            deleted: false,
        }
    }

    pub(crate) fn category(id: &str, name: &str, kind: EntryKind) -> Category {
        Category {
            id: id.into(),
            name: name.into(),
            kind,
            deleted: false,
        }
    }

    pub(crate) fn tag(id: &str, name: &str, kind: EntryKind) -> Tag {
        Tag {
            id: id.into(),
            name: name.into(),
            kind,
            deleted: false,
        }
    }

    /// Shared fixture for the matcher, diff and sync tests.
    pub(crate) fn sample_context() -> Context {
        Context::new(
            vec![account("a1", "Checking"), account("a2", "Savings"), account("a3", "Cash")],
            vec![
                category("7", "Dining", EntryKind::Expense),
                category("8", "Groceries", EntryKind::Expense),
                category("9", "Salary", EntryKind::Income),
                category("10", "Dining", EntryKind::Income),
            ],
            vec![
                tag("1", "coffee", EntryKind::Expense),
                tag("3", "work", EntryKind::Expense),
                tag("4", "work", EntryKind::Income),
            ],
        )
    }

    #[test]
    fn test_same_name_resolves_per_kind() {
        let ctx = sample_context();
        assert_eq!(ctx.categories.resolve("Dining", EntryKind::Expense).unwrap(), "7");
        assert_eq!(ctx.categories.resolve("Dining", EntryKind::Income).unwrap(), "10");
        assert_eq!(ctx.tags.resolve("work", EntryKind::Income).unwrap(), "4");
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let ctx = sample_context();
        let err = ctx.categories.resolve("Salary", EntryKind::Expense).unwrap_err();
        assert_eq!(err.to_string(), "Unknown expense category: Salary");
        let err = ctx.accounts.resolve("Brokerage").unwrap_err();
        assert!(matches!(err, SyncError::UnknownReference { ref name, .. } if name == "Brokerage"));
    }

    #[test]
    fn test_reverse_lookup() {
        let ctx = sample_context();
        assert_eq!(ctx.accounts.name_of("a2"), Some("Savings"));
        assert_eq!(ctx.tags.name_of("99"), None);
    }

    #[test]
    fn test_deleted_and_duplicate_records_are_skipped() {
        let mut gone = account("a9", "Old");
        gone.deleted = true;
        let accounts = Accounts::accounts(vec![account("a1", "Main"), account("a2", "Main"), gone]);
        assert_eq!(accounts.resolve("Main").unwrap(), "a1");
        assert!(accounts.resolve("Old").is_err());
        assert_eq!(accounts.len(), 1);
    }
}
