//! Field-level differences between an entry and the rule it matched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::catalog::Context;
use crate::error::Result;
use crate::models::{Currency, Entry};
use crate::rules::{EntryRule, Rule, TransferRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Description,
    Category,
    Tags,
    Account,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Description => "description",
            Self::Category => "category",
            Self::Tags => "tags",
            Self::Account => "account",
        })
    }
}

/// One side of a change: the display value plus the identifier(s) behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(Option<String>),
    Ref {
        id: Option<String>,
        value: Option<String>,
    },
    Refs {
        ids: Vec<String>,
        values: Vec<String>,
    },
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(Some(text)) => write!(f, "{text:?}"),
            Self::Text(None) | Self::Ref { id: None, value: None } => f.write_str("(none)"),
            Self::Ref { value: Some(value), .. } => f.write_str(value),
            Self::Ref { id: Some(id), .. } => write!(f, "#{id}"),
            Self::Refs { values, .. } => write!(f, "[{}]", values.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Empty means the entry already complies and nothing is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diff {
    changes: BTreeMap<Field, Change>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    fn single(field: Field, change: Change) -> Self {
        let mut diff = Self::new();
        diff.changes.insert(field, change);
        diff
    }

    /// Keys already present are kept.
    pub fn merge(mut self, other: Diff) -> Self {
        for (field, change) in other.changes {
            self.changes.entry(field).or_insert(change);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: Field) -> Option<&Change> {
        self.changes.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Change)> {
        self.changes.iter()
    }

    /// Overwrite the entry in place with the new side of every change.
    pub fn apply(&self, entry: &mut Entry) {
        for (field, change) in &self.changes {
            match (field, &change.new) {
                (Field::Description, FieldValue::Text(text)) => entry.desc = text.clone(),
                (Field::Category, FieldValue::Ref { id, .. }) => entry.category = id.clone(),
                (Field::Tags, FieldValue::Refs { ids, .. }) => entry.tags = ids.clone(),
                (Field::Account, FieldValue::Ref { id, .. }) => {
                    let code = entry.currency.code.clone();
                    let linked = entry.transaction.get_or_insert_with(Default::default);
                    linked.account = id.clone();
                    if linked.currency.is_none() {
                        linked.currency = Some(Currency::new(&code));
                    }
                    // transfers carry neither category nor tags
                    entry.category = None;
                    entry.tags.clear();
                }
                (field, value) => {
                    tracing::warn!(%field, ?value, "ignoring change with mismatched value shape")
                }
            }
        }
    }
}

impl Rule {
    pub fn diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        match self {
            Self::Entry(rule) => rule.diff(entry, ctx),
            Self::Transfer(rule) => rule.diff(entry, ctx),
        }
    }
}

impl EntryRule {
    pub fn diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        Ok(description_diff(self.description.as_deref(), entry)
            .merge(self.category_diff(entry, ctx)?)
            .merge(self.tags_diff(entry, ctx)?))
    }

    fn category_diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        let Some(name) = &self.category else {
            return Ok(Diff::new());
        };
        let id = ctx.categories.resolve(name, entry.kind())?;
        if entry.category.as_deref() == Some(id) {
            return Ok(Diff::new());
        }
        let old = FieldValue::Ref {
            id: entry.category.clone(),
            value: entry
                .category
                .as_deref()
                .and_then(|current| ctx.categories.name_of(current))
                .map(str::to_string),
        };
        let new = FieldValue::Ref {
            id: Some(id.to_string()),
            value: Some(name.clone()),
        };
        Ok(Diff::single(Field::Category, Change { old, new }))
    }

    fn tags_diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        let Some(names) = &self.tags else {
            return Ok(Diff::new());
        };
        let kind = entry.kind();
        let ids = names
            .iter()
            .map(|name| ctx.tags.resolve(name, kind).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        if wanted == entry.tag_set() {
            return Ok(Diff::new());
        }
        let old = FieldValue::Refs {
            ids: entry.tags.clone(),
            values: entry
                .tags
                .iter()
                .map(|id| ctx.tags.name_of(id).unwrap_or(id).to_string())
                .collect(),
        };
        let new = FieldValue::Refs {
            ids,
            values: names.clone(),
        };
        Ok(Diff::single(Field::Tags, Change { old, new }))
    }
}

impl TransferRule {
    pub fn diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        Ok(description_diff(self.description.as_deref(), entry).merge(self.account_diff(entry, ctx)?))
    }

    /// Only flagged when neither leg already sits on the target account.
    fn account_diff(&self, entry: &Entry, ctx: &Context) -> Result<Diff> {
        let Some(name) = &self.account else {
            return Ok(Diff::new());
        };
        let id = ctx.accounts.resolve(name)?;
        if entry.linked_account() == Some(id) || entry.account == id {
            return Ok(Diff::new());
        }
        let old = FieldValue::Ref {
            id: entry.linked_account().map(str::to_string),
            value: entry
                .linked_account()
                .and_then(|current| ctx.accounts.name_of(current))
                .map(str::to_string),
        };
        let new = FieldValue::Ref {
            id: Some(id.to_string()),
            value: Some(name.clone()),
        };
        Ok(Diff::single(Field::Account, Change { old, new }))
    }
}

fn description_diff(replacement: Option<&str>, entry: &Entry) -> Diff {
    let Some(replacement) = replacement else {
        return Diff::new();
    };
    let current = entry.description();
    if current == replacement {
        return Diff::new();
    }
    Diff::single(
        Field::Description,
        Change {
            old: FieldValue::Text(entry.desc.as_ref().map(|_| current)),
            new: FieldValue::Text(Some(replacement.to_string())),
        },
    )
}
