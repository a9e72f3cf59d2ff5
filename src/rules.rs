//! Compiles the rule document into an ordered list of rules.
//!
//! The document is a sequence of definitions, each either an entry rule
//! (`match`, `description`, `category`, `tags`) or a transfer rule
//! (`match`, `description`, `transfer`). `match` is a pattern string or a
//! mapping with `pattern`, `type`, `account` and `amount`.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::catalog::Context;
use crate::error::{Result, SyncError};
use crate::matcher::{AmountFilter, Matcher};
use crate::models::{normalize_description, Entry, EntryKind};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchClause {
    Pattern(String),
    Detailed(MatchDetail),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchDetail {
    pattern: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    account: Option<String>,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDefinition {
    #[serde(rename = "match")]
    matcher: MatchClause,
    description: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    transfer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntryRule {
    pub matcher: Matcher,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct TransferRule {
    pub matcher: Matcher,
    pub description: Option<String>,
    pub account: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Rule {
    Entry(EntryRule),
    Transfer(TransferRule),
}

impl Rule {
    pub fn matcher(&self) -> &Matcher {
        match self {
            Self::Entry(rule) => &rule.matcher,
            Self::Transfer(rule) => &rule.matcher,
        }
    }

    pub fn matches(&self, entry: &Entry, ctx: &Context) -> Result<bool> {
        self.matcher().matches(entry, ctx)
    }

    /// One-line summary of what the rule sets, for listings.
    pub fn action_summary(&self) -> String {
        let mut parts = Vec::new();
        let description = match self {
            Self::Entry(rule) => rule.description.as_deref(),
            Self::Transfer(rule) => rule.description.as_deref(),
        };
        if let Some(desc) = description {
            parts.push(format!("description = {desc:?}"));
        }
        match self {
            Self::Entry(rule) => {
                if let Some(category) = &rule.category {
                    parts.push(format!("category = {category}"));
                }
                if let Some(tags) = &rule.tags {
                    parts.push(format!("tags = [{}]", tags.join(", ")));
                }
            }
            Self::Transfer(rule) => {
                if let Some(account) = &rule.account {
                    parts.push(format!("transfer = {account}"));
                }
            }
        }
        if parts.is_empty() {
            "(no changes)".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    hash: String,
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("cannot read rules file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let blank = text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        let document: Value = if blank {
            Value::Null
        } else {
            serde_yaml::from_str(text)?
        };
        Self::from_document(document)
    }

    pub fn from_document(document: Value) -> Result<Self> {
        let hash = content_hash(&document);
        let definitions = match document {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            _ => {
                return Err(SyncError::Configuration(
                    "rules document must be a list of rule definitions".into(),
                ))
            }
        };
        let rules = definitions
            .into_iter()
            .enumerate()
            .map(|(index, definition)| compile(index + 1, definition))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules, hash })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule, in document order, whose matcher accepts the entry.
    pub fn first_match(&self, entry: &Entry, ctx: &Context) -> Result<Option<&Rule>> {
        for rule in &self.rules {
            if rule.matches(entry, ctx)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

fn compile(index: usize, definition: Value) -> Result<Rule> {
    let def: RuleDefinition = serde_json::from_value(definition)
        .map_err(|e| SyncError::Configuration(format!("rule #{index} is not a valid rule: {e}")))?;

    let matcher = match def.matcher {
        MatchClause::Pattern(pattern) => Matcher::new(&pattern, None, None, None),
        MatchClause::Detailed(detail) => {
            let kind = detail
                .kind
                .as_deref()
                .map(str::parse::<EntryKind>)
                .transpose()
                .map_err(|e| SyncError::Configuration(format!("rule #{index}: {e}")))?;
            if detail.amount.is_some() && kind.is_none() {
                return Err(SyncError::Configuration(format!(
                    "rule #{index}: amount requires a type"
                )));
            }
            let amount = detail.amount.as_deref().map(str::parse::<AmountFilter>).transpose()?;
            Matcher::new(&detail.pattern, kind, detail.account, amount)
        }
    }?;
    // Compared against folded entry text, so stored folded.
    let description = def.description.as_deref().map(normalize_description);

    match (def.transfer, def.category.is_some() || def.tags.is_some()) {
        (Some(_), true) => Err(SyncError::Configuration(format!(
            "rule #{index} mixes transfer with category/tags"
        ))),
        (Some(account), false) => Ok(Rule::Transfer(TransferRule {
            matcher,
            description,
            account: Some(account),
        })),
        (None, _) => Ok(Rule::Entry(EntryRule {
            matcher,
            description,
            category: def.category,
            tags: def.tags,
        })),
    }
}

/// SHA-256 over a canonical JSON encoding (sorted keys, no whitespace), so
/// reformatting the document does not change the hash.
pub fn content_hash(document: &Value) -> String {
    let canonical = canonicalize(document);
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
