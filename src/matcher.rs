use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::catalog::Context;
use crate::error::{Result, SyncError};
use crate::models::{Entry, EntryKind};

/// Two amounts closer than half a minor unit are equal.
const AMOUNT_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        let equal = (lhs - rhs).abs() < AMOUNT_EPSILON;
        match self {
            Self::Eq => equal,
            Self::Gt => lhs > rhs && !equal,
            Self::Ge => lhs > rhs || equal,
            Self::Lt => lhs < rhs && !equal,
            Self::Le => lhs < rhs || equal,
        }
    }
}

impl FromStr for Comparator {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" => Ok(Self::Eq),
            ">" => Ok(Self::Gt),
            ">=" | "≥" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" | "≤" => Ok(Self::Le),
            other => Err(SyncError::Configuration(format!(
                "unknown amount comparator '{other}' (expected one of =, >, >=, <, <=)"
            ))),
        }
    }
}

/// `"<comparator> <magnitude>"`, compared against the absolute amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountFilter {
    pub comparator: Comparator,
    pub magnitude: f64,
}

impl AmountFilter {
    pub fn accepts(&self, amount: f64) -> bool {
        self.comparator.holds(amount.abs(), self.magnitude)
    }
}

impl FromStr for AmountFilter {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '.' || c.is_whitespace())
            .unwrap_or(s.len());
        let (symbol, rest) = s.split_at(split);
        let comparator: Comparator = symbol.parse()?;
        let magnitude: f64 = rest.trim().parse().map_err(|_| {
            SyncError::Configuration(format!("invalid amount '{s}': expected '<comparator> <number>'"))
        })?;
        if !magnitude.is_finite() {
            return Err(SyncError::Configuration(format!(
                "invalid amount '{s}': magnitude must be a finite number"
            )));
        }
        Ok(Self {
            comparator,
            magnitude: magnitude.abs(),
        })
    }
}

impl fmt::Display for AmountFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.comparator.symbol(), self.magnitude)
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Regex,
    kind: Option<EntryKind>,
    account: Option<String>,
    amount: Option<AmountFilter>,
}

impl Matcher {
    pub fn new(
        pattern: &str,
        kind: Option<EntryKind>,
        account: Option<String>,
        amount: Option<AmountFilter>,
    ) -> Result<Self> {
        if amount.is_some() && kind.is_none() {
            return Err(SyncError::Configuration(format!(
                "rule '{pattern}' filters on amount without a type"
            )));
        }
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map_err(|e| SyncError::Configuration(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(Self {
            pattern,
            kind,
            account,
            amount,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn kind(&self) -> Option<EntryKind> {
        self.kind
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn amount(&self) -> Option<&AmountFilter> {
        self.amount.as_ref()
    }

    /// Clauses are checked in order and stop at the first miss. An account
    /// filter naming an unknown account is an error, not a miss.
    pub fn matches(&self, entry: &Entry, ctx: &Context) -> Result<bool> {
        if !self.pattern.is_match(&entry.description()) {
            return Ok(false);
        }
        if let Some(kind) = self.kind {
            if entry.kind() != kind {
                return Ok(false);
            }
        }
        if let Some(name) = &self.account {
            if ctx.accounts.resolve(name)? != entry.account {
                return Ok(false);
            }
        }
        if let Some(filter) = &self.amount {
            if !filter.accepts(entry.amount) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
