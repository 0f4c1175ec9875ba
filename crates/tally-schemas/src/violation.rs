use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable rule identifier.
///
/// Serialized as the bare code (`"F201"`), never as display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleCode {
    F101,
    F102,
    F111,
    F112,
    F201,
    F202,
    F204,
    F301,
    F302,
    F303,
    F304,
    F305,
    F306,
    F307,
    F401,
    F402,
    W201,
    W202,
    W203,
    W204,
    W301,
    W302,
}

impl RuleCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCode::F101 => "F101",
            RuleCode::F102 => "F102",
            RuleCode::F111 => "F111",
            RuleCode::F112 => "F112",
            RuleCode::F201 => "F201",
            RuleCode::F202 => "F202",
            RuleCode::F204 => "F204",
            RuleCode::F301 => "F301",
            RuleCode::F302 => "F302",
            RuleCode::F303 => "F303",
            RuleCode::F304 => "F304",
            RuleCode::F305 => "F305",
            RuleCode::F306 => "F306",
            RuleCode::F307 => "F307",
            RuleCode::F401 => "F401",
            RuleCode::F402 => "F402",
            RuleCode::W201 => "W201",
            RuleCode::W202 => "W202",
            RuleCode::W203 => "W203",
            RuleCode::W204 => "W204",
            RuleCode::W301 => "W301",
            RuleCode::W302 => "W302",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Dotted path of a field inside the entry data,
/// e.g. `data.voters_counts.poll_card_count`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(pub String);

impl FieldPath {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn field(section: &str, field: &str) -> Self {
        Self(format!("data.{section}.{field}"))
    }

    pub fn group_total(index: usize) -> Self {
        Self(format!("data.political_group_votes[{index}].total"))
    }

    pub fn candidate(index: usize, candidate_index: usize) -> Self {
        Self(format!(
            "data.political_group_votes[{index}].candidate_votes[{candidate_index}].votes"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single rule failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub code: RuleCode,
    pub fields: Vec<FieldPath>,
    pub severity: Severity,
}

/// Violations of one section, split by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResults {
    #[serde(default)]
    pub errors: Vec<Violation>,
    #[serde(default)]
    pub warnings: Vec<Violation>,
}

impl ValidationResults {
    pub fn from_violations(violations: impl IntoIterator<Item = Violation>) -> Self {
        let mut out = Self::default();
        for v in violations {
            match v.severity {
                Severity::Error => out.errors.push(v),
                Severity::Warning => out.warnings.push(v),
            }
        }
        out.errors.sort();
        out.warnings.sort();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Errors then warnings, each in code order.
    pub fn codes(&self) -> Vec<RuleCode> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .map(|v| v.code)
            .collect()
    }

    /// Merge another section's results into this one (used for whole-entry views).
    pub fn extend(&mut self, other: &ValidationResults) {
        self.errors.extend(other.errors.iter().cloned());
        self.warnings.extend(other.warnings.iter().cloned());
        self.errors.sort();
        self.warnings.sort();
    }
}
