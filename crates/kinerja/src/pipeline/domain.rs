use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Placeholder level for employees no mapping or row hint could place.
pub const DEFAULT_ORGANIZATIONAL_LEVEL: &str = "Staff/Other";

/// Exact employee name to organizational level.
pub type LevelMapping = BTreeMap<String, String>;

/// Caller decisions for names the reconciler could not match, keyed by the
/// source name as it appeared in the header row.
pub type ResolutionMap = BTreeMap<String, NameResolution>;

/// Read-only record supplied by the employee directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub organizational_level: String,
}

impl DirectoryEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        organizational_level: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            organizational_level: organizational_level.into(),
        }
    }
}

/// Averaged score for one competency of one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency_name: String,
    pub score: f64,
}

/// Where an employee's organizational level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    Roster,
    Organization,
    RowHint,
    Placeholder,
}

impl LevelSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Roster => "Roster",
            Self::Organization => "Organization Mapping",
            Self::RowHint => "Row Hint",
            Self::Placeholder => "Placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEmployee {
    pub name: String,
    pub organizational_level: String,
    pub level_source: LevelSource,
    pub performance: Vec<CompetencyScore>,
}

impl ParsedEmployee {
    pub fn score_for(&self, competency: &str) -> Option<f64> {
        self.performance
            .iter()
            .find(|entry| entry.competency_name == competency)
            .map(|entry| entry.score)
    }
}

/// Which reconciliation tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Normalized,
    Fuzzy,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameMatchResult {
    pub source_name: String,
    pub matched_directory_name: Option<String>,
    pub confidence: f64,
    pub is_new_employee: bool,
    pub tier: Option<MatchTier>,
}

impl NameMatchResult {
    pub fn is_matched(&self) -> bool {
        self.matched_directory_name.is_some() || self.is_new_employee
    }

    /// Name the aggregated record is filed under.
    pub fn canonical_name(&self) -> &str {
        self.matched_directory_name
            .as_deref()
            .unwrap_or(&self.source_name)
    }
}

/// Human decision for a name that no matching tier could place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameResolution {
    Existing {
        directory_name: String,
        organizational_level: String,
    },
    NewEmployee {
        organizational_level: String,
    },
}

impl NameResolution {
    pub fn organizational_level(&self) -> &str {
        match self {
            NameResolution::Existing {
                organizational_level,
                ..
            }
            | NameResolution::NewEmployee {
                organizational_level,
            } => organizational_level,
        }
    }
}

/// Compile a pattern literal on first use. Only `'static` literals reach this
/// and each one is exercised by its module's tests, so the error arm is
/// unreachable.
pub(crate) fn literal_regex(
    cell: &'static OnceLock<Regex>,
    pattern: &'static str,
) -> &'static Regex {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => unreachable!("pattern literal {pattern:?} does not compile: {err}"),
    })
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
