use super::aggregate::{CellIssueKind, ImportDiagnostics};
use super::domain::{collapse_whitespace, round2, LevelSource, ParsedEmployee};
use super::score::{MAX_SCORE, MIN_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_COMPLETENESS_THRESHOLD_PERCENT: f64 = 80.0;
pub const DEFAULT_HIGH_ERROR_THRESHOLD: usize = 5;
pub const DEFAULT_MEDIUM_WARNING_THRESHOLD: usize = 10;

/// Overall quality classification of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    UnresolvedName,
    EmptyEmployeeName,
    NoCompetencies,
    MissingRequiredCompetency,
    ScoreOutOfRange,
    InvalidScoreCell,
    RawScoreOutOfRange,
    DefaultedLevel,
    DuplicateCompetency,
    SuspiciousCharacters,
    LowCompleteness,
}

impl IssueCode {
    /// Structural problems make a record unusable and force `critical`.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::UnresolvedName | Self::EmptyEmployeeName | Self::NoCompetencies
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationIssue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            employee: None,
            competency: None,
            row: None,
            column: None,
            value: None,
        }
    }

    fn for_employee(mut self, employee: &str) -> Self {
        self.employee = Some(employee.to_string());
        self
    }

    fn for_competency(mut self, competency: &str) -> Self {
        self.competency = Some(competency.to_string());
        self
    }

    fn at(mut self, row: usize, column: usize, value: &str) -> Self {
        self.row = Some(row);
        self.column = Some(column);
        self.value = Some(value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_employees: usize,
    pub valid_employees: usize,
    pub total_competencies: usize,
    pub data_completeness_percent: f64,
    pub missing_required_competencies: Vec<String>,
    pub required_competencies_present: Vec<String>,
    pub score_quality_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub severity: Severity,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn has_structural_errors(&self) -> bool {
        self.errors.iter().any(|issue| issue.code.is_structural())
    }
}

/// Thresholds and mandatory competencies the validator checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub required_competencies: Vec<String>,
    pub completeness_threshold_percent: f64,
    pub high_error_threshold: usize,
    pub medium_warning_threshold: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            required_competencies: Vec::new(),
            completeness_threshold_percent: DEFAULT_COMPLETENESS_THRESHOLD_PERCENT,
            high_error_threshold: DEFAULT_HIGH_ERROR_THRESHOLD,
            medium_warning_threshold: DEFAULT_MEDIUM_WARNING_THRESHOLD,
        }
    }
}

/// Counted issues; the only input to severity classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueTally {
    pub structural: usize,
    pub errors: usize,
    pub warnings: usize,
    pub below_completeness: bool,
}

pub fn classify(tally: IssueTally, policy: &ValidationPolicy) -> Severity {
    if tally.structural > 0 {
        return Severity::Critical;
    }
    if tally.errors >= policy.high_error_threshold.max(1) {
        return Severity::High;
    }
    if tally.errors > 0
        || tally.warnings >= policy.medium_warning_threshold.max(1)
        || tally.below_completeness
    {
        return Severity::Medium;
    }
    if tally.warnings > 0 {
        return Severity::Low;
    }
    Severity::Success
}

pub fn score_quality_label(completeness_percent: f64) -> &'static str {
    match completeness_percent {
        value if value >= 90.0 => "Excellent",
        value if value >= 75.0 => "Good",
        value if value >= 50.0 => "Fair",
        _ => "Poor",
    }
}

fn competency_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

fn has_suspicious_characters(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_control() || matches!(c, '\u{feff}' | '\u{200b}' | '\u{fffd}'))
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn validate(
        &self,
        employees: &[ParsedEmployee],
        diagnostics: &ImportDiagnostics,
        unresolved_names: &[String],
    ) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for name in unresolved_names {
            errors.push(
                ValidationIssue::new(
                    IssueCode::UnresolvedName,
                    format!("'{name}' does not match any directory employee and was not resolved"),
                )
                .for_employee(name),
            );
        }

        let required: Vec<(String, &String)> = self
            .policy
            .required_competencies
            .iter()
            .map(|name| (competency_key(name), name))
            .collect();

        let mut observed = BTreeSet::new();
        let mut valid_employees = 0;

        for employee in employees {
            let errors_before = errors.len();
            let present: BTreeSet<String> = employee
                .performance
                .iter()
                .map(|entry| competency_key(&entry.competency_name))
                .collect();
            observed.extend(present.iter().cloned());

            self.check_record(employee, &present, &required, &mut errors, &mut warnings);

            if errors.len() == errors_before {
                valid_employees += 1;
            }
        }

        for issue in &diagnostics.cell_issues {
            let (code, message) = match issue.kind {
                CellIssueKind::Unrecognized => (
                    IssueCode::InvalidScoreCell,
                    format!(
                        "row {} column {}: '{}' is neither a number nor a rating word",
                        issue.row,
                        issue.column + 1,
                        issue.raw
                    ),
                ),
                CellIssueKind::OutOfRange => (
                    IssueCode::RawScoreOutOfRange,
                    format!(
                        "row {} column {}: '{}' falls outside 0-100 and was dropped",
                        issue.row,
                        issue.column + 1,
                        issue.raw
                    ),
                ),
            };
            warnings.push(
                ValidationIssue::new(code, message)
                    .for_employee(&issue.employee)
                    .for_competency(&issue.competency)
                    .at(issue.row, issue.column, &issue.raw),
            );
        }

        for duplicate in &diagnostics.duplicate_competencies {
            let columns = duplicate
                .columns
                .iter()
                .map(|column| (column + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            warnings.push(
                ValidationIssue::new(
                    IssueCode::DuplicateCompetency,
                    format!(
                        "'{}' is assessed on '{}' by several columns ({columns}); samples were averaged together",
                        duplicate.employee, duplicate.competency
                    ),
                )
                .for_employee(&duplicate.employee)
                .for_competency(&duplicate.competency),
            );
        }

        let total_employees = employees.len();
        let data_completeness_percent = if total_employees == 0 {
            0.0
        } else {
            round2(valid_employees as f64 / total_employees as f64 * 100.0)
        };

        let below_completeness = total_employees > 0
            && data_completeness_percent < self.policy.completeness_threshold_percent;
        if below_completeness {
            warnings.push(ValidationIssue::new(
                IssueCode::LowCompleteness,
                format!(
                    "only {data_completeness_percent:.2}% of employees have complete, valid records (expected at least {:.2}%)",
                    self.policy.completeness_threshold_percent
                ),
            ));
        }

        let (required_competencies_present, missing_required_competencies): (Vec<_>, Vec<_>) =
            required
                .iter()
                .map(|(key, name)| ((*name).clone(), observed.contains(key)))
                .partition(|(_, present)| *present);

        let tally = IssueTally {
            structural: errors
                .iter()
                .filter(|issue: &&ValidationIssue| issue.code.is_structural())
                .count(),
            errors: errors
                .iter()
                .filter(|issue: &&ValidationIssue| !issue.code.is_structural())
                .count(),
            warnings: warnings.len(),
            below_completeness,
        };

        ValidationReport {
            severity: classify(tally, &self.policy),
            errors,
            warnings,
            summary: ValidationSummary {
                total_employees,
                valid_employees,
                total_competencies: observed.len(),
                data_completeness_percent,
                missing_required_competencies: missing_required_competencies
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
                required_competencies_present: required_competencies_present
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
                score_quality_label: score_quality_label(data_completeness_percent).to_string(),
            },
        }
    }

    fn check_record(
        &self,
        employee: &ParsedEmployee,
        present: &BTreeSet<String>,
        required: &[(String, &String)],
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let name = employee.name.as_str();

        if name.trim().is_empty() {
            errors.push(ValidationIssue::new(
                IssueCode::EmptyEmployeeName,
                "employee record has an empty name",
            ));
        }

        if employee.performance.is_empty() {
            errors.push(
                ValidationIssue::new(
                    IssueCode::NoCompetencies,
                    format!("'{name}' has no competency scores"),
                )
                .for_employee(name),
            );
        }

        for entry in &employee.performance {
            if !entry.score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&entry.score) {
                errors.push(
                    ValidationIssue::new(
                        IssueCode::ScoreOutOfRange,
                        format!(
                            "'{name}' scored {} on '{}', outside 0-100",
                            entry.score, entry.competency_name
                        ),
                    )
                    .for_employee(name)
                    .for_competency(&entry.competency_name),
                );
            }

            if has_suspicious_characters(&entry.competency_name) {
                warnings.push(
                    ValidationIssue::new(
                        IssueCode::SuspiciousCharacters,
                        format!("competency name for '{name}' contains control or invisible characters"),
                    )
                    .for_employee(name)
                    .for_competency(&entry.competency_name),
                );
            }
        }

        for (key, required_name) in required {
            if !present.contains(key) {
                errors.push(
                    ValidationIssue::new(
                        IssueCode::MissingRequiredCompetency,
                        format!("'{name}' is missing required competency '{required_name}'"),
                    )
                    .for_employee(name)
                    .for_competency(required_name),
                );
            }
        }

        if has_suspicious_characters(name) {
            warnings.push(
                ValidationIssue::new(
                    IssueCode::SuspiciousCharacters,
                    "employee name contains control or invisible characters",
                )
                .for_employee(name),
            );
        }

        if employee.level_source == LevelSource::Placeholder {
            warnings.push(
                ValidationIssue::new(
                    IssueCode::DefaultedLevel,
                    format!(
                        "no organizational level found for '{name}'; defaulted to '{}'",
                        employee.organizational_level
                    ),
                )
                .for_employee(name),
            );
        }
    }
}
