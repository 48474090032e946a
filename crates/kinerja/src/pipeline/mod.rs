//! Import of pasted performance-assessment spreadsheets.
//!
//! Text flows through [`tokenizer`], [`header`], [`reconcile`],
//! [`aggregate`] and [`validate`]. Names the directory cannot place pause
//! the import until the caller supplies a [`NameResolution`] for each.

pub mod aggregate;
pub mod directory;
pub mod domain;
pub mod header;
pub mod reconcile;
pub mod score;
pub mod tokenizer;
pub mod validate;

pub use aggregate::{
    aggregate, Aggregation, CellIssue, CellIssueKind, DuplicateCompetency, ImportDiagnostics,
    LevelSources,
};
pub use directory::{load_directory, load_directory_from_path, DirectoryError};
pub use domain::{
    CompetencyScore, DirectoryEntry, LevelMapping, LevelSource, MatchTier, NameMatchResult,
    NameResolution, ParsedEmployee, ResolutionMap, DEFAULT_ORGANIZATIONAL_LEVEL,
};
pub use header::{ColumnMap, MappedColumn};
pub use reconcile::{
    normalize_person_name, similarity, NameReconciler, Reconciliation, FUZZY_MATCH_THRESHOLD,
};
pub use score::{normalize_score, ScoreCell};
pub use tokenizer::{Delimiter, RawGrid};
pub use validate::{
    IssueCode, Severity, ValidationIssue, ValidationPolicy, ValidationReport, ValidationSummary,
    Validator,
};

use crate::config::PipelineConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input problems that stop an import before any record is produced.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(
        "header row missing: paste the header row followed by at least one row of scores \
         (found {usable_lines} usable line(s))"
    )]
    MissingHeader { usable_lines: usize },
    #[error(
        "no employee columns found: header cells must name the employee in brackets, \
         e.g. \"1. Komunikasi [Budi Santoso]\""
    )]
    NoMappedColumns,
    #[error(
        "no numeric or rated scores found: use whole numbers from 0 to 100 or one of \
         \"Kurang Baik\", \"Baik\", \"Sangat Baik\""
    )]
    NoScores,
    #[error("could not split pasted text into fields: {0}")]
    Delimited(#[from] csv::Error),
}

/// Finished import: averaged records, their validation and how each header
/// name was placed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub employees: Vec<ParsedEmployee>,
    pub validation: ValidationReport,
    pub name_matches: Vec<NameMatchResult>,
}

/// What the caller is asked for when names remain unplaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionRequest {
    pub unresolved_names: Vec<String>,
    pub partial_directory_mapping: LevelMapping,
    pub name_matches: Vec<NameMatchResult>,
}

/// An import paused for name resolution. Holds the tokenized grid so the
/// text is not parsed twice when the caller resumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImport {
    grid: RawGrid,
    columns: ColumnMap,
    reconciliation: Reconciliation,
}

impl PendingImport {
    pub fn unresolved_names(&self) -> Vec<String> {
        self.reconciliation.unresolved_names()
    }

    pub fn partial_directory_mapping(&self) -> LevelMapping {
        self.reconciliation.partial_directory_mapping()
    }

    pub fn matches(&self) -> &[NameMatchResult] {
        self.reconciliation.matches()
    }

    pub fn resolution_request(&self) -> ResolutionRequest {
        ResolutionRequest {
            unresolved_names: self.unresolved_names(),
            partial_directory_mapping: self.partial_directory_mapping(),
            name_matches: self.matches().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Completed(ImportReport),
    NeedsResolution(PendingImport),
}

impl ImportOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ImportOutcome::Completed(_))
    }

    pub fn into_payload(self) -> ImportPayload {
        match self {
            ImportOutcome::Completed(report) => ImportPayload::Completed(report),
            ImportOutcome::NeedsResolution(pending) => {
                ImportPayload::NeedsResolution(pending.resolution_request())
            }
        }
    }
}

/// Wire form of an [`ImportOutcome`], tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportPayload {
    Completed(ImportReport),
    NeedsResolution(ResolutionRequest),
}

/// Runs pasted text through the whole pipeline against one directory
/// snapshot. Clones share the snapshot.
#[derive(Debug, Clone)]
pub struct PerformanceImporter {
    directory: Arc<[DirectoryEntry]>,
    roster: LevelMapping,
    organization: LevelMapping,
    validator: Validator,
    fuzzy_threshold: f64,
    accept_unmatched_as_new: bool,
}

impl Default for PerformanceImporter {
    fn default() -> Self {
        Self::new(Vec::<DirectoryEntry>::new())
    }
}

impl PerformanceImporter {
    pub fn new(directory: impl Into<Arc<[DirectoryEntry]>>) -> Self {
        Self {
            directory: directory.into(),
            roster: LevelMapping::new(),
            organization: LevelMapping::new(),
            validator: Validator::default(),
            fuzzy_threshold: FUZZY_MATCH_THRESHOLD,
            accept_unmatched_as_new: false,
        }
    }

    pub fn from_config(directory: Vec<DirectoryEntry>, config: &PipelineConfig) -> Self {
        Self::new(directory)
            .with_policy(config.validation_policy())
            .with_fuzzy_threshold(config.fuzzy_threshold)
            .accept_unmatched_as_new(config.accept_unmatched_as_new)
    }

    /// Authoritative levels keyed by exact employee name; they beat every
    /// other level source.
    pub fn with_roster(mut self, roster: LevelMapping) -> Self {
        self.roster = roster;
        self
    }

    /// Caller-supplied levels; they override levels taken from matched
    /// directory entries.
    pub fn with_organization_levels(mut self, organization: LevelMapping) -> Self {
        self.organization = organization;
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.validator = Validator::new(policy);
        self
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Take names nothing could place as new employees instead of pausing.
    /// Off unless the caller asks for it.
    pub fn accept_unmatched_as_new(mut self, accept: bool) -> Self {
        self.accept_unmatched_as_new = accept;
        self
    }

    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    pub fn import(&self, text: &str) -> Result<ImportOutcome, ImportError> {
        self.import_with_resolutions(text, &ResolutionMap::new())
    }

    pub fn import_with_resolutions(
        &self,
        text: &str,
        resolutions: &ResolutionMap,
    ) -> Result<ImportOutcome, ImportError> {
        let grid = RawGrid::parse(text)?;
        let columns = ColumnMap::from_header(grid.header())?;
        debug!(
            delimiter = ?grid.delimiter(),
            rows = grid.rows().len(),
            mapped_columns = columns.columns().len(),
            "interpreted pasted header"
        );

        let reconciliation = self.reconcile(&columns, resolutions);
        self.finish(grid, columns, reconciliation)
    }

    /// Continue a paused import. Resolutions are keyed by source name;
    /// names still missing one pause the import again.
    pub fn resume(
        &self,
        pending: PendingImport,
        resolutions: &ResolutionMap,
    ) -> Result<ImportOutcome, ImportError> {
        let PendingImport { grid, columns, .. } = pending;
        let reconciliation = self.reconcile(&columns, resolutions);
        self.finish(grid, columns, reconciliation)
    }

    /// Report for the names already placed, with every unresolved name
    /// raised as a structural error. Nothing is filed under an unplaced name.
    pub fn preview(&self, pending: &PendingImport) -> Result<ImportReport, ImportError> {
        let unresolved = pending.unresolved_names();
        let columns = pending.columns.without_employees(&unresolved);
        self.build_report(
            &pending.grid,
            &columns,
            &pending.reconciliation,
            &unresolved,
        )
    }

    fn reconcile(&self, columns: &ColumnMap, resolutions: &ResolutionMap) -> Reconciliation {
        NameReconciler::new(&self.directory)
            .with_threshold(self.fuzzy_threshold)
            .accept_unmatched_as_new(self.accept_unmatched_as_new)
            .reconcile(&columns.employee_names(), resolutions)
    }

    fn finish(
        &self,
        grid: RawGrid,
        columns: ColumnMap,
        reconciliation: Reconciliation,
    ) -> Result<ImportOutcome, ImportError> {
        if !reconciliation.is_complete() {
            warn!(
                unresolved = reconciliation.unresolved_names().len(),
                "performance import waiting for name resolution"
            );
            return Ok(ImportOutcome::NeedsResolution(PendingImport {
                grid,
                columns,
                reconciliation,
            }));
        }

        let report = self.build_report(&grid, &columns, &reconciliation, &[])?;
        info!(
            employees = report.employees.len(),
            severity = report.validation.severity.label(),
            completeness = report.validation.summary.data_completeness_percent,
            "performance import completed"
        );
        Ok(ImportOutcome::Completed(report))
    }

    fn build_report(
        &self,
        grid: &RawGrid,
        columns: &ColumnMap,
        reconciliation: &Reconciliation,
        unresolved: &[String],
    ) -> Result<ImportReport, ImportError> {
        let mut organization = reconciliation.directory_levels().clone();
        organization.extend(
            self.organization
                .iter()
                .map(|(name, level)| (name.clone(), level.clone())),
        );
        organization.extend(
            reconciliation
                .resolved_levels()
                .iter()
                .map(|(name, level)| (name.clone(), level.clone())),
        );

        // A preview where no name is placed yet has nothing to aggregate.
        let aggregation = if columns.columns().is_empty() {
            Aggregation {
                employees: Vec::new(),
                diagnostics: ImportDiagnostics::default(),
            }
        } else {
            aggregate(
                grid,
                columns,
                &reconciliation.aliases(),
                LevelSources {
                    roster: &self.roster,
                    organization: &organization,
                },
            )?
        };
        let validation =
            self.validator
                .validate(&aggregation.employees, &aggregation.diagnostics, unresolved);

        Ok(ImportReport {
            employees: aggregation.employees,
            validation,
            name_matches: reconciliation.matches().to_vec(),
        })
    }
}
