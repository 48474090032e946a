use super::domain::{
    round2, CompetencyScore, LevelMapping, LevelSource, ParsedEmployee,
    DEFAULT_ORGANIZATIONAL_LEVEL,
};
use super::header::ColumnMap;
use super::score::{is_score_like, normalize_score, ScoreCell};
use super::tokenizer::RawGrid;
use super::ImportError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Lookup tables consulted, in order, when placing an employee.
#[derive(Debug, Clone, Copy)]
pub struct LevelSources<'a> {
    pub roster: &'a LevelMapping,
    pub organization: &'a LevelMapping,
}

impl LevelSources<'_> {
    fn candidate(&self, canonical: &str, source: &str, hint: Option<&str>) -> (String, LevelSource) {
        if let Some(level) = lookup_level(self.roster, canonical, source) {
            return (level.to_string(), LevelSource::Roster);
        }
        if let Some(level) = lookup_level(self.organization, canonical, source) {
            return (level.to_string(), LevelSource::Organization);
        }
        if let Some(hint) = hint {
            return (hint.to_string(), LevelSource::RowHint);
        }
        (
            DEFAULT_ORGANIZATIONAL_LEVEL.to_string(),
            LevelSource::Placeholder,
        )
    }
}

fn lookup_level<'m>(mapping: &'m LevelMapping, canonical: &str, source: &str) -> Option<&'m str> {
    mapping
        .get(canonical)
        .or_else(|| mapping.get(source))
        .map(|level| level.trim())
        .filter(|level| !level.is_empty())
}

fn is_staff_placeholder(level: &str) -> bool {
    level.to_lowercase().contains("staff")
}

fn mentions_eselon(level: &str) -> bool {
    level.to_lowercase().contains("eselon")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellIssueKind {
    Unrecognized,
    OutOfRange,
}

/// A score cell that contributed no sample, kept so the value can be traced
/// back to its spreadsheet position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellIssue {
    pub row: usize,
    pub column: usize,
    pub employee: String,
    pub competency: String,
    pub raw: String,
    pub kind: CellIssueKind,
}

/// Several header columns feeding the same employee/competency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCompetency {
    pub employee: String,
    pub competency: String,
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportDiagnostics {
    pub cell_issues: Vec<CellIssue>,
    pub duplicate_competencies: Vec<DuplicateCompetency>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub employees: Vec<ParsedEmployee>,
    pub diagnostics: ImportDiagnostics,
}

#[derive(Debug)]
struct CompetencySamples {
    order: usize,
    columns: Vec<usize>,
    samples: Vec<f64>,
}

impl CompetencySamples {
    fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().sum();
        Some(round2(total / self.samples.len() as f64))
    }
}

#[derive(Debug)]
struct EmployeeAccumulator {
    order: usize,
    level: Option<(String, LevelSource)>,
    competencies: BTreeMap<String, CompetencySamples>,
}

impl EmployeeAccumulator {
    fn new(order: usize) -> Self {
        Self {
            order,
            level: None,
            competencies: BTreeMap::new(),
        }
    }

    fn register_column(&mut self, competency: &str, column: usize) {
        let order = self.competencies.len();
        self.competencies
            .entry(competency.to_string())
            .or_insert_with(|| CompetencySamples {
                order,
                columns: Vec::new(),
                samples: Vec::new(),
            })
            .columns
            .push(column);
    }

    fn record(&mut self, competency: &str, score: f64) {
        if let Some(entry) = self.competencies.get_mut(competency) {
            entry.samples.push(score);
        }
    }

    /// First candidate wins, except that an "eselon" level replaces a staff
    /// placeholder.
    fn offer_level(&mut self, candidate: (String, LevelSource)) {
        let replace = match &self.level {
            None => true,
            Some((current, _)) => is_staff_placeholder(current) && mentions_eselon(&candidate.0),
        };
        if replace {
            self.level = Some(candidate);
        }
    }

    fn finish(self, name: String) -> Option<ParsedEmployee> {
        let mut scored: Vec<(usize, CompetencyScore)> = self
            .competencies
            .into_iter()
            .filter_map(|(competency_name, samples)| {
                samples.mean().map(|score| {
                    (
                        samples.order,
                        CompetencyScore {
                            competency_name,
                            score,
                        },
                    )
                })
            })
            .collect();

        if scored.is_empty() {
            return None;
        }
        scored.sort_by_key(|(order, _)| *order);

        let (organizational_level, level_source) = self.level.unwrap_or_else(|| {
            (
                DEFAULT_ORGANIZATIONAL_LEVEL.to_string(),
                LevelSource::Placeholder,
            )
        });

        Some(ParsedEmployee {
            name,
            organizational_level,
            level_source,
            performance: scored.into_iter().map(|(_, score)| score).collect(),
        })
    }
}

/// Accumulate every mapped cell of the grid into averaged per-employee
/// records. `aliases` maps header names onto canonical directory names;
/// names missing from it are kept as written.
pub fn aggregate(
    grid: &RawGrid,
    columns: &ColumnMap,
    aliases: &BTreeMap<String, String>,
    levels: LevelSources<'_>,
) -> Result<Aggregation, ImportError> {
    let canonical_of =
        |source: &str| -> String { aliases.get(source).cloned().unwrap_or_else(|| source.to_string()) };

    let mut accumulators: BTreeMap<String, EmployeeAccumulator> = BTreeMap::new();
    for column in columns.columns() {
        let canonical = canonical_of(&column.employee);
        let order = accumulators.len();
        accumulators
            .entry(canonical)
            .or_insert_with(|| EmployeeAccumulator::new(order))
            .register_column(&column.competency, column.index);
    }

    let mut diagnostics = ImportDiagnostics::default();

    for (line, row) in grid.numbered_rows() {
        let hint = columns
            .level_hint_column()
            .filter(|_| !row.iter().all(|field| is_score_like(field)))
            .and_then(|index| row.get(index))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty());

        for column in columns.columns() {
            let raw = row.get(column.index).map(String::as_str).unwrap_or("");
            let canonical = canonical_of(&column.employee);

            let kind = match normalize_score(raw) {
                ScoreCell::Blank => continue,
                ScoreCell::Score(score) => {
                    if let Some(accumulator) = accumulators.get_mut(&canonical) {
                        accumulator.record(&column.competency, score);
                        accumulator.offer_level(levels.candidate(
                            &canonical,
                            &column.employee,
                            hint,
                        ));
                    }
                    continue;
                }
                ScoreCell::OutOfRange(_) => CellIssueKind::OutOfRange,
                ScoreCell::Unrecognized => CellIssueKind::Unrecognized,
            };

            diagnostics.cell_issues.push(CellIssue {
                row: line,
                column: column.index,
                employee: canonical,
                competency: column.competency.clone(),
                raw: raw.trim().to_string(),
                kind,
            });
        }
    }

    let mut ordered: Vec<(String, EmployeeAccumulator)> = accumulators.into_iter().collect();
    ordered.sort_by_key(|(_, accumulator)| accumulator.order);

    let mut employees = Vec::with_capacity(ordered.len());
    for (name, accumulator) in ordered {
        for (competency, samples) in &accumulator.competencies {
            if samples.columns.len() > 1 {
                diagnostics.duplicate_competencies.push(DuplicateCompetency {
                    employee: name.clone(),
                    competency: competency.clone(),
                    columns: samples.columns.clone(),
                });
            }
        }
        if let Some(employee) = accumulator.finish(name) {
            employees.push(employee);
        }
    }

    debug!(
        employees = employees.len(),
        rejected_cells = diagnostics.cell_issues.len(),
        "aggregated score samples"
    );

    if employees.is_empty() {
        return Err(ImportError::NoScores);
    }

    Ok(Aggregation {
        employees,
        diagnostics,
    })
}
