use super::domain::{collapse_whitespace, literal_regex};
use super::ImportError;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

static BRACKETED_NAME: OnceLock<Regex> = OnceLock::new();
static ORDINAL_PREFIX: OnceLock<Regex> = OnceLock::new();

/// Header words marking the column that carries an organizational-level hint.
pub const LEVEL_HINT_LABELS: &[&str] = &["eselon", "jabatan", "level", "golongan", "tingkat"];

fn bracketed_name() -> &'static Regex {
    literal_regex(&BRACKETED_NAME, r"\[([^\]]*)\]")
}

fn ordinal_prefix() -> &'static Regex {
    literal_regex(&ORDINAL_PREFIX, r"^\d+(?:[.)]\s*|\s+)")
}

fn strip_ordinal(value: &str) -> &str {
    let trimmed = value.trim();
    match ordinal_prefix().find(trimmed) {
        Some(prefix) => trimmed[prefix.end()..].trim(),
        None => trimmed,
    }
}

/// A header column that names one (employee, competency) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedColumn {
    pub index: usize,
    pub employee: String,
    pub competency: String,
}

/// Interpret one header cell; `None` leaves the column unmapped.
pub fn interpret_header_cell(index: usize, cell: &str) -> Option<MappedColumn> {
    let bracket = bracketed_name().captures(cell)?;
    let whole = bracket.get(0)?;
    let employee = collapse_whitespace(strip_ordinal(bracket.get(1)?.as_str()));
    if employee.is_empty() {
        return None;
    }

    let remainder = format!("{} {}", &cell[..whole.start()], &cell[whole.end()..]);
    let competency = collapse_whitespace(strip_ordinal(&remainder));
    if competency.is_empty() {
        return None;
    }

    Some(MappedColumn {
        index,
        employee,
        competency,
    })
}

/// Column interpretation of a header row, decided once per grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    columns: Vec<MappedColumn>,
    level_hint_column: Option<usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Result<Self, ImportError> {
        let mut columns = Vec::new();
        let mut level_hint_column = None;

        for (index, cell) in header.iter().enumerate() {
            match interpret_header_cell(index, cell) {
                Some(column) => columns.push(column),
                None if level_hint_column.is_none() && is_level_hint_label(cell) => {
                    level_hint_column = Some(index);
                }
                None => {}
            }
        }

        if columns.is_empty() {
            return Err(ImportError::NoMappedColumns);
        }

        Ok(Self {
            columns,
            level_hint_column,
        })
    }

    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    pub fn level_hint_column(&self) -> Option<usize> {
        self.level_hint_column
    }

    /// Distinct employee names in order of first appearance.
    pub fn employee_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for column in &self.columns {
            if !names.contains(&column.employee) {
                names.push(column.employee.clone());
            }
        }
        names
    }

    /// Same interpretation with the columns of `excluded` employees dropped.
    pub(crate) fn without_employees(&self, excluded: &[String]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|column| !excluded.contains(&column.employee))
                .cloned()
                .collect(),
            level_hint_column: self.level_hint_column,
        }
    }
}

fn is_level_hint_label(cell: &str) -> bool {
    let lowered = cell.to_lowercase();
    LEVEL_HINT_LABELS
        .iter()
        .any(|label| lowered.contains(label))
}
