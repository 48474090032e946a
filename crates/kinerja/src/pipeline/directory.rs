use super::domain::{collapse_whitespace, DirectoryEntry};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum DirectoryError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Io(err) => write!(f, "failed to read employee directory: {}", err),
            DirectoryError::Csv(err) => write!(f, "invalid employee directory CSV: {}", err),
        }
    }
}

impl std::error::Error for DirectoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryError::Io(err) => Some(err),
            DirectoryError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for DirectoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for DirectoryError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    #[serde(default, alias = "nip", alias = "ID", alias = "NIP")]
    id: String,
    #[serde(alias = "nama", alias = "Name", alias = "Nama")]
    name: String,
    #[serde(
        default,
        alias = "level",
        alias = "jabatan",
        alias = "Jabatan",
        alias = "eselon",
        alias = "Eselon",
        deserialize_with = "empty_string_as_none"
    )]
    organizational_level: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Read a directory export. Rows without a name are skipped; a missing level
/// is kept empty so the aggregator falls through to later level sources.
pub fn load_directory<R: Read>(reader: R) -> Result<Vec<DirectoryEntry>, DirectoryError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for record in csv_reader.deserialize::<DirectoryRow>() {
        let row = record?;
        let name = collapse_whitespace(&row.name);
        if name.is_empty() {
            continue;
        }

        entries.push(DirectoryEntry {
            id: row.id,
            name,
            organizational_level: row.organizational_level.unwrap_or_default(),
        });
    }

    Ok(entries)
}

pub fn load_directory_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<DirectoryEntry>, DirectoryError> {
    let file = std::fs::File::open(path)?;
    load_directory(file)
}
