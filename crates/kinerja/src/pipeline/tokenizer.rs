use super::domain::literal_regex;
use super::ImportError;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

static SPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn space_run() -> &'static Regex {
    literal_regex(&SPACE_RUN, " {2,}")
}

/// Field separator chosen once per pasted block from its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Tab,
    MultiSpace,
    Comma,
}

impl Delimiter {
    /// Tab beats runs of two or more spaces, which beat commas only when
    /// there are at least as many runs as commas.
    pub fn detect(header: &str) -> Self {
        let tabs = header.matches('\t').count();
        let commas = header.matches(',').count();
        let space_runs = space_run().find_iter(header).count();

        if tabs > 0 {
            Self::Tab
        } else if space_runs > 0 && space_runs >= commas {
            Self::MultiSpace
        } else {
            Self::Comma
        }
    }

    pub fn split(self, line: &str) -> Result<Vec<String>, ImportError> {
        match self {
            Self::Tab => split_quoted(line, b'\t'),
            Self::Comma => split_quoted(line, b','),
            Self::MultiSpace => Ok(split_space_runs(line)),
        }
    }
}

fn split_quoted(line: &str, delimiter: u8) -> Result<Vec<String>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }

    Ok(record.iter().map(str::to_string).collect())
}

fn split_space_runs(line: &str) -> Vec<String> {
    let mut fields: Vec<String> = space_run()
        .split(line)
        .map(|field| field.trim().to_string())
        .collect();

    while fields.last().is_some_and(String::is_empty) {
        fields.pop();
    }
    let leading = fields.iter().take_while(|field| field.is_empty()).count();
    fields.drain(..leading);
    fields
}

fn strip_invisible(line: &str) -> String {
    line.replace(['\u{feff}', '\u{200b}'], "")
}

fn is_blank_line(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || matches!(c, ',' | '\t' | '"'))
}

/// Header plus data rows, all split with the same delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGrid {
    delimiter: Delimiter,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn parse(text: &str) -> Result<Self, ImportError> {
        let lines: Vec<String> = text
            .lines()
            .map(strip_invisible)
            .filter(|line| !is_blank_line(line))
            .collect();

        if lines.len() < 2 {
            return Err(ImportError::MissingHeader {
                usable_lines: lines.len(),
            });
        }

        let delimiter = Delimiter::detect(&lines[0]);
        debug!(?delimiter, lines = lines.len(), "detected delimiter from header");

        let header = delimiter.split(&lines[0])?;
        let rows = lines[1..]
            .iter()
            .map(|line| delimiter.split(line))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            delimiter,
            header,
            rows,
        })
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Data rows paired with their spreadsheet line number (header is line 1).
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (index + 2, row.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_wins_over_commas() {
        assert_eq!(Delimiter::detect("a\tb, c\td\te"), Delimiter::Tab);
    }

    #[test]
    fn space_runs_win_when_no_commas() {
        assert_eq!(
            Delimiter::detect("Komunikasi [Budi]  Integritas [Budi]  Nama"),
            Delimiter::MultiSpace
        );
    }

    #[test]
    fn commas_win_when_they_outnumber_space_runs() {
        assert_eq!(Delimiter::detect("a,b,c  d"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a,b,c"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a  b,c"), Delimiter::MultiSpace);
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_escaped_quotes() {
        let fields = Delimiter::Comma
            .split(r#""Kerja Sama, Tim [Budi]","Sebut ""Baik"" saja", 75 "#)
            .expect("splits");
        assert_eq!(
            fields,
            vec![
                "Kerja Sama, Tim [Budi]".to_string(),
                "Sebut \"Baik\" saja".to_string(),
                "75".to_string(),
            ]
        );
    }

    #[test]
    fn multi_space_split_preserves_single_spaces() {
        let fields = Delimiter::MultiSpace
            .split("  Siti Aminah   sangat baik  75  ")
            .expect("splits");
        assert_eq!(fields, vec!["Siti Aminah", "sangat baik", "75"]);
    }

    #[test]
    fn empty_cells_keep_their_position() {
        let fields = Delimiter::Tab.split("75\t\tBaik").expect("splits");
        assert_eq!(fields, vec!["75", "", "Baik"]);
    }

    #[test]
    fn grid_drops_blank_and_delimiter_only_lines() {
        let grid = RawGrid::parse("\u{feff}A [X],B [X]\n\n , ,\n75,85\n").expect("grid parses");
        assert_eq!(grid.delimiter(), Delimiter::Comma);
        assert_eq!(grid.header(), ["A [X]", "B [X]"]);
        assert_eq!(grid.rows().len(), 1);
        let numbered: Vec<_> = grid.numbered_rows().map(|(line, _)| line).collect();
        assert_eq!(numbered, vec![2]);
    }

    #[test]
    fn grid_requires_header_and_one_row() {
        let error = RawGrid::parse("A [X],B [X]\n\n").expect_err("only a header");
        assert!(matches!(
            error,
            ImportError::MissingHeader { usable_lines: 1 }
        ));
    }
}
