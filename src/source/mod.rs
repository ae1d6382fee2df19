//! Tabular cell sources.
//!
//! The compiler core never touches a file format directly; it reads cells
//! through the [`CellSource`] trait. [`csv`] provides the CSV-backed source
//! with encoding and delimiter auto-detection; [`MemorySource`] backs tests
//! and embedding.

pub mod csv;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

/// Characters allowed in a source filename.
static FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_+\-.]").unwrap());

/// One sheet of raw cells.
///
/// Out-of-range cells and empty cells read as [`Value::Null`]; the type
/// system substitutes defaults downstream.
pub trait CellSource {
    /// Sheet name, used as the export key.
    fn sheet_name(&self) -> &str;

    /// Source file name, for diagnostics and the meta document.
    fn source_filename(&self) -> &str;

    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Raw value of one cell.
    fn cell(&self, row: usize, col: usize) -> Value;

    /// A cell stringified and stripped of spaces, as header parsing wants it.
    fn header_cell(&self, row: usize, col: usize) -> String {
        match self.cell(row, col) {
            Value::Null => String::new(),
            Value::Str(s) => s.chars().filter(|c| *c != ' ').collect(),
            other => other.key_string(),
        }
    }
}

/// Whether a filename is admissible as a compilation input.
///
/// Filenames with characters outside `[A-Za-z0-9_+\-.]`, and filenames on
/// the caller's ignore list (case-insensitive), are skipped entirely.
pub fn admissible_filename(filename: &str, ignore: &[String]) -> bool {
    if FILENAME_RE.is_match(filename) {
        return false;
    }
    let lower = filename.to_lowercase();
    !ignore.iter().any(|ig| ig.to_lowercase() == lower)
}

/// Derive a sheet's export name from its source filename: the stem with
/// `+` and `-` stripped.
pub fn export_name(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    };
    stem.chars().filter(|c| *c != '+' && *c != '-').collect()
}

// =============================================================================
// In-memory source
// =============================================================================

/// A cell source over an in-memory grid.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    filename: String,
    rows: Vec<Vec<Value>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        let name = name.into();
        let filename = format!("{}.csv", name);
        Self { name, filename, rows }
    }

    /// Build a grid from string literals; empty strings become `Null`.
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let grid = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            Value::Null
                        } else {
                            Value::Str((*cell).to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(name, grid)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

impl CellSource for MemorySource {
    fn sheet_name(&self) -> &str {
        &self.name
    }

    fn source_filename(&self) -> &str {
        &self.filename
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn cell(&self, row: usize, col: usize) -> Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admissible_filename() {
        assert!(admissible_filename("items.csv", &[]));
        assert!(admissible_filename("a+b-c_1.csv", &[]));
        assert!(!admissible_filename("items (copy).csv", &[]));
        assert!(!admissible_filename("数据.csv", &[]));
        assert!(!admissible_filename("Items.csv", &["items.csv".to_string()]));
    }

    #[test]
    fn test_export_name_strips_markers() {
        assert_eq!(export_name("items.csv"), "items");
        assert_eq!(export_name("npc+extra.csv"), "npcextra");
        assert_eq!(export_name("old-items.csv"), "olditems");
        assert_eq!(export_name("noext"), "noext");
    }

    #[test]
    fn test_memory_source_bounds() {
        let src = MemorySource::from_rows("t", &[&["a", ""], &["1"]]);
        assert_eq!(src.row_count(), 2);
        assert_eq!(src.column_count(), 2);
        assert_eq!(src.cell(0, 0), Value::Str("a".into()));
        assert_eq!(src.cell(0, 1), Value::Null);
        assert_eq!(src.cell(1, 1), Value::Null);
        assert_eq!(src.cell(9, 9), Value::Null);
    }

    #[test]
    fn test_header_cell_strips_spaces() {
        let src = MemorySource::from_rows("t", &[&[" my field ", "int []"]]);
        assert_eq!(src.header_cell(0, 0), "myfield");
        assert_eq!(src.header_cell(0, 1), "int[]");
    }
}
