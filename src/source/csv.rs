//! CSV-backed cell source with encoding and delimiter auto-detection.
//!
//! One CSV file is one sheet. Encoding is detected with chardet and decoded
//! via encoding_rs; the delimiter is chosen by counting candidate separators
//! in the first line.

use std::fs;
use std::path::Path;

use crate::error::{SourceError, SourceResult};
use crate::logs::log_error;
use crate::value::Value;

use super::{admissible_filename, export_name, CellSource};

/// Whether the file looks like a CSV input.
pub fn is_csv_file(filename: &str) -> bool {
    filename.ends_with(".csv") && !filename.contains('~')
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8_lossy(bytes).to_string()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        _ => {
            // Fallback: UTF-8 with lossy conversion
            Ok(String::from_utf8_lossy(bytes).to_string())
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// A cell source over one decoded CSV file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    name: String,
    filename: String,
    encoding: String,
    delimiter: char,
    grid: Vec<Vec<String>>,
}

impl CsvSource {
    /// Read a CSV file with auto-detection of encoding and delimiter.
    pub fn from_path(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self::from_bytes(&bytes, &filename)
    }

    /// Parse CSV bytes with auto-detection of encoding and delimiter.
    pub fn from_bytes(bytes: &[u8], filename: &str) -> SourceResult<Self> {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding)?;
        let delimiter = detect_delimiter(&content);
        Self::from_content(&content, filename, encoding, delimiter)
    }

    /// Parse decoded CSV content with an explicit delimiter.
    pub fn from_content(
        content: &str,
        filename: &str,
        encoding: String,
        delimiter: char,
    ) -> SourceResult<Self> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SourceError::Parse(e.to_string()))?;
            grid.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        if grid.is_empty() {
            return Err(SourceError::Empty);
        }

        Ok(Self {
            name: export_name(filename),
            filename: filename.to_string(),
            encoding,
            delimiter,
            grid,
        })
    }

    /// Detected or used encoding.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Detected or used delimiter.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

impl CellSource for CsvSource {
    fn sheet_name(&self) -> &str {
        &self.name
    }

    fn source_filename(&self) -> &str {
        &self.filename
    }

    fn row_count(&self) -> usize {
        self.grid.len()
    }

    fn column_count(&self) -> usize {
        self.grid.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn cell(&self, row: usize, col: usize) -> Value {
        match self.grid.get(row).and_then(|r| r.get(col)) {
            None => Value::Null,
            Some(s) if s.is_empty() => Value::Null,
            Some(s) => Value::Str(s.clone()),
        }
    }
}

/// Load every admissible CSV file in a directory, sorted by filename.
///
/// Files that fail to read are reported and skipped; the run continues with
/// the remaining inputs.
pub fn load_dir(dir: impl AsRef<Path>, ignore: &[String]) -> SourceResult<Vec<CsvSource>> {
    let mut names: Vec<String> = fs::read_dir(dir.as_ref())?
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| is_csv_file(name) && admissible_filename(name, ignore))
        .collect();
    names.sort();

    let mut sources = Vec::new();
    for name in names {
        match CsvSource::from_path(dir.as_ref().join(&name)) {
            Ok(source) => sources.push(source),
            Err(e) => log_error(format!("Skipping {}: {}", name, e)),
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_csv_file() {
        assert!(is_csv_file("items.csv"));
        assert!(!is_csv_file("items.xlsx"));
        assert!(!is_csv_file("~items.csv"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }

    #[test]
    fn test_grid_cells() {
        let src =
            CsvSource::from_content("list;;\nid;name;\nint;string;\n1;Jack;", "npc.csv", "utf-8".into(), ';')
                .unwrap();
        assert_eq!(src.sheet_name(), "npc");
        assert_eq!(src.cell(0, 0), Value::Str("list".into()));
        assert_eq!(src.cell(1, 1), Value::Str("name".into()));
        // empty and out-of-range cells are null
        assert_eq!(src.cell(0, 1), Value::Null);
        assert_eq!(src.cell(7, 7), Value::Null);
    }

    #[test]
    fn test_empty_input_is_error() {
        let result = CsvSource::from_content("", "x.csv", "utf-8".into(), ';');
        assert!(matches!(result, Err(SourceError::Empty)));
    }

    #[test]
    fn test_quoted_cells_are_unwrapped() {
        let src = CsvSource::from_content("\"a;x\";b\n1;2", "q.csv", "utf-8".into(), ';').unwrap();
        assert_eq!(src.cell(0, 0), Value::Str("a;x".into()));
        assert_eq!(src.cell(0, 1), Value::Str("b".into()));
    }

    #[test]
    fn test_auto_detection_from_bytes() {
        let src = CsvSource::from_bytes(b"id,name\n1,Jack\n", "t.csv").unwrap();
        assert_eq!(src.delimiter(), ',');
        assert_eq!(src.encoding(), "utf-8");
        assert_eq!(src.row_count(), 2);
    }
}
