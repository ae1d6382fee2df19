//! Sheet parsing: typed header region to field descriptors, then
//! container-specific materialization of the data region.
//!
//! Sheet layout (cell coordinates are zero-based):
//!
//! ```text
//! | list |      |       |        <- row 0: container sentinel at (0,0)
//! | id   | name | tags  |        <- row 1: field names
//! | int  | str  | int[] |        <- row 2: field types
//! | *s   |      |       |        <- row 3: filter row (only if marked)
//! | 1    | Jack | 1,2   |        <- data
//! ```
//!
//! Malformed columns (bad name, unknown type) are skipped silently; a sheet
//! that yields no descriptors at all is dropped. Parsing is per-sheet and
//! independent; cross-sheet passes run afterwards on the full sheet map.

pub mod matrix;

use crate::models::{ContainerKind, FieldDescriptor, FieldKind, SheetData, SheetRecord};
use crate::source::CellSource;
use crate::value::{convert, convert_array, Record, Value};

/// Marker character that flags a filter cell.
pub const FILTER_MARKER: char = '*';

/// Parse one sheet into a [`SheetRecord`].
///
/// Returns `None` for an empty source or a sheet that declares no usable
/// fields.
pub fn parse_sheet(source: &dyn CellSource) -> Option<SheetRecord> {
    if source.row_count() == 0 {
        return None;
    }
    let sentinel = cell_text(source, 0, 0);
    let kind = ContainerKind::parse(&sentinel);

    let (fields, data) = match kind {
        ContainerKind::List | ContainerKind::Dict => parse_rows(source),
        ContainerKind::Object => parse_object(source),
        ContainerKind::Matrix => matrix::parse_matrix(source, &sentinel, false),
        ContainerKind::MatrixCsr => matrix::parse_matrix(source, &sentinel, true),
    };

    if fields.is_empty() {
        return None;
    }

    Some(SheetRecord {
        name: source.sheet_name().to_string(),
        filename: source.source_filename().to_string(),
        kind,
        fields,
        data,
    })
}

/// A cell stringified and trimmed, with `Null` mapping to the empty string.
fn cell_text(source: &dyn CellSource, row: usize, col: usize) -> String {
    match source.cell(row, col) {
        Value::Null => String::new(),
        Value::Str(s) => s.trim().to_string(),
        other => other.key_string(),
    }
}

// =============================================================================
// List / Dict
// =============================================================================

/// Parse the header region and data rows of a list or dict sheet.
///
/// Data starts at row 3 and shifts to row 4 when any accepted column carries
/// a `*`-marked filter cell in row 3. Column order is preserved; the first
/// accepted column later serves as the dict primary key. A second column
/// with an already-seen name is skipped.
fn parse_rows(source: &dyn CellSource) -> (Vec<FieldDescriptor>, SheetData) {
    let mut fields: Vec<FieldDescriptor> = Vec::new();
    let mut data_start = 3;

    for col in 0..source.column_count() {
        let name = source.header_cell(1, col);
        if name.is_empty() {
            continue;
        }
        let declared = source.header_cell(2, col);
        if declared.is_empty() {
            continue;
        }

        let filter_cell = cell_text(source, 3, col);
        let tag = filter_cell.strip_prefix(FILTER_MARKER);

        let Some(field) = FieldDescriptor::new(&name, &declared, col, tag.unwrap_or("")) else {
            continue;
        };
        if fields.iter().any(|f| f.name == field.name) {
            continue;
        }
        if tag.is_some() {
            data_start = 4;
        }
        fields.push(field);
    }

    let mut rows = Vec::new();
    for row in data_start..source.row_count() {
        let mut record = Record::new();
        for field in &fields {
            let raw = source.cell(row, field.position);
            record.insert(field.name.clone(), cell_value(&raw, &field.kind));
        }
        rows.push(record);
    }

    (fields, SheetData::Rows(rows))
}

/// Materialize one cell according to the field's parsed kind.
///
/// Query fields keep their raw comma-split condition values; resolution
/// happens after all sheets are parsed.
fn cell_value(raw: &Value, kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Scalar(ty) => convert(raw, *ty),
        FieldKind::Array { elem, delim } => convert_array(raw, *elem, delim),
        FieldKind::Query(_) => split_conditions(raw),
    }
}

/// Split a query cell into its raw condition values.
fn split_conditions(raw: &Value) -> Value {
    let text = match raw {
        Value::Null => String::new(),
        Value::Str(s) => s.trim().to_string(),
        other => other.key_string(),
    };
    if text.is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(
        text.split(',')
            .map(|part| Value::Str(part.trim().to_string()))
            .collect(),
    )
}

// =============================================================================
// Object
// =============================================================================

/// Parse an object sheet: each data row declares one field.
///
/// Rows are `name | type | value`, or `name | type | filter | value` when a
/// scan-ahead finds any filter cell beginning with the marker. Only scalar
/// primitive types are accepted; other rows are skipped.
fn parse_object(source: &dyn CellSource) -> (Vec<FieldDescriptor>, SheetData) {
    let mut value_col = 2;
    for row in 1..source.row_count() {
        if cell_text(source, row, 2).starts_with(FILTER_MARKER) {
            value_col = 3;
            break;
        }
    }

    let mut fields: Vec<FieldDescriptor> = Vec::new();
    let mut record = Record::new();

    for row in 1..source.row_count() {
        let name = cell_text(source, row, 0);
        if name.is_empty() {
            continue;
        }
        let declared = cell_text(source, row, 1);
        if declared.is_empty() {
            continue;
        }
        let tag = if value_col == 3 {
            let cell = cell_text(source, row, 2);
            cell.strip_prefix(FILTER_MARKER).unwrap_or(&cell).to_string()
        } else {
            String::new()
        };

        let Some(field) = FieldDescriptor::new(&name, &declared, row, &tag) else {
            continue;
        };
        let FieldKind::Scalar(ty) = field.kind else {
            continue;
        };
        if fields.iter().any(|f| f.name == field.name) {
            continue;
        }

        let raw = source.cell(row, value_col);
        record.insert(field.name.clone(), convert(&raw, ty));
        fields.push(field);
    }

    (fields, SheetData::Single(record))
}
