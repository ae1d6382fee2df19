//! Dense and compressed-sparse-row (CSR) matrix sheets.
//!
//! A matrix sheet stores a 2-D grid with row/column headers:
//!
//! ```text
//! | matrix(csr) |     |     |      <- row 0: sentinel
//! |             | int | 10  | 20 | <- row 1: element type + col_head
//! | 100         | 0   | 5   |    | <- rows 2..: row_head + data cells
//! | 200         | 0   | 0   |    |
//! ```
//!
//! The dense form flattens all data cells row-major. The CSR form stores a
//! row directory followed by `(column, value)` pairs so a consumer can jump
//! to a row's slice without materializing zeros:
//!
//! - `matrix[0]` — number of rows holding at least one nonzero cell (`R`).
//! - `matrix[1 .. 1 + 2R]` — `(row_index, pointer)` pairs; `pointer` is the
//!   absolute element offset of that row's value slice.
//! - `matrix[1 + 2R ..]` — per nonzero row, interleaved `(column, value)`
//!   pairs in column order.
//!
//! Row and column indices are zero-based relative to the data region (the
//! header row and column are excluded).

use crate::models::{FieldDescriptor, FieldKind, MatrixPayload, SheetData};
use crate::source::CellSource;
use crate::value::{convert, PrimitiveType, Value};

/// Parse a matrix sheet into its payload plus synthesized descriptors.
pub fn parse_matrix(
    source: &dyn CellSource,
    sentinel: &str,
    csr: bool,
) -> (Vec<FieldDescriptor>, SheetData) {
    let elem = PrimitiveType::resolve(&source.header_cell(1, 1)).unwrap_or(PrimitiveType::Int);

    let rows = source.row_count();
    let cols = source.column_count();

    let grid: Vec<Vec<Value>> = (2..rows)
        .map(|r| (2..cols).map(|c| convert(&source.cell(r, c), elem)).collect())
        .collect();

    let matrix = if csr { encode_csr(&grid) } else { encode_dense(&grid) };

    let col_head = (2..cols).map(|c| convert(&source.cell(1, c), elem)).collect();
    let row_head = (2..rows).map(|r| convert(&source.cell(r, 1), elem)).collect();

    let array_type = format!("{}[]", elem.token());
    let fields = vec![
        synthesized("type", sentinel, FieldKind::Scalar(PrimitiveType::Str), 0),
        synthesized("row_head", &array_type, array_kind(elem), 0),
        synthesized("col_head", &array_type, array_kind(elem), 1),
        synthesized("matrix", &array_type, array_kind(elem), 2),
    ];

    (fields, SheetData::Matrix(MatrixPayload { elem, row_head, col_head, matrix }))
}

fn array_kind(elem: PrimitiveType) -> FieldKind {
    FieldKind::Array { elem, delim: ",".to_string() }
}

fn synthesized(name: &str, declared: &str, kind: FieldKind, position: usize) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        declared: declared.to_string(),
        kind,
        position,
        filter_tag: String::new(),
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Flatten a dense grid row-major.
pub fn encode_dense(grid: &[Vec<Value>]) -> Vec<Value> {
    grid.iter().flat_map(|row| row.iter().cloned()).collect()
}

/// Encode a grid in the CSR layout described in the module docs.
///
/// Pointers are computed in two phases: first as running offsets over the
/// value region alone, then shifted by the row-directory length (`2R`) once
/// the number of nonzero rows is known. Collapsing the phases into one pass
/// breaks the offsets whenever rows differ in nonzero count.
pub fn encode_csr(grid: &[Vec<Value>]) -> Vec<Value> {
    let mut mat = vec![Value::Int(0)];
    let mut col_items = Vec::new();
    let mut row_count: i64 = 0;
    let mut pointer: i64 = 1;

    for (r, row) in grid.iter().enumerate() {
        let mut nonzero: i64 = 0;
        for (c, val) in row.iter().enumerate() {
            if !val.is_zero() {
                nonzero += 1;
                col_items.push(Value::Int(c as i64));
                col_items.push(val.clone());
            }
        }
        if nonzero > 0 {
            row_count += 1;
            mat.push(Value::Int(r as i64));
            mat.push(Value::Int(pointer));
            pointer += nonzero * 2;
        }
    }

    for i in 0..row_count as usize {
        if let Value::Int(p) = &mut mat[i * 2 + 2] {
            *p += row_count * 2;
        }
    }

    mat[0] = Value::Int(row_count);
    mat.extend(col_items);
    mat
}

/// Expand a CSR sequence back into a dense `rows` x `cols` grid.
///
/// Malformed entries are skipped; absent cells hold the element type's
/// default value.
pub fn decode_csr(
    flat: &[Value],
    rows: usize,
    cols: usize,
    elem: PrimitiveType,
) -> Vec<Vec<Value>> {
    let mut dense = vec![vec![elem.default_value(); cols]; rows];

    let nonzero_rows = match flat.first().and_then(as_index) {
        Some(n) => n,
        None => return dense,
    };

    for i in 0..nonzero_rows {
        let row = flat.get(1 + i * 2).and_then(as_index);
        let start = flat.get(2 + i * 2).and_then(as_index);
        let (Some(row), Some(start)) = (row, start) else {
            continue;
        };
        let end = if i + 1 < nonzero_rows {
            flat.get(2 + (i + 1) * 2).and_then(as_index).unwrap_or(flat.len())
        } else {
            flat.len()
        };

        let mut offset = start;
        while offset + 1 < end.min(flat.len()) {
            if let (Some(col), Some(val)) = (flat.get(offset).and_then(as_index), flat.get(offset + 1)) {
                if row < rows && col < cols {
                    dense[row][col] = val.clone();
                }
            }
            offset += 2;
        }
    }

    dense
}

fn as_index(v: &Value) -> Option<usize> {
    match v {
        Value::Int(i) if *i >= 0 => Some(*i as usize),
        Value::Float(f) if *f >= 0.0 => Some(*f as usize),
        _ => None,
    }
}
