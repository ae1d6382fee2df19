//! Domain models for the Tabforge compilation pipeline.
//!
//! This module contains the data structures threaded through the pipeline:
//!
//! - [`ContainerKind`] - the shape a sheet compiles to
//! - [`FieldDescriptor`] - one typed column declaration
//! - [`FieldKind`] - the parsed form of a declared type expression
//! - [`ForeignKeySpec`] - a cross-sheet join declaration
//! - [`SheetRecord`] - one fully parsed sheet with its materialized data
//! - [`MatrixPayload`] - dense or CSR matrix data
//!
//! Type expressions are parsed exactly once, when the descriptor is built;
//! everything downstream matches on the closed [`FieldKind`] union instead
//! of re-inspecting strings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::{PrimitiveType, Record, Value};

/// Field names must be plain identifiers.
static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Foreign-key expression: `Sheet|k1,k2`, `Sheet[]|k`, `Sheet{}|k`.
static QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9]+)(\[\]|\{\})?\|([A-Za-z0-9_]+(?:,[A-Za-z0-9_]+)*)$").unwrap()
});

/// True if `name` is a legal field name.
pub fn is_identifier(name: &str) -> bool {
    IDENT_RE.is_match(name)
}

// =============================================================================
// Container kinds
// =============================================================================

/// The shape a sheet compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Array of records.
    List,
    /// Map of records keyed by the first field's value.
    Dict,
    /// A single record, one field per row.
    Object,
    /// Dense 2-D grid.
    Matrix,
    /// Compressed-sparse-row 2-D grid.
    MatrixCsr,
}

impl ContainerKind {
    /// Read a container kind from the sentinel cell.
    ///
    /// Unrecognized tokens fall back to `List`; never an error.
    pub fn parse(sentinel: &str) -> Self {
        let token = sentinel.trim().to_lowercase();
        if token == "matrix(csr)" {
            ContainerKind::MatrixCsr
        } else if token.starts_with("matrix") {
            ContainerKind::Matrix
        } else {
            match token.as_str() {
                "dict" => ContainerKind::Dict,
                "object" => ContainerKind::Object,
                _ => ContainerKind::List,
            }
        }
    }

    /// The token written to the meta document.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::List => "list",
            ContainerKind::Dict => "dict",
            ContainerKind::Object => "object",
            ContainerKind::Matrix => "matrix",
            ContainerKind::MatrixCsr => "matrix(csr)",
        }
    }

    /// Only list and dict sheets hold row collections.
    pub fn has_rows(&self) -> bool {
        matches!(self, ContainerKind::List | ContainerKind::Dict)
    }
}

// =============================================================================
// Foreign keys
// =============================================================================

/// Result cardinality of a foreign-key join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// First match, embedded as an object.
    Object,
    /// All matches, in target order.
    List,
    /// All matches, keyed by the target's primary key.
    Dict,
}

/// A cross-sheet join declaration, derived once from the type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    /// Name of the sheet to join against.
    pub target_sheet: String,
    /// Target field names the condition values are matched against, in order.
    pub keys: Vec<String>,
    /// Shape of the join result.
    pub cardinality: Cardinality,
}

// =============================================================================
// Field descriptors
// =============================================================================

/// The parsed form of a declared field type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A single primitive cell.
    Scalar(PrimitiveType),
    /// A delimited array of primitives.
    Array { elem: PrimitiveType, delim: String },
    /// A foreign-key query, resolved after all sheets are parsed.
    Query(ForeignKeySpec),
}

impl FieldKind {
    /// Parse a declared type expression.
    ///
    /// Recognizes, in order: a primitive token, `<primitive>[]<delim>`
    /// (default delimiter `,`), and a foreign-key expression
    /// `Sheet[suffix]|k1,k2`. Returns `None` for anything else, which makes
    /// the parser skip the column.
    pub fn parse(expr: &str) -> Option<Self> {
        if let Some(ty) = PrimitiveType::resolve(expr) {
            return Some(FieldKind::Scalar(ty));
        }
        if let Some(idx) = expr.find("[]") {
            if let Some(elem) = PrimitiveType::resolve(&expr[..idx]) {
                let rest = &expr[idx + 2..];
                let delim = if rest.is_empty() { "," } else { rest };
                return Some(FieldKind::Array { elem, delim: delim.to_string() });
            }
        }
        if let Some(caps) = QUERY_RE.captures(expr) {
            let cardinality = match caps.get(2).map(|m| m.as_str()) {
                Some("[]") => Cardinality::List,
                Some("{}") => Cardinality::Dict,
                _ => Cardinality::Object,
            };
            return Some(FieldKind::Query(ForeignKeySpec {
                target_sheet: caps[1].to_string(),
                keys: caps[3].split(',').map(str::to_string).collect(),
                cardinality,
            }));
        }
        None
    }
}

/// One typed column (or object row) declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name; always a plain identifier.
    pub name: String,
    /// The raw declared type expression, kept for the meta document.
    pub declared: String,
    /// Parsed type expression.
    pub kind: FieldKind,
    /// Source column (list/dict) or row (object) index.
    pub position: usize,
    /// Filter tag with the `*` marker stripped; empty when untagged.
    pub filter_tag: String,
}

impl FieldDescriptor {
    /// Build a descriptor from header cells.
    ///
    /// Returns `None` when the name is not an identifier or the type
    /// expression is not recognized; malformed columns are skipped, not
    /// errors.
    pub fn new(name: &str, declared: &str, position: usize, filter_tag: &str) -> Option<Self> {
        if !is_identifier(name) {
            return None;
        }
        let kind = FieldKind::parse(declared)?;
        Some(Self {
            name: name.to_string(),
            declared: declared.to_string(),
            kind,
            position,
            filter_tag: filter_tag.to_string(),
        })
    }

    /// The join spec, for query fields.
    pub fn foreign_key(&self) -> Option<&ForeignKeySpec> {
        match &self.kind {
            FieldKind::Query(spec) => Some(spec),
            _ => None,
        }
    }

    /// The type string written to the meta document: query expressions are
    /// truncated to the target-sheet token.
    pub fn meta_type(&self) -> String {
        match self.declared.split_once('|') {
            Some((head, _)) => head.to_string(),
            None => self.declared.clone(),
        }
    }
}

// =============================================================================
// Sheets
// =============================================================================

/// Dense or CSR matrix data plus its headers.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixPayload {
    /// Element type of the grid.
    pub elem: PrimitiveType,
    /// First data column, top to bottom.
    pub row_head: Vec<Value>,
    /// First data row, left to right.
    pub col_head: Vec<Value>,
    /// Flattened cell data; see the CSR codec for the sparse layout.
    pub matrix: Vec<Value>,
}

/// Materialized data of one sheet.
///
/// Dict sheets keep `Rows` through the whole pipeline; re-keying by the
/// primary field happens at assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetData {
    Rows(Vec<Record>),
    Single(Record),
    Matrix(MatrixPayload),
}

/// One fully parsed sheet.
#[derive(Debug, Clone)]
pub struct SheetRecord {
    /// Export name (file stem with `+`/`-` stripped).
    pub name: String,
    /// Source file name, for diagnostics and the meta document.
    pub filename: String,
    /// Container shape.
    pub kind: ContainerKind,
    /// Ordered field declarations; order equals sheet column order.
    pub fields: Vec<FieldDescriptor>,
    /// Materialized data.
    pub data: SheetData,
}

impl SheetRecord {
    /// Row collection of a list/dict sheet.
    pub fn rows(&self) -> Option<&Vec<Record>> {
        match &self.data {
            SheetData::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Mutable row collection of a list/dict sheet.
    pub fn rows_mut(&mut self) -> Option<&mut Vec<Record>> {
        match &mut self.data {
            SheetData::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// The descriptor with the given field name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the primary-key field (the first declared field).
    pub fn primary_key(&self) -> Option<&str> {
        self.fields.first().map(|f| f.name.as_str())
    }
}
