//! # Tabforge - spreadsheet-to-JSON configuration compiler
//!
//! Tabforge compiles tabular, human-authored spreadsheet data (CSV sheets
//! with typed headers) into machine-readable configuration artifacts: a
//! data document plus a schema/meta document, for consumption by game or
//! service configuration loaders.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  CSV sheets │────▶│   Parser    │────▶│  Transforms  │────▶│  data.json  │
//! │ (typed hdrs)│     │ (auto-enc)  │     │ (join/merge) │     │  meta.json  │
//! └─────────────┘     └─────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! Every sheet parses independently into a typed record collection; then the
//! cross-sheet passes run: foreign-key resolution, tag filtering, indexed
//! field merging. Assembly produces the two documents, and the write stage
//! refuses to overwrite anything when a field's recorded type drifted from
//! the previous run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabforge::{compile_dir, write_artifacts, CompileOptions, WriteOptions};
//!
//! fn main() -> Result<(), tabforge::CompileError> {
//!     let compilation = compile_dir("./sheets", &CompileOptions::default())?;
//!     write_artifacts(&compilation, &WriteOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - error taxonomy
//! - [`value`] - primitive type system and value coercion
//! - [`models`] - field descriptors, foreign keys, sheet records
//! - [`source`] - cell sources (CSV and in-memory)
//! - [`parser`] - header and container parsing, matrix codec
//! - [`transform`] - cross-sheet passes and the pipeline
//! - [`meta`] - meta document, persistence, drift detection

// Core modules
pub mod error;
pub mod logs;
pub mod models;
pub mod value;

// Sources
pub mod source;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Meta / drift
pub mod meta;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CompileError, CompileResult, ResolveError, SourceError, TypeError};

// =============================================================================
// Re-exports - Core model
// =============================================================================

pub use models::{
    Cardinality, ContainerKind, FieldDescriptor, FieldKind, ForeignKeySpec, MatrixPayload,
    SheetData, SheetRecord,
};
pub use value::{convert, convert_array, convert_token, PrimitiveType, Record, Value};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::csv::{load_dir, CsvSource};
pub use source::{CellSource, MemorySource};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::matrix::{decode_csr, encode_csr, encode_dense};
pub use parser::parse_sheet;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    compile_dir, compile_sources, write_artifacts, Compilation, CompileOptions, SplitMode,
    WriteOptions,
};

// =============================================================================
// Re-exports - Meta
// =============================================================================

pub use meta::{FieldMeta, MetaMap, MetaStore, SheetMeta};
