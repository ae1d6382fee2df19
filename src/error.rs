//! Error types for the Tabforge compilation pipeline.
//!
//! This module defines one error enum per pipeline concern:
//!
//! - [`SourceError`] - reading and decoding tabular sources
//! - [`TypeError`] - value coercion to an unsupported target type
//! - [`ResolveError`] - cross-sheet foreign-key resolution
//! - [`CompileError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Most schema problems are deliberately *not* errors: a malformed field
//! name or type in a header skips the column, and a cell that cannot be
//! coerced degrades to the type's default value. The only hard stop is
//! [`CompileError::SchemaDrift`], which blocks the artifact write.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading a tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the underlying file.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// The byte content could not be decoded as text.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed delimited input.
    #[error("Invalid tabular input: {0}")]
    Parse(String),

    /// The source holds no rows at all.
    #[error("Source is empty")]
    Empty,
}

// =============================================================================
// Type Errors
// =============================================================================

/// Errors during value coercion.
///
/// Coercion between the supported primitives never fails; this fires only
/// when a conversion is requested for a token outside the primitive set.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The target type token is not a supported primitive.
    #[error("Unsupported target type '{0}'. Only int/float/bool/string are supported")]
    Unsupported(String),
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors during foreign-key resolution.
///
/// These are collected and reported, never propagated: the offending field
/// resolves to null (or is left raw) and the run continues.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The referenced sheet does not exist.
    #[error("Foreign sheet '{target}' referenced by {sheet}.{field} was not found")]
    TargetMissing {
        sheet: String,
        field: String,
        target: String,
    },

    /// The referenced sheet is not a list or dict container.
    #[error("Foreign sheet '{target}' referenced by {sheet}.{field} must be a 'list' or 'dict' container")]
    WrongContainer {
        sheet: String,
        field: String,
        target: String,
    },

    /// No target record matched the condition values.
    #[error("No match in '{target}' for {sheet}.{field} with conditions {conditions:?}")]
    NoMatch {
        sheet: String,
        field: String,
        target: String,
        conditions: Vec<String>,
    },
}

// =============================================================================
// Compile Errors (top-level)
// =============================================================================

/// Top-level compilation errors.
///
/// This is the main error type returned by [`crate::transform::pipeline`].
#[derive(Debug, Error)]
pub enum CompileError {
    /// Source reading error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Filesystem error while reading inputs or writing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The computed meta differs from the persisted prior meta.
    ///
    /// Nothing has been written. `items` lists the changed fields as
    /// `filename.fieldname`.
    #[error("Schema drift detected in {} field(s): {}", items.len(), items.join(", "))]
    SchemaDrift { items: Vec<String> },

    /// No sheet survived parsing.
    #[error("No sheets to compile")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
