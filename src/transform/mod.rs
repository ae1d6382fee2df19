//! Cross-sheet transformation passes and pipeline orchestration.
//!
//! These passes run after every sheet is parsed, in pipeline order:
//!
//! - `resolver`: foreign-key joins against materialized target sheets
//! - `filter`: field removal by filter-tag predicate
//! - `merger`: `name_0, name_1, ...` collapse into array fields
//! - `assembler`: final data and meta documents
//! - `pipeline`: orchestration, drift gate, artifact writing

pub mod assembler;
pub mod filter;
pub mod merger;
pub mod pipeline;
pub mod resolver;

// Re-exports for convenience
pub use pipeline::{
    compile_dir, compile_sources, write_artifacts, Compilation, CompileOptions, SplitMode,
    WriteOptions,
};
pub use resolver::{resolve, ResolveOutcome};
