//! High-level compilation pipeline.
//!
//! Combines all steps: sheet parsing, foreign-key resolution, field
//! filtering, indexed-field merging, document assembly, and the fail-closed
//! artifact write guarded by schema-drift detection.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabforge::{compile_dir, CompileOptions};
//!
//! let compilation = compile_dir("./sheets", &CompileOptions::default())?;
//! println!("{} sheets compiled", compilation.data.len());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{CompileError, CompileResult, ResolveError};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::meta::{self, MetaMap, MetaStore};
use crate::models::SheetRecord;
use crate::parser::parse_sheet;
use crate::source::csv::load_dir;
use crate::source::CellSource;
use crate::value::Value;

use super::{assembler, filter, merger, resolver};

/// Options for a compilation run.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Filter-tag token; empty disables filtering.
    pub filter: String,
    /// Source filenames to skip, case-insensitive.
    pub ignore: Vec<String>,
}

/// Result of a compilation run, before any artifact is written.
#[derive(Debug)]
pub struct Compilation {
    /// Export name to materialized value; lookup sheets omitted.
    pub data: IndexMap<String, Value>,
    /// Export name to sheet meta, covering lookup sheets too.
    pub meta: MetaMap,
    /// Foreign-key resolution problems encountered (non-fatal).
    pub resolve_errors: Vec<ResolveError>,
}

/// Compile a set of parsed-ready cell sources.
///
/// All sheets are parsed before any cross-sheet pass runs; resolution reads
/// other sheets' materialized rows. The passes run in pipeline order:
/// resolve, filter (when a token is set), merge, assemble.
pub fn compile_sources<'a, I>(sources: I, options: &CompileOptions) -> CompileResult<Compilation>
where
    I: IntoIterator<Item = &'a dyn CellSource>,
{
    let mut sheets: IndexMap<String, SheetRecord> = IndexMap::new();
    for source in sources {
        let Some(sheet) = parse_sheet(source) else {
            continue;
        };
        if let Some(existing) = sheets.get(&sheet.name) {
            log_error(format!(
                "Duplicate sheet '{}': {} collides with {}; keeping the first",
                sheet.name, sheet.filename, existing.filename
            ));
            continue;
        }
        sheets.insert(sheet.name.clone(), sheet);
    }
    if sheets.is_empty() {
        return Err(CompileError::EmptyInput);
    }
    log_success(format!("Parsed {} sheet(s)", sheets.len()));

    log_info("Resolving foreign keys...");
    let outcome = resolver::resolve(&mut sheets);
    if !outcome.errors.is_empty() {
        log_warning(format!("{} resolution problem(s)", outcome.errors.len()));
    }

    if !options.filter.is_empty() {
        log_info(format!("Filtering fields with '{}'", options.filter));
        filter::apply(&mut sheets, &options.filter);
    }

    merger::merge_indexed_fields(&mut sheets);

    let data = assembler::assemble_data(&sheets, &outcome.lookup_sheets);
    let meta = assembler::assemble_meta(&sheets);
    log_success(format!("Assembled {} export(s)", data.len()));

    Ok(Compilation { data, meta, resolve_errors: outcome.errors })
}

/// Compile every admissible CSV file in a directory.
pub fn compile_dir(dir: impl AsRef<Path>, options: &CompileOptions) -> CompileResult<Compilation> {
    let sources = load_dir(dir, &options.ignore)?;
    log_info(format!("Loaded {} source file(s)", sources.len()));
    compile_sources(sources.iter().map(|s| s as &dyn CellSource), options)
}

// =============================================================================
// Artifact writing
// =============================================================================

/// How the data document is split across output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Everything in one file.
    Merged,
    /// One file per source file, holding all of its sheets.
    PerFile,
    /// One file per sheet.
    PerSheet,
}

/// Options for the artifact write stage.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Directory the data files are written to.
    pub export_dir: PathBuf,
    /// Filename of the merged data document.
    pub merged_filename: String,
    /// Split mode.
    pub split: SplitMode,
    /// Path of the persisted meta document.
    pub meta_path: PathBuf,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("."),
            merged_filename: "config.json".to_string(),
            split: SplitMode::Merged,
            meta_path: PathBuf::from(".meta.json"),
        }
    }
}

/// Write the data and meta documents, guarded by drift detection.
///
/// When the computed meta differs from the persisted prior meta in any
/// field's recorded type, nothing is written and the changed
/// `filename.fieldname` items are returned in
/// [`CompileError::SchemaDrift`]. Delete or review the prior meta file to
/// accept the change.
pub fn write_artifacts(
    compilation: &Compilation,
    options: &WriteOptions,
) -> CompileResult<Vec<PathBuf>> {
    if let Some(prior) = MetaStore::load(&options.meta_path)? {
        let items = meta::diff(&prior, &compilation.meta);
        if !items.is_empty() {
            return Err(CompileError::SchemaDrift { items });
        }
    }

    fs::create_dir_all(&options.export_dir)?;
    MetaStore::save(&options.meta_path, &compilation.meta)?;
    let mut written = vec![options.meta_path.clone()];

    match options.split {
        SplitMode::Merged => {
            let path = options.export_dir.join(&options.merged_filename);
            fs::write(&path, serde_json::to_string(&compilation.data)?)?;
            written.push(path);
        }
        SplitMode::PerSheet => {
            for (name, value) in &compilation.data {
                let path = options.export_dir.join(format!("{}.json", name));
                fs::write(&path, serde_json::to_string(value)?)?;
                written.push(path);
            }
        }
        SplitMode::PerFile => {
            for (filename, pack) in group_by_file(compilation) {
                let path = options.export_dir.join(format!("{}.json", filename));
                fs::write(&path, serde_json::to_string(&pack)?)?;
                written.push(path);
            }
        }
    }

    log_success(format!("Wrote {} file(s)", written.len()));
    Ok(written)
}

/// Group exported sheets by their source file's export name.
fn group_by_file(compilation: &Compilation) -> IndexMap<String, IndexMap<String, &Value>> {
    let mut groups: IndexMap<String, IndexMap<String, &Value>> = IndexMap::new();
    for (name, meta) in &compilation.meta {
        if let Some(value) = compilation.data.get(name) {
            groups
                .entry(meta.filename.clone())
                .or_default()
                .insert(name.clone(), value);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn items_source(id_type: &str) -> MemorySource {
        MemorySource::from_rows(
            "Items",
            &[
                &["dict"],
                &["id", "name"],
                &[id_type, "string"],
                &["1", "sword"],
                &["2", "bow"],
            ],
        )
    }

    fn npc_source() -> MemorySource {
        MemorySource::from_rows(
            "npc",
            &[
                &["list"],
                &["id", "loot_1", "loot_0", "drop"],
                &["int", "int", "int", "Items|id"],
                &["7", "2", "1", "1"],
            ],
        )
    }

    fn compile_pair(id_type: &str) -> Compilation {
        let items = items_source(id_type);
        let npc = npc_source();
        let sources: Vec<&dyn CellSource> = vec![&items, &npc];
        compile_sources(sources, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_full_pipeline_resolves_merges_and_excludes() {
        let compilation = compile_pair("int");

        // the lookup sheet is excluded from data but kept in meta
        assert!(compilation.data.get("Items").is_none());
        assert!(compilation.meta.contains_key("Items"));

        let Value::Array(rows) = &compilation.data["npc"] else {
            panic!("expected npc rows");
        };
        let Value::Map(npc) = &rows[0] else { panic!() };

        // foreign key resolved to the embedded record
        let Value::Map(drop) = &npc["drop"] else {
            panic!("expected resolved reference");
        };
        assert_eq!(drop["name"], Value::Str("sword".into()));

        // indexed fields merged in suffix order
        assert_eq!(npc["loot"], Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert!(compilation.resolve_errors.is_empty());
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let sources: Vec<&dyn CellSource> = Vec::new();
        let result = compile_sources(sources, &CompileOptions::default());
        assert!(matches!(result, Err(CompileError::EmptyInput)));
    }

    #[test]
    fn test_duplicate_sheet_keeps_first() {
        let a = items_source("int");
        let b = items_source("string").with_filename("Items2.csv");
        let sources: Vec<&dyn CellSource> = vec![&a, &b];
        let compilation = compile_sources(sources, &CompileOptions::default()).unwrap();
        assert_eq!(compilation.meta["Items"].fields[0].ty, "int");
    }

    #[test]
    fn test_filter_option_applied() {
        let source = MemorySource::from_rows(
            "cfg",
            &[
                &["list"],
                &["id", "server_only"],
                &["int", "string"],
                &["", "*s"],
                &["1", "secret"],
            ],
        );
        let sources: Vec<&dyn CellSource> = vec![&source];
        let options = CompileOptions { filter: "-s".to_string(), ignore: Vec::new() };
        let compilation = compile_sources(sources, &options).unwrap();

        let Value::Array(rows) = &compilation.data["cfg"] else { panic!() };
        let Value::Map(row) = &rows[0] else { panic!() };
        assert!(row.get("server_only").is_none());
        assert_eq!(compilation.meta["cfg"].fields.len(), 1);
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tabforge-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_options(dir: &Path) -> WriteOptions {
        WriteOptions {
            export_dir: dir.to_path_buf(),
            merged_filename: "config.json".to_string(),
            split: SplitMode::Merged,
            meta_path: dir.join(".meta.json"),
        }
    }

    #[test]
    fn test_drift_blocks_every_write() {
        let dir = temp_dir("drift");
        let options = write_options(&dir);

        // first run persists data + meta
        let first = compile_pair("int");
        write_artifacts(&first, &options).unwrap();
        let config = fs::read_to_string(dir.join("config.json")).unwrap();

        // recompile with Items.id changed int -> string
        let second = compile_pair("string");
        let err = write_artifacts(&second, &options).unwrap_err();
        let CompileError::SchemaDrift { items } = err else {
            panic!("expected drift error");
        };
        assert_eq!(items, vec!["Items.id"]);

        // nothing was overwritten
        assert_eq!(fs::read_to_string(dir.join("config.json")).unwrap(), config);
        let prior = MetaStore::load(dir.join(".meta.json")).unwrap().unwrap();
        assert_eq!(prior["Items"].fields[0].ty, "int");
    }

    #[test]
    fn test_unchanged_meta_writes_cleanly_twice() {
        let dir = temp_dir("rewrite");
        let options = write_options(&dir);
        let compilation = compile_pair("int");
        write_artifacts(&compilation, &options).unwrap();
        write_artifacts(&compilation, &options).unwrap();
    }

    #[test]
    fn test_per_sheet_split_writes_one_file_per_export() {
        let dir = temp_dir("split");
        let mut options = write_options(&dir);
        options.split = SplitMode::PerSheet;

        let compilation = compile_pair("int");
        let written = write_artifacts(&compilation, &options).unwrap();

        // meta + npc.json (Items is a lookup sheet and exports nothing)
        assert_eq!(written.len(), 2);
        assert!(dir.join("npc.json").is_file());
        assert!(!dir.join("Items.json").exists());
    }

    #[test]
    fn test_grouping_by_source_file() {
        let compilation = compile_pair("int");
        let groups = group_by_file(&compilation);
        assert_eq!(groups.len(), 1);
        assert!(groups["npc"].contains_key("npc"));
    }
}
