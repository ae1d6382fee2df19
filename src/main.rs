//! Tabforge CLI - Compile CSV sheets to JSON configuration
//!
//! # Main Commands
//!
//! ```bash
//! tabforge compile ./sheets             # Compile a directory of CSV sheets
//! tabforge compile ./sheets --filter -s # Drop server-tagged fields
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! tabforge parse npc.csv                # Parse one sheet and print its data
//! tabforge meta ./sheets                # Print the computed meta document
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use tabforge::{
    compile_dir, compile_sources, parse_sheet, write_artifacts, CellSource, CompileError,
    CompileOptions, CsvSource, SheetData, SplitMode, Value, WriteOptions,
};

#[derive(Parser)]
#[command(name = "tabforge")]
#[command(about = "Compile typed CSV sheets to JSON configuration artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full compilation: parse, resolve, filter, merge, write artifacts
    Compile {
        /// Directory holding the CSV sheets
        dir: PathBuf,

        /// Filter-tag token (e.g. "s", "-s", "+s", "*", "-*")
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Comma-separated filenames to ignore (case-insensitive)
        #[arg(long, default_value = "")]
        ignore: String,

        /// Directory the data files are written to (default: the sheet dir)
        #[arg(short, long)]
        export_dir: Option<PathBuf>,

        /// Filename of the merged data document
        #[arg(short, long, default_value = "config.json")]
        output: String,

        /// How to split the data document: merged, file, or sheet
        #[arg(long, default_value = "merged")]
        split: String,

        /// Path of the persisted meta document (default: <dir>/.meta.json)
        #[arg(long)]
        meta: Option<PathBuf>,
    },

    /// Parse a single CSV sheet and print its materialized data
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a directory and print the meta document
    Meta {
        /// Directory holding the CSV sheets
        dir: PathBuf,

        /// Comma-separated filenames to ignore (case-insensitive)
        #[arg(long, default_value = "")]
        ignore: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { dir, filter, ignore, export_dir, output, split, meta } => {
            cmd_compile(&dir, filter, &ignore, export_dir, output, &split, meta)
        }
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
        Commands::Meta { dir, ignore } => cmd_meta(&dir, &ignore),
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        if let Some(CompileError::SchemaDrift { items }) = e.downcast_ref::<CompileError>() {
            eprintln!("\nThese field definitions changed since the last run:");
            for item in items {
                eprintln!("  - {}", item);
            }
            eprintln!(
                "\nPlease review them carefully. If the change is intended, delete the \
                 meta file and compile again."
            );
        }
        std::process::exit(1);
    }
}

fn split_ignore(ignore: &str) -> Vec<String> {
    ignore
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_split(split: &str) -> Result<SplitMode, Box<dyn std::error::Error>> {
    match split {
        "merged" => Ok(SplitMode::Merged),
        "file" => Ok(SplitMode::PerFile),
        "sheet" => Ok(SplitMode::PerSheet),
        other => Err(format!("Unknown split mode '{}'; use merged, file or sheet", other).into()),
    }
}

fn cmd_compile(
    dir: &Path,
    filter: String,
    ignore: &str,
    export_dir: Option<PathBuf>,
    output: String,
    split: &str,
    meta: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Compiling: {}", dir.display());

    let options = CompileOptions { filter, ignore: split_ignore(ignore) };
    let compilation = compile_dir(dir, &options)?;

    if !compilation.resolve_errors.is_empty() {
        eprintln!(
            "⚠ {} foreign-key problem(s); affected fields are null",
            compilation.resolve_errors.len()
        );
    }

    let write_options = WriteOptions {
        export_dir: export_dir.unwrap_or_else(|| dir.to_path_buf()),
        merged_filename: output,
        split: parse_split(split)?,
        meta_path: meta.unwrap_or_else(|| dir.join(".meta.json")),
    };
    let written = write_artifacts(&compilation, &write_options)?;

    for path in &written {
        eprintln!("  → {}", path.display());
    }
    eprintln!("✓ Compiled {} export(s)", compilation.data.len());
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Parsing: {}", input.display());

    let source = CsvSource::from_path(input)?;
    eprintln!("  Encoding: {}", source.encoding());
    eprintln!(
        "  Delimiter: '{}'",
        match source.delimiter() {
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        }
    );

    let sheet = parse_sheet(&source)
        .ok_or_else(|| format!("{}: no usable fields", input.display()))?;
    eprintln!("  Container: {}", sheet.kind.as_str());
    eprintln!(
        "  Fields: {}",
        sheet.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let value = match &sheet.data {
        SheetData::Rows(rows) => {
            Value::Array(rows.iter().cloned().map(Value::Map).collect())
        }
        SheetData::Single(record) => Value::Map(record.clone()),
        SheetData::Matrix(payload) => json_matrix(payload),
    };
    let text = serde_json::to_string_pretty(&value)?;
    write_output(&text, output)?;
    Ok(())
}

fn json_matrix(payload: &tabforge::MatrixPayload) -> Value {
    let mut map = tabforge::Record::new();
    map.insert("matrix".to_string(), Value::Array(payload.matrix.clone()));
    map.insert("col_head".to_string(), Value::Array(payload.col_head.clone()));
    map.insert("row_head".to_string(), Value::Array(payload.row_head.clone()));
    Value::Map(map)
}

fn cmd_meta(dir: &Path, ignore: &str) -> Result<(), Box<dyn std::error::Error>> {
    // meta JSON goes to stdout; keep pipeline logs out of it
    tabforge::logs::LOG_SINK.set_quiet(true);
    let sources = tabforge::load_dir(dir, &split_ignore(ignore))?;
    let compilation = compile_sources(
        sources.iter().map(|s| s as &dyn CellSource),
        &CompileOptions::default(),
    )?;
    println!("{}", serde_json::to_string_pretty(&compilation.meta)?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("  → {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
