//! gamedat - Convert fixed-layout binary game data
//!
//! This tool decodes binary game data files with built-in schemas and
//! writes them out as CSV files, and generates the C++ structs that load
//! those files again.

mod schemas;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gamedat_core::{
    dump_root, ArtifactWriter, BinaryReader, DataDefinition, DataFormatter, DirectoryWriter,
    ExportConfig, ExportFormat, Schema, StatsWriter,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Convert fixed-layout binary game data into CSV files and C++ structs
#[derive(Parser, Debug)]
#[command(name = "gamedat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Dry run - don't write files, just show what would be written
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print every artifact with a short content hash
    #[arg(long, global = true)]
    manifest: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate struct declarations and implementations of the built-in schemas
    Codegen(CodegenArgs),
    /// Decode binary files and export their data as CSV files
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct CodegenArgs {
    /// Output directory for generated sources
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputMode,

    /// Schema of the input files
    #[arg(long, value_enum, default_value = "drs")]
    schema: BuiltinSchema,

    /// Byte offset of the record inside each file
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Output directory for CSV files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Prefix prepended to every data file path
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single data file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of data files
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Schemas that can be decoded from binary files
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BuiltinSchema {
    /// DRS archive header and table directory
    Drs,
}

impl BuiltinSchema {
    fn schema(self) -> &'static Schema {
        match self {
            BuiltinSchema::Drs => schemas::drs_archive(),
        }
    }

    /// File extension picked up in directory mode
    fn extension(self) -> &'static str {
        match self {
            BuiltinSchema::Drs => "drs",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let cfg = ExportConfig::default();
    match &cli.command {
        Command::Codegen(args) => {
            let artifacts = generate_sources(&cfg)?;
            emit(&cli, &args.output, &artifacts)
        }
        Command::Convert(args) => {
            let artifacts = convert(args, &cfg)?;
            emit(&cli, &args.output, &artifacts)
        }
    }
}

/// Struct declarations and implementations of every built-in schema
fn generate_sources(cfg: &ExportConfig) -> Result<BTreeMap<String, String>> {
    let mut formatter = DataFormatter::new(cfg.clone());
    for schema in schemas::codegen_schemas() {
        let structs = schema
            .structs()
            .with_context(|| format!("Invalid schema: {}", schema.name_struct()))?;
        formatter.add_data(structs)?;
    }

    formatter
        .export(&[ExportFormat::Struct, ExportFormat::StructImpl])
        .context("Failed to generate sources")
}

/// Decodes every input file and exports the CSV artifacts
fn convert(args: &ConvertArgs, cfg: &ExportConfig) -> Result<BTreeMap<String, String>> {
    let schema = args.schema.schema();
    let mut definitions = Vec::new();

    if let Some(ref file) = args.input.file {
        if !file.is_file() {
            bail!("Input file does not exist: {}", file.display());
        }
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Input file has no usable name: {}", file.display()))?;
        definitions.extend(decode_file(file, name, schema, args.offset, cfg)?);
    } else if let Some(ref directory) = args.input.directory {
        if !directory.is_dir() {
            bail!("Directory does not exist: {}", directory.display());
        }
        info!("Scanning directory: {}", directory.display());

        let mut decoded = 0;
        for (path, name) in data_files(directory, args.schema.extension()) {
            match decode_file(&path, &name, schema, args.offset, cfg) {
                Ok(found) => {
                    definitions.extend(found);
                    decoded += 1;
                }
                // Log error but continue with other files
                Err(e) => warn!("Error processing {}: {:#}", path.display(), e),
            }
        }
        info!("Decoded {} files", decoded);
    } else {
        bail!("Either --file or --directory must be specified")
    }

    let mut formatter = DataFormatter::new(cfg.clone());
    match &args.prefix {
        Some(prefix) => formatter.add_data_with_prefix(definitions, prefix)?,
        None => formatter.add_data(definitions)?,
    }
    formatter
        .export(&[ExportFormat::Csv])
        .context("Failed to export data files")
}

/// Files below `directory` with the given extension, with their data names
///
/// The data name is the path relative to `directory` without extension.
fn data_files(directory: &Path, extension: &str) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches {
            trace!("Skipping {}", path.display());
            continue;
        }

        let Ok(relative) = path.strip_prefix(directory) else {
            continue;
        };
        let name = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((path.to_path_buf(), name));
    }
    files
}

/// Decodes one file and flattens it into data definitions named after `name`
fn decode_file(
    path: &Path,
    name: &str,
    schema: &Schema,
    offset: usize,
    cfg: &ExportConfig,
) -> Result<Vec<DataDefinition>> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let (end, record) = BinaryReader::new(&data)
        .read(schema, offset)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    debug!(
        "Decoded {} bytes of {} from {}",
        end - offset,
        schema.name_struct(),
        path.display()
    );

    dump_root(schema, &record, name, cfg)
        .with_context(|| format!("Failed to flatten {}", path.display()))
}

/// Compute a short hash of the content (first 8 chars of blake3)
fn content_hash(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes());
    hash.to_hex()[..8].to_string()
}

/// Prints, lists or writes the artifacts as requested
fn emit(cli: &Cli, output: &Path, artifacts: &BTreeMap<String, String>) -> Result<()> {
    if cli.manifest {
        for (path, content) in artifacts {
            println!("{}  {}", content_hash(content), path);
        }
    }

    if cli.dry_run {
        let mut stats = StatsWriter::default();
        stats.write_all(artifacts)?;
        for path in artifacts.keys() {
            println!("Would write: {}", output.join(path).display());
        }
        info!("Would write {} files ({} bytes)", stats.files, stats.bytes);
        return Ok(());
    }

    let mut writer = DirectoryWriter::new(output);
    writer
        .write_all(artifacts)
        .with_context(|| format!("Failed to write to {}", output.display()))?;

    info!(
        "Summary: {} written, {} unchanged",
        writer.written(),
        writer.unchanged()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A DRS header with `tables` table entries
    fn drs_bytes(tables: i32) -> Vec<u8> {
        let mut raw = Vec::new();
        let mut copyright = b"Copyright (c) 1997 Ensemble Studios.\x1a".to_vec();
        copyright.resize(40, 0);
        raw.extend_from_slice(&copyright);
        raw.extend_from_slice(b"1.00");
        raw.extend_from_slice(b"tribe\0\0\0\0\0\0\0");
        raw.extend_from_slice(&tables.to_le_bytes());
        raw.extend_from_slice(&1024i32.to_le_bytes());
        for i in 0..tables {
            raw.push(0x20);
            raw.extend_from_slice(b"nib");
            raw.extend_from_slice(&(64 + i * 12).to_le_bytes());
            raw.extend_from_slice(&(i + 1).to_le_bytes());
        }
        raw
    }

    fn convert_args(input: InputMode, output: &Path) -> ConvertArgs {
        ConvertArgs {
            input,
            schema: BuiltinSchema::Drs,
            offset: 0,
            output: output.to_path_buf(),
            prefix: None,
        }
    }

    #[test]
    fn test_generate_sources() {
        let artifacts = generate_sources(&ExportConfig::default()).unwrap();
        let paths: Vec<&str> = artifacts.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "color.gen.cpp",
                "color.gen.h",
                "drs.gen.cpp",
                "drs.gen.h",
                "sound.gen.cpp",
                "sound.gen.h",
                "util.gen.cpp",
                "util.gen.h",
            ]
        );

        let drs = &artifacts["drs.gen.h"];
        assert!(drs.find("struct drs_table {").unwrap() < drs.find("struct drs_archive {").unwrap());
        assert!(artifacts["sound.gen.h"].contains("enum class audio_loader_policy_t {"));
        assert!(artifacts["util.gen.h"].contains("#ifndef OPENAGE_GAMEDATA_UTIL_GEN_H_"));
    }

    #[test]
    fn test_convert_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("graphics.drs");
        fs::write(&file, drs_bytes(2)).unwrap();

        let input = InputMode {
            file: Some(file),
            directory: None,
        };
        let artifacts = convert(&convert_args(input, temp_dir.path()), &ExportConfig::default()).unwrap();

        let paths: Vec<&str> = artifacts.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["graphics-tables.csv", "graphics.csv"]);
        assert!(artifacts["graphics-tables.csv"].ends_with("\n32,nib,64,1\n32,nib,76,2\n"));
        assert!(artifacts["graphics.csv"].ends_with(",1.00,tribe,2,1024,graphics-tables.csv\n"));
    }

    #[test]
    fn test_convert_directory() {
        let input_dir = TempDir::new().unwrap();
        fs::create_dir(input_dir.path().join("sub")).unwrap();
        fs::write(input_dir.path().join("sounds.drs"), drs_bytes(1)).unwrap();
        fs::write(input_dir.path().join("sub/terrain.DRS"), drs_bytes(0)).unwrap();
        fs::write(input_dir.path().join("readme.txt"), "not data").unwrap();
        fs::write(input_dir.path().join("broken.drs"), [0u8; 3]).unwrap();

        let input = InputMode {
            file: None,
            directory: Some(input_dir.path().to_path_buf()),
        };
        let mut args = convert_args(input, input_dir.path());
        args.prefix = Some("data/".to_string());
        let artifacts = convert(&args, &ExportConfig::default()).unwrap();

        let paths: Vec<&str> = artifacts.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "data/sounds-tables.csv",
                "data/sounds.csv",
                "data/sub/terrain-tables.csv",
                "data/sub/terrain.csv",
            ]
        );
    }

    #[test]
    fn test_emit_writes_and_skips_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let cli = Cli::parse_from(["gamedat", "codegen"]);
        let artifacts = BTreeMap::from([("a/b.csv".to_string(), "x\n".to_string())]);

        emit(&cli, temp_dir.path(), &artifacts).unwrap();
        emit(&cli, temp_dir.path(), &artifacts).unwrap();
        assert_eq!(fs::read_to_string(temp_dir.path().join("a/b.csv")).unwrap(), "x\n");

        let dry = Cli::parse_from(["gamedat", "--dry-run", "codegen"]);
        let other = BTreeMap::from([("c.csv".to_string(), "y\n".to_string())]);
        emit(&dry, temp_dir.path(), &other).unwrap();
        assert!(!temp_dir.path().join("c.csv").exists());
    }

    #[test]
    fn test_content_hash() {
        let hash1 = content_hash("hello");
        let hash2 = content_hash("hello");
        let hash3 = content_hash("world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 8);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
