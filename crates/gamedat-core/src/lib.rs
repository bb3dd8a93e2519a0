//! # gamedat-core
//!
//! A library for converting fixed-layout binary game data into delimited
//! text files and generated C++ structs that can load them again.
//!
//! This crate provides the core functionality for:
//! - Describing binary layouts declaratively as [`Schema`]s
//! - Decoding raw bytes into nested [`Record`]s
//! - Flattening records into one data file per collection
//! - Generating dependency-ordered struct declarations and parsers
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`schema`]: Field descriptors and struct layouts
//! - [`reader`]: Binary decoding
//! - [`dump`]: Flattening records into [`DataDefinition`]s
//! - [`definition`]: Struct definitions, rows and row parsing
//! - [`codegen`]: Snippets, generated files and dependency resolution
//! - [`formatter`]: Export orchestration across formats
//! - [`output`]: Where exported files go
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use gamedat_core::schema::ExportMode;
//! use gamedat_core::{dump_root, BinaryReader, DataFormatter, ExportConfig, ExportFormat, Schema};
//!
//! let schema = Schema::new("color", "palette", "one palette entry")
//!     .field(ExportMode::ReadExport, "idx", "int32_t")
//!     .field(ExportMode::ReadExport, "r", "uint8_t");
//!
//! let raw: [u8; 5] = [7, 0, 0, 0, 255];
//! let (_, record) = BinaryReader::new(&raw).read(&schema, 0)?;
//!
//! let cfg = ExportConfig::default();
//! let mut formatter = DataFormatter::new(cfg.clone());
//! formatter.add_data(dump_root(&schema, &record, "colors", &cfg)?)?;
//!
//! let files = formatter.export(&[ExportFormat::Csv])?;
//! assert_eq!(files["colors.csv"].lines().last(), Some("7,255"));
//! # Ok::<(), gamedat_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ArtifactWriter`]: Customize where exported files are written
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codegen;
pub mod definition;
pub mod dump;
pub mod error;
pub mod formatter;
pub mod output;
pub mod reader;
pub mod record;
pub mod row;
pub mod schema;

#[cfg(test)]
mod fixtures;

// Re-export primary types for convenience
pub use codegen::{ExportConfig, ExportFormat};
pub use definition::{DataDefinition, StructDefinition};
pub use dump::{dump, dump_root};
pub use error::{Error, ErrorCategory, Result};
pub use formatter::{DataFormatter, DataSet};
pub use output::{ArtifactWriter, DirectoryWriter, NullWriter, StatsWriter};
pub use reader::BinaryReader;
pub use record::{Record, Value};
pub use schema::{ExportMode, Member, Schema, SchemaRef};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
