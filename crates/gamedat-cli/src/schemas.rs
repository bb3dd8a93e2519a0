//! Built-in schemas shipped with the command line tool

use gamedat_core::schema::{index_file_schema, EnumMember, SubdataMember};
use gamedat_core::{ExportMode, Member, Schema, SchemaRef};
use std::sync::OnceLock;

use ExportMode::{NoReadExport, ReadExport};

const DRS_TABLE: SchemaRef = SchemaRef::new(drs_table);

/// Header of a DRS archive, followed by its table directory
pub fn drs_archive() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("drs_archive", "drs", "drs archive header")
            .field(ReadExport, "copyright", "char[40]")
            .field(ReadExport, "version", "char[4]")
            .field(ReadExport, "ftype", "char[12]")
            .field(ReadExport, "table_count", "int32_t")
            .field(ReadExport, "file_offset", "int32_t")
            .field(
                ReadExport,
                "tables",
                Member::Subdata(SubdataMember::new(DRS_TABLE, "table_count")),
            )
    })
}

/// One table of a DRS archive
pub fn drs_table() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("drs_table", "drs", "drs file table")
            .field(ReadExport, "file_type", "uint8_t")
            .field(ReadExport, "file_extension", "char[3]")
            .field(ReadExport, "file_info_offset", "int32_t")
            .field(ReadExport, "file_count", "int32_t")
    })
}

/// Entry of the sound list
pub fn sound_file() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("sound_file", "sound", "sound file information")
            .field(
                NoReadExport,
                "category",
                EnumMember::new("audio_category_t", ["GAME", "INTERFACE", "MUSIC", "TAUNT"]),
            )
            .field(NoReadExport, "sound_id", "int")
            .field(NoReadExport, "path", "std::string")
            .field(
                NoReadExport,
                "format",
                EnumMember::new("audio_format_t", ["OPUS", "WAV", "FLAC", "MP3"]),
            )
            .field(
                NoReadExport,
                "loader_policy",
                EnumMember::new("audio_loader_policy_t", ["IN_MEMORY", "DYNAMIC"]),
            )
    })
}

/// Entry of a palette
pub fn palette_color() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("palette_color", "color", "indexed color storage")
            .field(ReadExport, "idx", "int32_t")
            .field(ReadExport, "r", "uint8_t")
            .field(ReadExport, "g", "uint8_t")
            .field(ReadExport, "b", "uint8_t")
            .field(ReadExport, "a", "uint8_t")
    })
}

/// Every schema whose structs the engine needs at runtime
pub fn codegen_schemas() -> [&'static Schema; 4] {
    [index_file_schema(), drs_archive(), sound_file(), palette_color()]
}
