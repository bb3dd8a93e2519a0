//! Error types for the gamedat-core library.
//!
//! Every failure in the conversion pipeline is fatal for the current run, so
//! there is a single error enum. [`Error::category`] tells the caller which
//! stage raised it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gamedat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The schema itself is malformed
    Schema,
    /// The binary input does not match the schema
    Decode,
    /// Generated snippets or types could not be resolved
    Dependency,
    /// A delimited row could not be decoded
    Row,
    /// Reading or writing files failed
    Io,
}

/// Comprehensive error type for all gamedat operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Artifact path would escape the output directory
    #[error("path traversal detected: '{path}' would escape output directory")]
    PathTraversal {
        /// The suspicious path
        path: PathBuf,
    },

    /// A raw field type names no known wire type
    #[error("member '{field}' requests unknown data type '{raw_type}'")]
    UnknownRawType {
        /// Field name
        field: String,
        /// The offending type string
        raw_type: String,
    },

    /// A raw array field uses an element type that cannot be exported
    #[error("member '{field}' has unsupported array type '{raw_type}'")]
    UnsupportedArrayType {
        /// Field name
        field: String,
        /// The offending type string
        raw_type: String,
    },

    /// A field name is not a valid identifier
    #[error("invalid member name '{field}' in struct {schema}")]
    InvalidFieldName {
        /// Struct name
        schema: String,
        /// The offending name
        field: String,
    },

    /// Two fields of one struct share a name
    #[error("duplicate member '{field}' in struct {schema}")]
    DuplicateField {
        /// Struct name
        schema: String,
        /// The duplicated name
        field: String,
    },

    /// Include relations loop back onto themselves
    #[error("cyclic include of struct {schema}")]
    IncludeCycle {
        /// Struct that was included twice on the same path
        schema: String,
    },

    /// A descriptor resolved to nothing usable
    #[error("malformed member '{field}' in struct {schema}: {details}")]
    MalformedSchema {
        /// Struct name
        schema: String,
        /// Field name
        field: String,
        /// What went wrong
        details: String,
    },

    /// The buffer ended before the field could be read
    #[error("truncated input at offset {offset:#010x} reading '{field}': need {needed} bytes, have {available}")]
    Truncated {
        /// Field name
        field: String,
        /// Byte offset of the read
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A computed length is negative or otherwise unusable
    #[error("invalid length {length} for member '{field}'")]
    InvalidLength {
        /// Field name
        field: String,
        /// The computed length
        length: i64,
    },

    /// A field looked up during decoding does not exist (yet)
    #[error("member '{field}' is not available in the current record")]
    UnknownField {
        /// Field name
        field: String,
    },

    /// A numeric code has no symbol in an enum lookup table
    #[error("failed to find {code} = {code:#x} in lookup dict {type_name}")]
    UnknownEnumCode {
        /// Enum type name
        type_name: String,
        /// The raw code
        code: i64,
    },

    /// A zero-guarded field contains non-zero data
    #[error("invalid data when reading '{field}' at offset {offset:#010x}: expected zero")]
    ZeroGuardViolation {
        /// Field name
        field: String,
        /// Byte offset of the read
        offset: usize,
    },

    /// A float field decoded to NaN or infinity
    #[error("invalid float when reading '{field}' at offset {offset:#010x}")]
    NonFiniteFloat {
        /// Field name
        field: String,
        /// Byte offset of the read
        offset: usize,
    },

    /// A character array is not valid UTF-8
    #[error("invalid text when reading '{field}' at offset {offset:#010x}")]
    InvalidText {
        /// Field name
        field: String,
        /// Byte offset of the read
        offset: usize,
    },

    /// A subtype tag is missing from the dispatch map
    #[error("member '{field}' has no subtype for tag '{tag}'")]
    UnknownSubtype {
        /// Field name
        field: String,
        /// The decoded tag
        tag: String,
    },

    /// The offset table is shorter than the element count
    #[error("offset table '{field}' has {found} entries, expected {expected}")]
    OffsetCountMismatch {
        /// Name of the offset table field
        field: String,
        /// Element count requested by the length
        expected: usize,
        /// Entries actually present
        found: usize,
    },

    /// A descriptor cannot be decoded from binary input
    #[error("member '{field}' ({member}) cannot be read from binary data")]
    UnreadableMember {
        /// Field name
        field: String,
        /// Descriptor description
        member: String,
    },

    /// A record lacks a value for an exported field
    #[error("record has no value for member '{field}'")]
    MissingValue {
        /// Field name
        field: String,
    },

    /// A value has the wrong shape for its descriptor
    #[error("member '{field}' expected {expected}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Description of the expected shape
        expected: String,
    },

    /// A dumped row carries an enum value outside the declared symbols
    #[error("data entry {row} '{value}' not a valid enum {type_name} value")]
    InvalidEnumValue {
        /// Row index
        row: usize,
        /// The offending value
        value: String,
        /// Enum type name
        type_name: String,
    },

    /// Snippets reference types no snippet in the file defines
    #[error("missing types for {file}: {}", .types.join(", "))]
    MissingTypes {
        /// Generated file name
        file: String,
        /// Unresolved type names
        types: Vec<String>,
    },

    /// Types remain unresolved after cross-file resolution
    #[error("still missing types for {file}: {}", .types.join(", "))]
    StillMissingTypes {
        /// Generated file name
        file: String,
        /// Unresolved type names
        types: Vec<String>,
    },

    /// A type was defined twice with different content
    #[error("different redefinition of type {type_name}")]
    TypeConflict {
        /// The conflicting type name
        type_name: String,
    },

    /// A generated file has nothing to put in its body
    #[error("generated file {file} has no body snippets")]
    EmptyBody {
        /// Generated file name
        file: String,
    },

    /// The snippet dependency graph contains a cycle
    #[error("circular snippet dependency: {chain}")]
    DependencyCycle {
        /// Human readable chain of snippets forming the cycle
        chain: String,
    },

    /// A cross reference names no registered type
    #[error("unresolved type reference {type_name}")]
    UnresolvedReference {
        /// The referenced type name
        type_name: String,
    },

    /// A snippet was routed to the wrong generated file
    #[error("snippet for '{found}' cannot be added to generated file '{expected}'")]
    SnippetFileMismatch {
        /// File the snippet was added to
        expected: String,
        /// File the snippet wants
        found: String,
    },

    /// A data set cannot produce the requested format
    #[error("{name} cannot be exported as {format}")]
    UnsupportedFormat {
        /// Struct name
        name: String,
        /// Requested format
        format: String,
    },

    /// An export format name is not recognised
    #[error("unknown export format '{format}' requested")]
    UnknownFormat {
        /// The requested format name
        format: String,
    },

    /// A row has the wrong number of columns
    #[error("tokenizing {struct_name} led to {found} columns (expecting {expected})")]
    ColumnCountMismatch {
        /// Struct name
        struct_name: String,
        /// Columns found
        found: usize,
        /// Columns declared
        expected: usize,
    },

    /// A row token is not one of the enum's symbols
    #[error("unknown enum value '{value}' encountered. valid are: {valid}")]
    UnknownEnumValue {
        /// The token
        value: String,
        /// Comma separated valid symbols
        valid: String,
    },

    /// A row token could not be parsed for its column
    #[error("column '{field}' cannot parse '{token}' as {expected}")]
    InvalidToken {
        /// Field name
        field: String,
        /// The token
        token: String,
        /// Expected type description
        expected: String,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Creates a new invalid length error
    pub fn invalid_length(field: impl Into<String>, length: i64) -> Self {
        Self::InvalidLength {
            field: field.into(),
            length,
        }
    }

    /// Creates a new unknown field error
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Creates a new malformed schema error
    pub fn malformed(
        schema: impl Into<String>,
        field: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::MalformedSchema {
            schema: schema.into(),
            field: field.into(),
            details: details.into(),
        }
    }

    /// Creates a new missing types error
    pub fn missing_types<'a>(
        file: impl Into<String>,
        types: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        Self::MissingTypes {
            file: file.into(),
            types: types.into_iter().cloned().collect(),
        }
    }

    /// Creates a new still-missing types error
    pub fn still_missing_types<'a>(
        file: impl Into<String>,
        types: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        Self::StillMissingTypes {
            file: file.into(),
            types: types.into_iter().cloned().collect(),
        }
    }

    /// Creates a new type conflict error
    pub fn type_conflict(type_name: impl Into<String>) -> Self {
        Self::TypeConflict {
            type_name: type_name.into(),
        }
    }

    /// Creates a new invalid token error
    pub fn invalid_token(
        field: impl Into<String>,
        token: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidToken {
            field: field.into(),
            token: token.into(),
            expected: expected.into(),
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the pipeline stage this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileRead { .. }
            | Self::FileWrite { .. }
            | Self::DirectoryCreate { .. }
            | Self::PathTraversal { .. } => ErrorCategory::Io,

            Self::UnknownRawType { .. }
            | Self::UnsupportedArrayType { .. }
            | Self::InvalidFieldName { .. }
            | Self::DuplicateField { .. }
            | Self::IncludeCycle { .. }
            | Self::MalformedSchema { .. } => ErrorCategory::Schema,

            Self::Truncated { .. }
            | Self::InvalidLength { .. }
            | Self::UnknownField { .. }
            | Self::UnknownEnumCode { .. }
            | Self::ZeroGuardViolation { .. }
            | Self::NonFiniteFloat { .. }
            | Self::InvalidText { .. }
            | Self::UnknownSubtype { .. }
            | Self::OffsetCountMismatch { .. }
            | Self::UnreadableMember { .. }
            | Self::MissingValue { .. }
            | Self::TypeMismatch { .. }
            | Self::InvalidEnumValue { .. } => ErrorCategory::Decode,

            Self::MissingTypes { .. }
            | Self::StillMissingTypes { .. }
            | Self::TypeConflict { .. }
            | Self::EmptyBody { .. }
            | Self::DependencyCycle { .. }
            | Self::UnresolvedReference { .. }
            | Self::SnippetFileMismatch { .. }
            | Self::UnsupportedFormat { .. }
            | Self::UnknownFormat { .. }
            | Self::Internal(_) => ErrorCategory::Dependency,

            Self::ColumnCountMismatch { .. }
            | Self::UnknownEnumValue { .. }
            | Self::InvalidToken { .. } => ErrorCategory::Row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::path_traversal("/etc/passwd");
        assert!(err.to_string().contains("path traversal"));
        assert!(err.to_string().contains("/etc/passwd"));

        let err = Error::missing_types("unit", &["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "missing types for unit: a, b");
    }

    #[test]
    fn test_enum_code_is_hex_formatted() {
        let err = Error::UnknownEnumCode {
            type_name: "unit_class".to_string(),
            code: 255,
        };
        assert_eq!(
            err.to_string(),
            "failed to find 255 = 0xff in lookup dict unit_class"
        );
    }

    #[test]
    fn test_category() {
        assert_eq!(Error::invalid_length("x", -1).category(), ErrorCategory::Decode);
        assert_eq!(Error::type_conflict("t").category(), ErrorCategory::Dependency);
        assert_eq!(Error::path_traversal("/x").category(), ErrorCategory::Io);
        assert_eq!(
            Error::ColumnCountMismatch {
                struct_name: "s".into(),
                found: 1,
                expected: 2
            }
            .category(),
            ErrorCategory::Row
        );
    }
}
