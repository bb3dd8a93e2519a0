//! Declarative record schemas.
//!
//! A [`Schema`] is an ordered list of [`Field`]s. Field order is the binary
//! layout order. Schemas are immutable and global: they are built once behind
//! a `OnceLock` and shared through [`SchemaRef`] handles, which lets schemas
//! refer to each other (and to themselves) without ownership cycles.
//!
//! ```
//! use gamedat_core::schema::{ExportMode, Schema, SchemaRef};
//! use std::sync::OnceLock;
//!
//! fn tree() -> &'static Schema {
//!     static SCHEMA: OnceLock<Schema> = OnceLock::new();
//!     SCHEMA.get_or_init(|| {
//!         Schema::new("tree", "nature", "a tree")
//!             .field(ExportMode::ReadExport, "id", "int32_t")
//!             .field(ExportMode::ReadExport, "name", "char[8]")
//!     })
//! }
//!
//! const TREE: SchemaRef = SchemaRef::new(tree);
//! assert_eq!(TREE.name(), "tree");
//! ```

pub mod member;

use crate::definition::StructDefinition;
use crate::error::{Error, Result};
use crate::record::Record;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;
use tracing::trace;

pub use member::{
    EnumLookupMember, EnumMember, GatePredicate, Length, LengthFn, Member, MultisubtypeMember,
    OffsetGate, RawType, SubdataMember, TypeReference,
};

/// How a field takes part in reading and exporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportMode {
    /// Decoded from binary, not exported
    Read,
    /// Decoded from binary and exported
    ReadExport,
    /// Not decoded, supplied by the caller and exported
    NoReadExport,
    /// Decoded under a name synthesised from its byte offset, not exported
    ReadUnknown,
}

/// Modes that are decoded from binary input
pub const READ_MODES: [ExportMode; 3] = [
    ExportMode::ReadExport,
    ExportMode::Read,
    ExportMode::ReadUnknown,
];

/// Modes that are exported to data files and generated structs
pub const EXPORT_MODES: [ExportMode; 2] = [ExportMode::ReadExport, ExportMode::NoReadExport];

/// Struct name of the heterogeneous collection index file
pub const INDEX_STRUCT_NAME: &str = "multisubtype_ref";

/// Column holding the subtype tag in index files
pub const INDEX_SUBTYPE_FIELD: &str = "subtype";

/// Column holding the relative row file path in index files
pub const INDEX_FILENAME_FIELD: &str = "filename";

/// Declared type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A raw C type string, parsed with [`Member::parse_raw`]
    Raw(String),
    /// An explicit descriptor
    Member(Member),
}

impl From<&str> for FieldType {
    fn from(s: &str) -> Self {
        FieldType::Raw(s.to_string())
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::Raw(s)
    }
}

impl From<Member> for FieldType {
    fn from(m: Member) -> Self {
        FieldType::Member(m)
    }
}

impl From<RawType> for FieldType {
    fn from(t: RawType) -> Self {
        FieldType::Member(Member::Number(t))
    }
}

impl From<EnumMember> for FieldType {
    fn from(e: EnumMember) -> Self {
        FieldType::Member(Member::Enum(e))
    }
}

impl From<EnumLookupMember> for FieldType {
    fn from(e: EnumLookupMember) -> Self {
        FieldType::Member(Member::EnumLookup(e))
    }
}

impl From<MultisubtypeMember> for FieldType {
    fn from(m: MultisubtypeMember) -> Self {
        FieldType::Member(Member::Multisubtype(m))
    }
}

/// One schema field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Export mode
    pub mode: ExportMode,
    /// Field name, unique within the flattened schema
    pub name: String,
    /// Declared type
    pub kind: FieldType,
}

impl Field {
    /// Creates a field
    pub fn new(mode: ExportMode, name: impl Into<String>, kind: impl Into<FieldType>) -> Self {
        Self {
            mode,
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Resolves the declared type into a descriptor
    pub fn member(&self) -> Result<Cow<'_, Member>> {
        match &self.kind {
            FieldType::Raw(spec) => Member::parse_raw(&self.name, spec).map(Cow::Owned),
            FieldType::Member(member) => Ok(Cow::Borrowed(member)),
        }
    }
}

/// One entry of [`Schema::data_format`]
#[derive(Debug, Clone, Copy)]
pub struct FormatEntry<'a> {
    /// True if the field was pulled in by flattening an include
    pub is_parent: bool,
    /// The field
    pub field: &'a Field,
}

/// An ordered, named list of fields
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name_struct: String,
    name_struct_file: String,
    struct_description: String,
    fields: Vec<Field>,
}

impl Schema {
    /// Creates a schema without fields
    pub fn new(
        name_struct: impl Into<String>,
        name_struct_file: impl Into<String>,
        struct_description: impl Into<String>,
    ) -> Self {
        Self {
            name_struct: name_struct.into(),
            name_struct_file: name_struct_file.into(),
            struct_description: struct_description.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field
    pub fn field(
        mut self,
        mode: ExportMode,
        name: impl Into<String>,
        kind: impl Into<FieldType>,
    ) -> Self {
        self.fields.push(Field::new(mode, name, kind));
        self
    }

    /// Appends an include of another schema
    pub fn include(self, schema: SchemaRef) -> Self {
        let name = schema.name().to_string();
        self.field(ExportMode::ReadExport, name, Member::Include(schema))
    }

    /// Generated struct name
    pub fn name_struct(&self) -> &str {
        &self.name_struct
    }

    /// File the generated struct is placed in
    pub fn name_struct_file(&self) -> &str {
        &self.name_struct_file
    }

    /// Comment placed above the generated struct
    pub fn struct_description(&self) -> &str {
        &self.struct_description
    }

    /// Declared fields, includes not flattened
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the fields allowed by `modes`, optionally flattening includes
    ///
    /// Continuation flags are returned whatever their mode, since they
    /// decide whether the remaining fields carry data. Flattening fails with
    /// [`Error::IncludeCycle`] if an include reaches a schema already on the
    /// include path.
    pub fn data_format(
        &self,
        modes: Option<&[ExportMode]>,
        flatten_includes: bool,
    ) -> Result<Vec<FormatEntry<'_>>> {
        let mut entries = Vec::new();
        let mut path = vec![self.name_struct.as_str()];
        self.collect_format(modes, flatten_includes, false, &mut path, &mut entries)?;
        Ok(entries)
    }

    fn collect_format<'a>(
        &'a self,
        modes: Option<&[ExportMode]>,
        flatten_includes: bool,
        is_parent: bool,
        path: &mut Vec<&'a str>,
        entries: &mut Vec<FormatEntry<'a>>,
    ) -> Result<()> {
        for field in &self.fields {
            let mut always = false;

            match &field.kind {
                FieldType::Member(Member::Include(included)) if flatten_includes => {
                    let included: &'static Schema = included.get();
                    if path.contains(&included.name_struct()) {
                        return Err(Error::IncludeCycle {
                            schema: included.name_struct.clone(),
                        });
                    }

                    path.push(included.name_struct());
                    included.collect_format(modes, flatten_includes, true, path, entries)?;
                    path.pop();
                    continue;
                }
                FieldType::Member(Member::ContinueFlag(_)) => always = true,
                _ => {}
            }

            if let Some(modes) = modes {
                if !always && !modes.contains(&field.mode) {
                    continue;
                }
            }

            entries.push(FormatEntry { is_parent, field });
        }

        Ok(())
    }

    /// All fields with includes flattened
    pub fn flattened(&self) -> Result<Vec<&Field>> {
        Ok(self
            .data_format(None, true)?
            .into_iter()
            .map(|entry| entry.field)
            .collect())
    }

    /// A record holding every field's empty value
    pub fn empty_record(&self) -> Record {
        let mut record = Record::new();
        for field in &self.fields {
            match field.member() {
                Ok(member) => match member.as_ref() {
                    Member::Include(included) => record.merge(included.get().empty_record()),
                    other => record.set(field.name.as_str(), other.empty_value()),
                },
                Err(_) => record.set(field.name.as_str(), 0i64),
            }
        }
        record
    }

    /// Struct definitions of this schema and every schema it reaches
    ///
    /// Nested schemas come before the schemas using them. Each struct name
    /// appears once, so recursive schemas terminate. Schemas holding
    /// heterogeneous collections also pull in the index file struct.
    pub fn structs(&self) -> Result<Vec<StructDefinition>> {
        let mut seen = BTreeSet::new();
        let mut definitions = Vec::new();
        self.collect_structs(&mut seen, &mut definitions)?;
        Ok(definitions)
    }

    fn collect_structs(
        &self,
        seen: &mut BTreeSet<String>,
        definitions: &mut Vec<StructDefinition>,
    ) -> Result<()> {
        if !seen.insert(self.name_struct.clone()) {
            return Ok(());
        }

        trace!("{}: generating structs", self.name_struct);

        for entry in self.data_format(Some(&EXPORT_MODES), false)? {
            let member = entry.field.member()?;
            match member.as_ref() {
                Member::Subdata(sub) | Member::Array(sub) => {
                    sub.schema.get().collect_structs(seen, definitions)?;
                }
                Member::Multisubtype(multi) => {
                    for (_, schema) in &multi.class_lookup {
                        schema.get().collect_structs(seen, definitions)?;
                    }
                    index_file_schema().collect_structs(seen, definitions)?;
                }
                Member::Group(schema) | Member::Include(schema) => {
                    schema.get().collect_structs(seen, definitions)?;
                }
                _ => {}
            }
        }

        definitions.push(StructDefinition::new(self)?);
        Ok(())
    }
}

/// Handle to a global schema
///
/// Two handles are equal if they name the same struct in the same file.
#[derive(Clone, Copy)]
pub struct SchemaRef(fn() -> &'static Schema);

impl SchemaRef {
    /// Wraps a schema accessor
    pub const fn new(schema: fn() -> &'static Schema) -> Self {
        Self(schema)
    }

    /// The referenced schema
    pub fn get(&self) -> &'static Schema {
        (self.0)()
    }

    /// Struct name of the referenced schema
    pub fn name(&self) -> &'static str {
        self.get().name_struct()
    }
}

impl PartialEq for SchemaRef {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.get(), other.get());
        a.name_struct == b.name_struct && a.name_struct_file == b.name_struct_file
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaRef({})", self.name())
    }
}

/// Format of the index file written for every heterogeneous collection
pub fn index_file_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new(
            INDEX_STRUCT_NAME,
            "util",
            "format for multi-subtype references",
        )
        .field(ExportMode::NoReadExport, INDEX_SUBTYPE_FIELD, "std::string")
        .field(ExportMode::NoReadExport, INDEX_FILENAME_FIELD, "std::string")
    })
}

/// Handle to [`index_file_schema`]
pub const INDEX_FILE: SchemaRef = SchemaRef::new(index_file_schema);
