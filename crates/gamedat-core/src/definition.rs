//! Struct and data definitions.
//!
//! A [`StructDefinition`] is the export view of a schema: its exported fields
//! with includes flattened, each resolved to a [`Member`]. It generates the
//! struct declaration and implementation snippets, and [`StructDefinition::fill`]
//! decodes a delimited row the same way the generated `fill` routine does.
//!
//! A [`DataDefinition`] pairs a struct definition with dumped rows and the
//! data file they are written to.

use crate::codegen::{ContentSnippet, EntryParser, ExportConfig, ExportFormat, MemberMethod, Need, StructSnippet};
use crate::error::{Error, Result};
use crate::record::{Record, Value, DATA_ABSENT, DATA_EXISTS};
use crate::row::{dirname, encode_value, relative_path, tokenize};
use crate::schema::{
    FieldType, Length, Member, RawType, Schema, EXPORT_MODES, INDEX_FILENAME_FIELD,
    INDEX_STRUCT_NAME,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Export view of one schema
#[derive(Debug, Clone, PartialEq)]
pub struct StructDefinition {
    name_struct: String,
    name_struct_file: String,
    struct_description: String,
    members: Vec<(String, Member)>,
    inherited_members: BTreeSet<String>,
    parent_classes: Vec<String>,
}

impl StructDefinition {
    /// Builds the definition of `schema`
    ///
    /// Fails if a field name is not a valid identifier, appears twice after
    /// flattening, or has a type that cannot be exported.
    pub fn new(schema: &Schema) -> Result<Self> {
        let mut members: Vec<(String, Member)> = Vec::new();
        let mut inherited_members = BTreeSet::new();

        for entry in schema.data_format(Some(&EXPORT_MODES), true)? {
            let field = entry.field;

            if !is_identifier(&field.name) {
                return Err(Error::InvalidFieldName {
                    schema: schema.name_struct().to_string(),
                    field: field.name.clone(),
                });
            }
            if members.iter().any(|(name, _)| *name == field.name) {
                return Err(Error::DuplicateField {
                    schema: schema.name_struct().to_string(),
                    field: field.name.clone(),
                });
            }

            let member = field.member()?.into_owned();
            match &member {
                Member::Include(_) => {
                    return Err(Error::internal(format!(
                        "include {} of {} survived flattening",
                        field.name,
                        schema.name_struct()
                    )))
                }
                Member::NumberArray { .. } | Member::ZeroGuard { .. }
                    if !matches!(member, Member::ZeroGuard { length: 1, .. }) =>
                {
                    return Err(Error::UnsupportedArrayType {
                        field: field.name.clone(),
                        raw_type: member.to_string(),
                    })
                }
                _ => {}
            }

            if entry.is_parent {
                inherited_members.insert(field.name.clone());
            }
            members.push((field.name.clone(), member));
        }

        let parent_classes = schema
            .fields()
            .iter()
            .filter_map(|field| match &field.kind {
                FieldType::Member(Member::Include(parent)) => Some(parent.name().to_string()),
                _ => None,
            })
            .collect();

        Ok(Self {
            name_struct: schema.name_struct().to_string(),
            name_struct_file: schema.name_struct_file().to_string(),
            struct_description: schema.struct_description().to_string(),
            members,
            inherited_members,
            parent_classes,
        })
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

    /// Exported members in column order
    pub fn members(&self) -> &[(String, Member)] {
        &self.members
    }

    /// Looks up a member by name
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Number of columns
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members that come from included schemas
    pub fn inherited_members(&self) -> &BTreeSet<String> {
        &self.inherited_members
    }

    /// Struct names of directly included schemas
    pub fn parent_classes(&self) -> &[String] {
        &self.parent_classes
    }

    /// Returns true for the heterogeneous collection index file struct
    pub fn is_index_file(&self) -> bool {
        self.name_struct == INDEX_STRUCT_NAME
    }

    /// Replaces type references with the registered definitions
    pub fn dynamic_ref_update(&mut self, registry: &BTreeMap<String, Member>) -> Result<()> {
        for (name, member) in &mut self.members {
            if let Member::Reference(reference) = member {
                let resolved = registry.get(&reference.type_name).ok_or_else(|| {
                    Error::UnresolvedReference {
                        type_name: reference.type_name.clone(),
                    }
                })?;
                trace!("{}.{}: resolved {}", self.name_struct, name, reference.type_name);
                *member = resolved.clone();
            }
        }
        Ok(())
    }

    /// Struct declaration snippet
    pub fn generate_struct(&self, cfg: &ExportConfig) -> Vec<ContentSnippet> {
        let mut builder = StructSnippet::new(self.name_struct_file.as_str(), self.name_struct.as_str())
            .comment(self.struct_description.as_str())
            .parents(self.parent_classes.clone());

        for (name, member) in &self.members {
            if self.inherited_members.contains(name) {
                continue;
            }
            builder.add_includes(member.headers(ExportFormat::Struct));
            builder.add_references(member.typerefs());
            builder.add_members(member.struct_entries(name, cfg));
        }

        builder.add_member(format!(
            "static constexpr size_t member_count = {};",
            self.members.len()
        ));
        builder.add_includes([Need::SizeT.header()]);

        for method in MemberMethod::ALL {
            builder.add_member(format!("{};", method.signature("", false, cfg)));
            builder.add_includes(method.declaration_headers());
        }

        vec![builder.build()]
    }

    /// Out of line `fill` and `recurse` definitions
    pub fn generate_struct_implementation(&self, cfg: &ExportConfig) -> Result<Vec<ContentSnippet>> {
        let mut parsers: Vec<EntryParser> = Vec::new();
        for (idx, (name, member)) in self.members.iter().enumerate() {
            parsers.extend(member.parsers(idx, name, cfg)?);
        }

        Ok(MemberMethod::ALL
            .iter()
            .map(|&method| {
                let own: Vec<&EntryParser> =
                    parsers.iter().filter(|p| p.destination == method).collect();
                method.snippet(&self.name_struct, &self.name_struct_file, &own, cfg)
            })
            .collect())
    }

    /// Fills `target` from one delimited row
    ///
    /// Columns are assigned only if every column parses. On error `target`
    /// is left untouched.
    pub fn fill(&self, line: &str, target: &mut Record, cfg: &ExportConfig) -> Result<()> {
        let tokens = tokenize(line, cfg.delimiter_char());
        if tokens.len() != self.members.len() {
            return Err(Error::ColumnCountMismatch {
                struct_name: self.name_struct.clone(),
                found: tokens.len(),
                expected: self.members.len(),
            });
        }

        let mut staged = Record::new();
        for ((name, member), token) in self.members.iter().zip(&tokens) {
            staged.set(name.as_str(), parse_token(name, member, token, cfg)?);
        }

        target.merge(staged);
        Ok(())
    }

    /// Encodes one dumped row as a delimited line without trailing newline
    ///
    /// Collection paths are written with the data file suffix, relative to
    /// `base_dir`.
    pub fn encode_row(&self, row_idx: usize, row: &Record, base_dir: &str, cfg: &ExportConfig) -> Result<String> {
        let delimiter = cfg.delimiter_char();
        let mut columns = Vec::with_capacity(self.members.len());

        for (name, member) in &self.members {
            let value = row.get(name).ok_or_else(|| Error::MissingValue {
                field: name.clone(),
            })?;

            let text = match member {
                Member::Enum(_) | Member::EnumLookup(_) => {
                    let symbol = value.to_string();
                    if let Some(e) = member.as_enum() {
                        if !e.validate_value(&symbol) {
                            return Err(Error::InvalidEnumValue {
                                row: row_idx,
                                value: symbol,
                                type_name: e.type_name.clone(),
                            });
                        }
                    }
                    symbol
                }
                Member::Subdata(_) | Member::Array(_) | Member::Multisubtype(_) => {
                    relative_path(&format!("{}{}", value, cfg.csv_suffix()), base_dir)
                }
                Member::Group(schema) => match value {
                    Value::Record(nested) => {
                        StructDefinition::new(schema.get())?.encode_row(row_idx, nested, base_dir, cfg)?
                    }
                    _ => return Err(Error::type_mismatch(name.as_str(), "a nested record")),
                },
                _ if self.is_index_file() && name == INDEX_FILENAME_FIELD => {
                    relative_path(&value.to_string(), base_dir)
                }
                _ => value.to_string(),
            };

            columns.push(encode_value(&text, delimiter));
        }

        Ok(columns.join(&delimiter.to_string()))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn parse_token(name: &str, member: &Member, token: &str, cfg: &ExportConfig) -> Result<Value> {
    match member {
        Member::Number(t) | Member::ZeroGuard { raw_type: t, .. } => parse_number(name, *t, token),
        Member::ContinueFlag(_) => match token {
            DATA_ABSENT => Ok(Value::Continue(false)),
            DATA_EXISTS => Ok(Value::Continue(true)),
            _ => Err(Error::invalid_token(
                name,
                token,
                format!("{} or {}", DATA_ABSENT, DATA_EXISTS),
            )),
        },
        Member::Enum(_) | Member::EnumLookup(_) => {
            let e = member
                .as_enum()
                .ok_or_else(|| Error::internal("enum member without enum view"))?;
            if e.validate_value(token) {
                Ok(Value::Symbol(token.to_string()))
            } else {
                Err(Error::UnknownEnumValue {
                    value: token.to_string(),
                    valid: e.values.join(","),
                })
            }
        }
        Member::CharArray(Length::Fixed(n)) => {
            // room for the terminator
            let mut end = token.len().min(n.saturating_sub(1));
            while !token.is_char_boundary(end) {
                end -= 1;
            }
            Ok(Value::Text(token[..end].to_string()))
        }
        Member::CharArray(_) | Member::String => Ok(Value::Text(token.to_string())),
        Member::Group(schema) => {
            let mut nested = Record::new();
            StructDefinition::new(schema.get())?.fill(token, &mut nested, cfg)?;
            Ok(Value::Record(nested))
        }
        Member::Subdata(_) | Member::Array(_) | Member::Multisubtype(_) => {
            Ok(Value::Path(token.to_string()))
        }
        Member::Reference(r) => Err(Error::UnresolvedReference {
            type_name: r.type_name.clone(),
        }),
        Member::NumberArray { .. } | Member::Include(_) => Err(Error::internal(format!(
            "column {} of kind {} cannot be filled",
            name, member
        ))),
    }
}

fn parse_number(name: &str, raw_type: RawType, token: &str) -> Result<Value> {
    let token = token.trim();
    let invalid = || Error::invalid_token(name, token, raw_type.c_name());

    if raw_type.is_float() {
        return token.parse::<f64>().map(Value::Float).map_err(|_| invalid());
    }

    let bits = (raw_type.size() * 8) as u32;
    if raw_type.is_unsigned() {
        let value = token.parse::<u64>().map_err(|_| invalid())?;
        if bits < 64 && value >> bits != 0 {
            return Err(invalid());
        }
        Ok(Value::UInt(value))
    } else {
        let value = token.parse::<i64>().map_err(|_| invalid())?;
        if bits < 64 {
            let limit = 1i64 << (bits - 1);
            if value < -limit || value >= limit {
                return Err(invalid());
            }
        }
        Ok(Value::Int(value))
    }
}

/// A struct definition with dumped rows
#[derive(Debug, Clone, PartialEq)]
pub struct DataDefinition {
    definition: StructDefinition,
    data: Vec<Record>,
    name_data_file: String,
    prefix: Option<String>,
}

impl DataDefinition {
    /// Pairs rows with their struct definition and data file
    pub fn new(definition: StructDefinition, data: Vec<Record>, name_data_file: impl Into<String>) -> Self {
        Self {
            definition,
            data,
            name_data_file: name_data_file.into(),
            prefix: None,
        }
    }

    /// Prefixes the data file name
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The struct definition
    pub fn definition(&self) -> &StructDefinition {
        &self.definition
    }

    /// The struct definition, mutably
    pub fn definition_mut(&mut self) -> &mut StructDefinition {
        &mut self.definition
    }

    /// Dumped rows
    pub fn data(&self) -> &[Record] {
        &self.data
    }

    /// Data file name without prefix or suffix
    pub fn name_data_file(&self) -> &str {
        &self.name_data_file
    }

    /// Data file name prefix
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Data file name with prefix
    pub fn target_file(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, self.name_data_file),
            None => self.name_data_file.clone(),
        }
    }

    /// The data file snippet
    ///
    /// Four comment lines name the struct, its description, the column
    /// types and the column names. Every row follows on its own line.
    pub fn generate_csv(&self, cfg: &ExportConfig) -> Result<Vec<ContentSnippet>> {
        let def = &self.definition;
        let delimiter = cfg.delimiter_char().to_string();

        let mut text = format!("#struct {}\n", def.name_struct);
        for line in def.struct_description.split('\n') {
            text.push_str(&format!("#{}\n", line));
        }

        let types: Vec<String> = def.members.iter().map(|(_, m)| m.to_string()).collect();
        let names: Vec<&str> = def.members.iter().map(|(n, _)| n.as_str()).collect();
        text.push_str(&format!("#{}\n", types.join(&delimiter)));
        text.push_str(&format!("#{}\n", names.join(&delimiter)));

        let base_dir = dirname(&self.name_data_file);
        for (idx, row) in self.data.iter().enumerate() {
            text.push_str(&def.encode_row(idx, row, base_dir, cfg)?);
            text.push('\n');
        }

        Ok(vec![ContentSnippet::body(text, self.target_file(), def.name_struct.as_str())
            .label(format!("csv for {}", def.name_struct))])
    }
}
