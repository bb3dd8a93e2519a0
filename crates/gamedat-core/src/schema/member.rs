//! Member descriptors.
//!
//! A [`Member`] describes how one field is laid out in the binary input and
//! which symbolic type it presents to the generated code. Code generation for
//! members lives in [`crate::codegen::members`].

use super::{Field, SchemaRef};
use crate::error::{Error, Result};
use crate::record::{Record, Value};
use std::fmt;

/// Primitive little-endian wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawType {
    /// `char`
    Char,
    /// `int8_t`
    Int8,
    /// `uint8_t`
    UInt8,
    /// `int16_t`
    Int16,
    /// `uint16_t`
    UInt16,
    /// `int`
    Int,
    /// `uint`
    UInt,
    /// `int32_t`
    Int32,
    /// `uint32_t`
    UInt32,
    /// `int64_t`
    Int64,
    /// `uint64_t`
    UInt64,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl RawType {
    /// Every supported wire type
    pub const ALL: [RawType; 13] = [
        RawType::Char,
        RawType::Int8,
        RawType::UInt8,
        RawType::Int16,
        RawType::UInt16,
        RawType::Int,
        RawType::UInt,
        RawType::Int32,
        RawType::UInt32,
        RawType::Int64,
        RawType::UInt64,
        RawType::Float,
        RawType::Double,
    ];

    /// Looks up a wire type by its C name
    pub fn from_c_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.c_name() == name)
    }

    /// The C type name
    pub fn c_name(self) -> &'static str {
        match self {
            RawType::Char => "char",
            RawType::Int8 => "int8_t",
            RawType::UInt8 => "uint8_t",
            RawType::Int16 => "int16_t",
            RawType::UInt16 => "uint16_t",
            RawType::Int => "int",
            RawType::UInt => "uint",
            RawType::Int32 => "int32_t",
            RawType::UInt32 => "uint32_t",
            RawType::Int64 => "int64_t",
            RawType::UInt64 => "uint64_t",
            RawType::Float => "float",
            RawType::Double => "double",
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            RawType::Char | RawType::Int8 | RawType::UInt8 => 1,
            RawType::Int16 | RawType::UInt16 => 2,
            RawType::Int | RawType::UInt | RawType::Int32 | RawType::UInt32 | RawType::Float => 4,
            RawType::Int64 | RawType::UInt64 | RawType::Double => 8,
        }
    }

    /// The `sscanf` conversion used by generated row parsers
    pub fn scan_symbol(self) -> &'static str {
        match self {
            RawType::Char | RawType::Int8 => "hhd",
            RawType::UInt8 => "hhu",
            RawType::Int16 => "hd",
            RawType::UInt16 => "hu",
            RawType::Int | RawType::Int32 => "d",
            RawType::UInt | RawType::UInt32 => "u",
            RawType::Int64 => "lld",
            RawType::UInt64 => "llu",
            RawType::Float => "f",
            RawType::Double => "lf",
        }
    }

    /// Returns true for `float` and `double`
    pub fn is_float(self) -> bool {
        matches!(self, RawType::Float | RawType::Double)
    }

    /// Returns true for unsigned integer types
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            RawType::UInt8 | RawType::UInt16 | RawType::UInt | RawType::UInt32 | RawType::UInt64
        )
    }

    /// Returns true for the `<stdint.h>` fixed-width types
    pub fn is_fixed_width(self) -> bool {
        matches!(
            self,
            RawType::Int8
                | RawType::UInt8
                | RawType::Int16
                | RawType::UInt16
                | RawType::Int32
                | RawType::UInt32
                | RawType::Int64
                | RawType::UInt64
        )
    }

    /// The zero value of this type
    pub fn zero(self) -> Value {
        if self.is_float() {
            Value::Float(0.0)
        } else if self.is_unsigned() {
            Value::UInt(0)
        } else {
            Value::Int(0)
        }
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Function computing an element count from the enclosing record
pub type LengthFn = fn(&Record) -> Result<i64>;

/// Element count of a member
#[derive(Clone)]
pub enum Length {
    /// A literal count
    Fixed(usize),
    /// The current value of another, already decoded field
    Field(String),
    /// A function of the enclosing record
    Computed(LengthFn),
    /// No bound at all (text that cannot be read from binary)
    Unbounded,
}

impl Length {
    /// Shorthand for [`Length::Field`]
    pub fn field(name: impl Into<String>) -> Self {
        Length::Field(name.into())
    }

    /// Returns true unless the length is a literal
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Length::Fixed(_))
    }

    /// Resolves the element count against the record decoded so far
    pub fn resolve(&self, member: &str, record: &Record) -> Result<usize> {
        let length = match self {
            Length::Fixed(n) => return Ok(*n),
            Length::Field(name) => record
                .get(name)
                .ok_or_else(|| Error::unknown_field(name.as_str()))?
                .as_i64()
                .ok_or_else(|| Error::type_mismatch(name.as_str(), "an integer length"))?,
            Length::Computed(f) => f(record)?,
            Length::Unbounded => {
                return Err(Error::UnreadableMember {
                    field: member.to_string(),
                    member: "unbounded length".to_string(),
                })
            }
        };

        usize::try_from(length).map_err(|_| Error::invalid_length(member, length))
    }
}

impl From<usize> for Length {
    fn from(n: usize) -> Self {
        Length::Fixed(n)
    }
}

impl From<&str> for Length {
    fn from(name: &str) -> Self {
        Length::Field(name.to_string())
    }
}

impl PartialEq for Length {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Length::Fixed(a), Length::Fixed(b)) => a == b,
            (Length::Field(a), Length::Field(b)) => a == b,
            (Length::Computed(a), Length::Computed(b)) => *a as usize == *b as usize,
            (Length::Unbounded, Length::Unbounded) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Fixed(n) => write!(f, "Fixed({})", n),
            Length::Field(name) => write!(f, "Field({:?})", name),
            Length::Computed(_) => f.write_str("Computed(..)"),
            Length::Unbounded => f.write_str("Unbounded"),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Fixed(n) => write!(f, "{}", n),
            Length::Field(name) => f.write_str(name),
            Length::Computed(_) => f.write_str("computed"),
            Length::Unbounded => f.write_str("any_length"),
        }
    }
}

/// Enumerated symbol column
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    /// Generated `enum class` name
    pub type_name: String,
    /// Valid symbols in declaration order
    pub values: Vec<String>,
    /// File the enum definition is generated into, defaults to the owner's
    pub file_name: Option<String>,
}

impl EnumMember {
    /// Creates an enum with the given symbols
    pub fn new<S: Into<String>>(
        type_name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            values: values.into_iter().map(Into::into).collect(),
            file_name: None,
        }
    }

    /// Places the enum definition into a specific file
    pub fn in_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Returns true if `value` is one of the declared symbols
    pub fn validate_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Enum read from a numeric code through a lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct EnumLookupMember {
    /// The enum presented to generated code
    pub inner: EnumMember,
    /// Wire type of the numeric code
    pub raw_type: RawType,
    /// Code to symbol table, sorted by code
    pub lookup: Vec<(i64, String)>,
}

impl EnumLookupMember {
    /// Creates a lookup enum. Symbols are ordered by their code.
    pub fn new<S: Into<String>>(
        type_name: impl Into<String>,
        raw_type: RawType,
        lookup: impl IntoIterator<Item = (i64, S)>,
    ) -> Self {
        let mut lookup: Vec<(i64, String)> =
            lookup.into_iter().map(|(k, v)| (k, v.into())).collect();
        lookup.sort_by_key(|(k, _)| *k);

        let mut values: Vec<String> = Vec::with_capacity(lookup.len());
        for (_, symbol) in &lookup {
            if !values.contains(symbol) {
                values.push(symbol.clone());
            }
        }

        Self {
            inner: EnumMember::new(type_name, values),
            raw_type,
            lookup,
        }
    }

    /// Places the enum definition into a specific file
    pub fn in_file(mut self, file_name: impl Into<String>) -> Self {
        self.inner.file_name = Some(file_name.into());
        self
    }

    /// Maps a raw code to its symbol
    pub fn symbol(&self, code: i64) -> Result<&str> {
        self.lookup
            .iter()
            .find(|(k, _)| *k == code)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::UnknownEnumCode {
                type_name: self.inner.type_name.clone(),
                code,
            })
    }
}

/// Predicate deciding whether an offset table entry marks a present element
pub type GatePredicate = fn(&Value) -> bool;

/// Sparse array gate: an element is decoded only if its entry in the
/// offset table satisfies the predicate
#[derive(Clone)]
pub struct OffsetGate {
    /// Field holding the offset table
    pub field: String,
    /// Presence predicate
    pub predicate: GatePredicate,
}

impl OffsetGate {
    /// Gate that skips entries equal to zero
    pub fn nonzero(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            predicate: |v| !v.is_zero(),
        }
    }
}

impl PartialEq for OffsetGate {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.predicate as usize == other.predicate as usize
    }
}

impl fmt::Debug for OffsetGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetGate")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Homogeneous collection of one schema
#[derive(Debug, Clone, PartialEq)]
pub struct SubdataMember {
    /// Element schema
    pub schema: SchemaRef,
    /// Element count
    pub length: Length,
    /// Optional sparse gate
    pub offset_to: Option<OffsetGate>,
    /// Parent fields copied into every element before it is decoded
    pub passed_args: Vec<String>,
}

impl SubdataMember {
    /// Creates a collection of `length` elements of `schema`
    pub fn new(schema: SchemaRef, length: impl Into<Length>) -> Self {
        Self {
            schema,
            length: length.into(),
            offset_to: None,
            passed_args: Vec::new(),
        }
    }

    /// Gates element decoding on an offset table
    pub fn offset_to(mut self, gate: OffsetGate) -> Self {
        self.offset_to = Some(gate);
        self
    }

    /// Forwards parent fields into each element
    pub fn passed_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.passed_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Heterogeneous collection dispatched on a discriminant
#[derive(Debug, Clone, PartialEq)]
pub struct MultisubtypeMember {
    /// Generated container struct name
    pub type_name: String,
    /// Descriptor read before each element to learn its tag
    pub subtype_field: Box<Field>,
    /// Tag to element schema
    pub class_lookup: Vec<(String, SchemaRef)>,
    /// Element count
    pub length: Length,
    /// Parent fields copied into every element before it is decoded
    pub passed_args: Vec<String>,
    /// Optional sparse gate
    pub offset_to: Option<OffsetGate>,
    /// File the container definition is generated into, defaults to the owner's
    pub file_name: Option<String>,
}

impl MultisubtypeMember {
    /// Creates a heterogeneous collection
    pub fn new<S: Into<String>>(
        type_name: impl Into<String>,
        subtype_field: Field,
        class_lookup: impl IntoIterator<Item = (S, SchemaRef)>,
        length: impl Into<Length>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            subtype_field: Box::new(subtype_field),
            class_lookup: class_lookup
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
            length: length.into(),
            passed_args: Vec::new(),
            offset_to: None,
            file_name: None,
        }
    }

    /// Forwards parent fields into each element
    pub fn passed_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.passed_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Gates element decoding on an offset table
    pub fn offset_to(mut self, gate: OffsetGate) -> Self {
        self.offset_to = Some(gate);
        self
    }

    /// Places the container definition into a specific file
    pub fn in_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Looks up the element schema for a tag
    pub fn subtype(&self, tag: &str) -> Option<SchemaRef> {
        self.class_lookup
            .iter()
            .find(|(k, _)| k == tag)
            .map(|(_, v)| *v)
    }

    /// Tag map ordered by tag name
    pub fn sorted_lookup(&self) -> Vec<&(String, SchemaRef)> {
        let mut entries: Vec<_> = self.class_lookup.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Unresolved reference to a type defined by another data set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    /// Effective type name to look up
    pub type_name: String,
}

/// Descriptor of one field
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// Fixed-width number
    Number(RawType),
    /// Zero-terminated character array
    CharArray(Length),
    /// Unbounded string, never read from binary
    String,
    /// Enum symbol
    Enum(EnumMember),
    /// Enum read through a numeric lookup table
    EnumLookup(EnumLookupMember),
    /// A value of zero suppresses the remaining fields of the record
    ContinueFlag(RawType),
    /// Values that must decode as zero
    ZeroGuard {
        /// Wire type
        raw_type: RawType,
        /// Element count
        length: usize,
    },
    /// Primitive array, decodable but not exportable
    NumberArray {
        /// Element wire type
        raw_type: RawType,
        /// Element count
        length: Length,
    },
    /// Nested record stored under the field name
    Group(SchemaRef),
    /// Fields of another schema merged into this one
    Include(SchemaRef),
    /// Homogeneous collection
    Subdata(SubdataMember),
    /// Heterogeneous collection
    Multisubtype(MultisubtypeMember),
    /// Homogeneous collection synthesised for repeated values
    Array(SubdataMember),
    /// Reference resolved through the formatter's type registry
    Reference(TypeReference),
}

impl Member {
    /// Parses a raw C type string such as `int32_t`, `char[8]`,
    /// `char[name_len]`, `std::string` or `uint8_t[4]`
    pub fn parse_raw(field: &str, spec: &str) -> Result<Member> {
        let spec = spec.trim().trim_end_matches(';').trim();

        if spec == "std::string" {
            return Ok(Member::String);
        }

        if let Some((element, rest)) = spec.split_once('[') {
            let element = element.trim();
            let length = rest
                .strip_suffix(']')
                .map(str::trim)
                .filter(|l| is_word(l) && is_word(element))
                .ok_or_else(|| Error::UnknownRawType {
                    field: field.to_string(),
                    raw_type: spec.to_string(),
                })?;

            let length = match length.parse::<usize>() {
                Ok(n) => Length::Fixed(n),
                Err(_) => Length::Field(length.to_string()),
            };

            if element == "char" {
                return Ok(Member::CharArray(length));
            }

            return RawType::from_c_name(element)
                .map(|raw_type| Member::NumberArray { raw_type, length })
                .ok_or_else(|| Error::UnsupportedArrayType {
                    field: field.to_string(),
                    raw_type: spec.to_string(),
                });
        }

        RawType::from_c_name(spec)
            .map(Member::Number)
            .ok_or_else(|| Error::UnknownRawType {
                field: field.to_string(),
                raw_type: spec.to_string(),
            })
    }

    /// Wire type of scalar members
    pub fn raw_type(&self) -> Option<RawType> {
        match self {
            Member::Number(t) | Member::ContinueFlag(t) => Some(*t),
            Member::ZeroGuard { raw_type, .. } | Member::NumberArray { raw_type, .. } => {
                Some(*raw_type)
            }
            Member::EnumLookup(e) => Some(e.raw_type),
            _ => None,
        }
    }

    /// The enum view of enum members
    pub fn as_enum(&self) -> Option<&EnumMember> {
        match self {
            Member::Enum(e) => Some(e),
            Member::EnumLookup(e) => Some(&e.inner),
            _ => None,
        }
    }

    /// Returns true for collection members whose rows live in other files
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Member::Subdata(_) | Member::Array(_) | Member::Multisubtype(_)
        )
    }

    /// Name of the shared type this member defines, if it defines one
    ///
    /// Enums and heterogeneous containers are emitted once per export and
    /// are registered with the formatter under this name.
    pub fn defined_type(&self) -> Option<&str> {
        match self {
            Member::Enum(e) => Some(&e.type_name),
            Member::EnumLookup(e) => Some(&e.inner.type_name),
            Member::Multisubtype(m) => Some(&m.type_name),
            _ => None,
        }
    }

    /// Home file of a shared type definition
    pub fn definition_file(&self) -> Option<&str> {
        match self {
            Member::Enum(e) => e.file_name.as_deref(),
            Member::EnumLookup(e) => e.inner.file_name.as_deref(),
            Member::Multisubtype(m) => m.file_name.as_deref(),
            _ => None,
        }
    }

    /// Sets the home file of a shared type definition if none is set
    pub fn default_definition_file(&mut self, file_name: &str) {
        let slot = match self {
            Member::Enum(e) => &mut e.file_name,
            Member::EnumLookup(e) => &mut e.inner.file_name,
            Member::Multisubtype(m) => &mut m.file_name,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(file_name.to_string());
        }
    }

    /// Value assigned when a continuation flag suppressed this field
    pub fn empty_value(&self) -> Value {
        match self {
            Member::Number(t) => t.zero(),
            Member::ContinueFlag(_) => Value::Continue(false),
            Member::ZeroGuard { raw_type, .. } | Member::NumberArray { raw_type, .. } => {
                raw_type.zero()
            }
            Member::CharArray(_) | Member::String => Value::Text(String::new()),
            Member::Enum(_) | Member::EnumLookup(_) => Value::Symbol(
                self.as_enum()
                    .and_then(|e| e.values.first().cloned())
                    .unwrap_or_default(),
            ),
            Member::Group(schema) | Member::Include(schema) => {
                Value::Record(schema.get().empty_record())
            }
            Member::Subdata(_) | Member::Array(_) => Value::List(Vec::new()),
            Member::Multisubtype(m) => Value::Subtypes(
                m.class_lookup
                    .iter()
                    .map(|(tag, _)| (tag.clone(), Vec::new()))
                    .collect(),
            ),
            Member::Reference(_) => Value::Int(0),
        }
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl From<RawType> for Member {
    fn from(t: RawType) -> Self {
        Member::Number(t)
    }
}

impl From<EnumMember> for Member {
    fn from(e: EnumMember) -> Self {
        Member::Enum(e)
    }
}

impl From<EnumLookupMember> for Member {
    fn from(e: EnumLookupMember) -> Self {
        Member::EnumLookup(e)
    }
}

impl From<MultisubtypeMember> for Member {
    fn from(m: MultisubtypeMember) -> Self {
        Member::Multisubtype(m)
    }
}

/// Column type description written into data file headers
impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Number(t) | Member::ContinueFlag(t) => write!(f, "{}", t),
            Member::ZeroGuard { raw_type, .. } => write!(f, "{}", raw_type),
            Member::NumberArray { raw_type, length } => write!(f, "{}[{}]", raw_type, length),
            Member::CharArray(Length::Fixed(n)) => write!(f, "char[{}]", n),
            Member::CharArray(length) => write!(f, "std::string[{}]", length),
            Member::String => f.write_str("std::string"),
            Member::Enum(e) => write!(f, "enum {}", e.type_name),
            Member::EnumLookup(e) => write!(f, "enum {}", e.inner.type_name),
            Member::Group(s) => write!(f, "group {}", s.name()),
            Member::Include(s) => write!(f, "include {}", s.name()),
            Member::Subdata(s) => write!(f, "subdata {}[{}]", s.schema.name(), s.length),
            Member::Array(s) => write!(f, "array {}[{}]", s.schema.name(), s.length),
            Member::Multisubtype(m) => write!(f, "multisubtype {}[{}]", m.type_name, m.length),
            Member::Reference(r) => write!(f, "ref {}", r.type_name),
        }
    }
}
