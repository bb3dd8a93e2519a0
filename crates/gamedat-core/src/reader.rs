//! Schema-driven binary decoding.
//!
//! [`BinaryReader`] walks a schema's fields in declaration order against a
//! byte buffer. All primitives are fixed-width little-endian. Decoding is
//! strictly sequential, except that an offset gate can skip elements of a
//! collection.
//!
//! A continuation flag that decodes as zero suppresses every remaining field
//! of the current record: those fields get their empty value and consume no
//! bytes.

use crate::error::{Error, Result};
use crate::record::{Record, Value};
use crate::schema::{
    ExportMode, Field, Member, MultisubtypeMember, OffsetGate, RawType, Schema, SubdataMember,
    READ_MODES,
};
use bytes::Buf;
use tracing::{debug, trace};

/// Maximum include nesting before the include chain is treated as cyclic
const MAX_INCLUDE_DEPTH: usize = 64;

/// Decoder for one raw buffer
#[derive(Debug, Clone, Copy)]
pub struct BinaryReader<'a> {
    raw: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader over `raw`
    pub fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    /// Size of the underlying buffer
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decodes one record of `schema` starting at `offset`
    ///
    /// Returns the offset just past the record and the decoded record.
    pub fn read(&self, schema: &Schema, offset: usize) -> Result<(usize, Record)> {
        let mut record = Record::new();
        let end = self.read_into(schema, offset, &mut record)?;
        Ok((end, record))
    }

    /// Decodes `schema` into an existing record, which may already hold
    /// caller-supplied fields
    pub fn read_into(&self, schema: &Schema, offset: usize, record: &mut Record) -> Result<usize> {
        debug!("{:#010x}: reading {}", offset, schema.name_struct());
        let end = self.read_schema(schema, offset, record, 0)?;
        debug!("{:#010x}: finished {}", end, schema.name_struct());
        Ok(end)
    }

    fn read_schema(
        &self,
        schema: &Schema,
        mut offset: usize,
        record: &mut Record,
        include_depth: usize,
    ) -> Result<usize> {
        if include_depth > MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeCycle {
                schema: schema.name_struct().to_string(),
            });
        }

        let mut suppressed = false;

        for entry in schema.data_format(Some(&READ_MODES), false)? {
            let field = entry.field;
            let member = field.member()?;

            if suppressed {
                match member.as_ref() {
                    Member::Include(included) => record.merge(included.get().empty_record()),
                    other => record.set(field.name.as_str(), other.empty_value()),
                }
                continue;
            }

            match member.as_ref() {
                Member::Include(included) => {
                    offset = self.read_schema(included.get(), offset, record, include_depth + 1)?;
                }
                Member::Group(group) => {
                    let mut nested = Record::new();
                    offset = self.read_schema(group.get(), offset, &mut nested, 0)?;
                    record.set(field.name.as_str(), nested);
                }
                Member::Subdata(sub) | Member::Array(sub) => {
                    offset = self.read_subdata(field, sub, offset, record)?;
                }
                Member::Multisubtype(multi) => {
                    offset = self.read_multisubtype(field, multi, offset, record)?;
                }
                scalar => {
                    let (next, abort) = self.read_scalar(field, scalar, offset, record)?;
                    offset = next;
                    if abort {
                        trace!("{}: remaining members absent", schema.name_struct());
                        suppressed = true;
                    }
                }
            }
        }

        Ok(offset)
    }

    fn read_subdata(
        &self,
        field: &Field,
        sub: &SubdataMember,
        mut offset: usize,
        record: &mut Record,
    ) -> Result<usize> {
        let count = sub.length.resolve(&field.name, record)?;
        let present = gate_entries(sub.offset_to.as_ref(), count, record)?;
        let args = passed_args(&sub.passed_args, record)?;

        trace!("{:#010x}: {} x {}", offset, count, sub.schema.name());

        let mut items = Vec::with_capacity(count);
        for idx in 0..count {
            if !is_present(present.as_deref(), idx) {
                trace!("{}[{}]: skipped by offset gate", field.name, idx);
                continue;
            }

            let mut item = args.clone();
            offset = self.read_schema(sub.schema.get(), offset, &mut item, 0)?;
            items.push(item);
        }

        record.set(field.name.as_str(), Value::List(items));
        Ok(offset)
    }

    fn read_multisubtype(
        &self,
        field: &Field,
        multi: &MultisubtypeMember,
        mut offset: usize,
        record: &mut Record,
    ) -> Result<usize> {
        let count = multi.length.resolve(&field.name, record)?;
        let present = gate_entries(multi.offset_to.as_ref(), count, record)?;
        let args = passed_args(&multi.passed_args, record)?;
        let discriminant = multi.subtype_field.member()?;

        let mut groups: Vec<(String, Vec<Record>)> = multi
            .class_lookup
            .iter()
            .map(|(tag, _)| (tag.clone(), Vec::new()))
            .collect();

        for idx in 0..count {
            if !is_present(present.as_deref(), idx) {
                trace!("{}[{}]: skipped by offset gate", field.name, idx);
                continue;
            }

            // the discriminant is stored on the parent record
            let (next, _) = self.read_scalar(&multi.subtype_field, &discriminant, offset, record)?;
            offset = next;

            let tag = record
                .get(&multi.subtype_field.name)
                .map(ToString::to_string)
                .ok_or_else(|| Error::unknown_field(multi.subtype_field.name.as_str()))?;

            let schema = multi.subtype(&tag).ok_or_else(|| Error::UnknownSubtype {
                field: field.name.clone(),
                tag: tag.clone(),
            })?;

            trace!("{:#010x}: {}[{}] is {}", offset, field.name, idx, tag);

            let mut item = args.clone();
            offset = self.read_schema(schema.get(), offset, &mut item, 0)?;

            if let Some((_, items)) = groups.iter_mut().find(|(t, _)| *t == tag) {
                items.push(item);
            }
        }

        record.set(field.name.as_str(), Value::Subtypes(groups));
        Ok(offset)
    }

    /// Decodes a primitive field. Returns the next offset and whether the
    /// remaining fields are suppressed.
    fn read_scalar(
        &self,
        field: &Field,
        member: &Member,
        offset: usize,
        record: &mut Record,
    ) -> Result<(usize, bool)> {
        let name = if field.mode == ExportMode::ReadUnknown {
            format!("unknown-0x{:08x}", offset)
        } else {
            field.name.clone()
        };

        let (value, consumed, abort) = match member {
            Member::Number(raw_type) => {
                let mut values = self.read_numbers(&name, *raw_type, offset, 1)?;
                (collapse(&mut values), raw_type.size(), false)
            }
            Member::NumberArray { raw_type, length } => {
                let count = length.resolve(&field.name, record)?;
                let mut values = self.read_numbers(&name, *raw_type, offset, count)?;
                (collapse(&mut values), raw_type.size() * count, false)
            }
            Member::ZeroGuard { raw_type, length } => {
                let mut values = self.read_numbers(&name, *raw_type, offset, *length)?;
                if !values.iter().all(Value::is_zero) {
                    return Err(Error::ZeroGuardViolation {
                        field: name,
                        offset,
                    });
                }
                (collapse(&mut values), raw_type.size() * length, false)
            }
            Member::CharArray(length) => {
                let count = length.resolve(&field.name, record)?;
                let bytes = self.take(&name, offset, count)?;
                (Value::Text(zero_terminated(bytes, &name, offset)?), count, false)
            }
            Member::EnumLookup(lookup) => {
                let mut values = self.read_numbers(&name, lookup.raw_type, offset, 1)?;
                let code = collapse(&mut values)
                    .as_i64()
                    .ok_or_else(|| Error::type_mismatch(name.as_str(), "an integer enum code"))?;
                let symbol = lookup.symbol(code)?.to_string();
                (Value::Symbol(symbol), lookup.raw_type.size(), false)
            }
            Member::ContinueFlag(raw_type) => {
                let mut values = self.read_numbers(&name, *raw_type, offset, 1)?;
                let present = !collapse(&mut values).is_zero();
                (Value::Continue(present), raw_type.size(), !present)
            }
            other => {
                return Err(Error::UnreadableMember {
                    field: name,
                    member: other.to_string(),
                })
            }
        };

        trace!("{:#010x}: {} <{}> = {}", offset, name, member, value);

        record.set(name, value);
        Ok((offset + consumed, abort))
    }

    fn read_numbers(
        &self,
        name: &str,
        raw_type: RawType,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Value>> {
        let size = raw_type
            .size()
            .checked_mul(count)
            .ok_or_else(|| Error::invalid_length(name, i64::try_from(count).unwrap_or(i64::MAX)))?;
        let mut buf = self.take(name, offset, size)?;

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let value = match raw_type {
                RawType::Char | RawType::Int8 => Value::Int(i64::from(buf.get_i8())),
                RawType::UInt8 => Value::UInt(u64::from(buf.get_u8())),
                RawType::Int16 => Value::Int(i64::from(buf.get_i16_le())),
                RawType::UInt16 => Value::UInt(u64::from(buf.get_u16_le())),
                RawType::Int | RawType::Int32 => Value::Int(i64::from(buf.get_i32_le())),
                RawType::UInt | RawType::UInt32 => Value::UInt(u64::from(buf.get_u32_le())),
                RawType::Int64 => Value::Int(buf.get_i64_le()),
                RawType::UInt64 => Value::UInt(buf.get_u64_le()),
                RawType::Float => finite(f64::from(buf.get_f32_le()), name, offset)?,
                RawType::Double => finite(buf.get_f64_le(), name, offset)?,
            };
            values.push(value);
        }

        Ok(values)
    }

    fn take(&self, name: &str, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.raw.get(offset..end))
            .ok_or_else(|| Error::Truncated {
                field: name.to_string(),
                offset,
                needed: len,
                available: self.raw.len().saturating_sub(offset),
            })
    }
}

/// A single value stays scalar, anything else becomes an array
fn collapse(values: &mut Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(std::mem::take(values))
    }
}

fn finite(value: f64, name: &str, offset: usize) -> Result<Value> {
    if value.is_finite() {
        Ok(Value::Float(value))
    } else {
        Err(Error::NonFiniteFloat {
            field: name.to_string(),
            offset,
        })
    }
}

fn zero_terminated(bytes: &[u8], name: &str, offset: usize) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(str::to_string)
        .map_err(|_| Error::InvalidText {
            field: name.to_string(),
            offset,
        })
}

fn gate_entries(gate: Option<&OffsetGate>, count: usize, record: &Record) -> Result<Option<Vec<bool>>> {
    let Some(gate) = gate else {
        return Ok(None);
    };

    let table = record
        .get(&gate.field)
        .ok_or_else(|| Error::unknown_field(gate.field.as_str()))?;
    let entries = match table {
        Value::Array(entries) => entries.as_slice(),
        single => std::slice::from_ref(single),
    };

    if entries.len() < count {
        return Err(Error::OffsetCountMismatch {
            field: gate.field.clone(),
            expected: count,
            found: entries.len(),
        });
    }

    Ok(Some(
        entries[..count].iter().map(|v| (gate.predicate)(v)).collect(),
    ))
}

fn is_present(gate: Option<&[bool]>, idx: usize) -> bool {
    gate.map_or(true, |present| present[idx])
}

fn passed_args(names: &[String], record: &Record) -> Result<Record> {
    let mut args = Record::new();
    for name in names {
        let value = record
            .get(name)
            .ok_or_else(|| Error::unknown_field(name.as_str()))?;
        args.set(name.as_str(), value.clone());
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::schema::{Length, SchemaRef};
    use bytes::BufMut;
    use pretty_assertions::assert_eq;
    use std::sync::OnceLock;

    fn tree_bytes(buf: &mut Vec<u8>, id: i32, name: &[u8; 8]) {
        buf.put_i32_le(id);
        buf.put_slice(name);
    }

    #[test]
    fn test_read_plain_record() {
        let mut buf = Vec::new();
        tree_bytes(&mut buf, 3, b"oak\0\0\0\0\0");

        let (end, record) = BinaryReader::new(&buf).read(fixtures::tree(), 0).unwrap();

        assert_eq!(end, 12);
        assert_eq!(record.get("id"), Some(&Value::Int(3)));
        assert_eq!(record.get("name"), Some(&Value::Text("oak".into())));
    }

    #[test]
    fn test_read_at_offset() {
        let mut buf = vec![0xff, 0xff];
        tree_bytes(&mut buf, -1, b"birch\0\0\0");

        let (end, record) = BinaryReader::new(&buf).read(fixtures::tree(), 2).unwrap();

        assert_eq!(end, 14);
        assert_eq!(record.get("id"), Some(&Value::Int(-1)));
    }

    #[test]
    fn test_truncated_input() {
        let buf = [3u8, 0, 0, 0, b'o', b'a'];
        let err = BinaryReader::new(&buf).read(fixtures::tree(), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                offset: 4,
                needed: 8,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_read_subdata_and_group() {
        let mut buf = vec![2u8];
        tree_bytes(&mut buf, 1, b"ash\0\0\0\0\0");
        tree_bytes(&mut buf, 2, b"elm\0\0\0\0\0");
        tree_bytes(&mut buf, 9, b"yew\0\0\0\0\0");

        let (end, record) = BinaryReader::new(&buf).read(fixtures::forest(), 0).unwrap();

        assert_eq!(end, buf.len());
        let Some(Value::List(trees)) = record.get("trees") else {
            panic!("trees is not a list");
        };
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].get("name"), Some(&Value::Text("elm".into())));

        let Some(Value::Record(oldest)) = record.get("oldest") else {
            panic!("oldest is not a record");
        };
        assert_eq!(oldest.get("id"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_include_merges_fields() {
        let mut buf = Vec::new();
        tree_bytes(&mut buf, 5, b"house\0\0\0");
        buf.put_i16_le(250);
        buf.put_u8(4);

        let (_, record) = BinaryReader::new(&buf).read(fixtures::building(), 0).unwrap();

        let names: Vec<_> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name", "hit_points", "garrison"]);
        assert_eq!(record.get("garrison"), Some(&Value::UInt(4)));
    }

    #[test]
    fn test_continue_flag_suppresses_tail() {
        let buf = [7u8, 0, b'x', b'x'];
        let (end, record) = BinaryReader::new(&buf).read(fixtures::sign(), 0).unwrap();

        assert_eq!(end, 2);
        assert_eq!(record.get("has_text"), Some(&Value::Continue(false)));
        assert_eq!(record.get("text"), Some(&Value::Text(String::new())));

        let buf = [7u8, 1, b'a', b'b', 0, 0];
        let (end, record) = BinaryReader::new(&buf).read(fixtures::sign(), 0).unwrap();

        assert_eq!(end, 6);
        assert_eq!(record.get("has_text"), Some(&Value::Continue(true)));
        assert_eq!(record.get("text"), Some(&Value::Text("ab".into())));
    }

    #[test]
    fn test_zero_guard() {
        let ok = [1u8, 0, 0, 0];
        assert!(BinaryReader::new(&ok).read(fixtures::padded(), 0).is_ok());

        for bad in [[1u8, 0, 0, 5], [1u8, 0, 1, 0]] {
            let err = BinaryReader::new(&bad).read(fixtures::padded(), 0).unwrap_err();
            assert!(matches!(err, Error::ZeroGuardViolation { offset: 2, .. }));
        }
    }

    #[test]
    fn test_unknown_and_array_fields() {
        let mut buf = Vec::new();
        buf.put_u16_le(0xbeef);
        buf.put_u8(2);
        buf.put_i16_le(-4);
        buf.put_i16_le(8);
        buf.put_f32_le(0.5);

        let (end, record) = BinaryReader::new(&buf).read(fixtures::blob(), 0).unwrap();

        assert_eq!(end, buf.len());
        assert_eq!(record.get("unknown-0x00000000"), Some(&Value::UInt(0xbeef)));
        assert_eq!(
            record.get("values"),
            Some(&Value::Array(vec![Value::Int(-4), Value::Int(8)]))
        );
        assert_eq!(record.get("ratio"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_non_finite_float() {
        let mut buf = vec![0u8, 0, 0];
        buf.put_f32_le(f32::NAN);

        let err = BinaryReader::new(&buf).read(fixtures::blob(), 0).unwrap_err();
        assert!(matches!(err, Error::NonFiniteFloat { offset: 3, .. }));
    }

    #[test]
    fn test_read_multisubtype() {
        let mut buf = Vec::new();
        buf.put_u16_le(3);
        buf.put_u8(1);
        buf.put_f32_le(1.5);
        buf.put_u8(2);
        buf.put_i16_le(-30);
        buf.put_u8(1);
        buf.put_f32_le(2.0);

        let (end, record) = BinaryReader::new(&buf).read(fixtures::zoo(), 0).unwrap();

        assert_eq!(end, buf.len());
        let Some(Value::Subtypes(groups)) = record.get("animals") else {
            panic!("animals is not a subtype map");
        };
        let counts: Vec<_> = groups.iter().map(|(t, v)| (t.as_str(), v.len())).collect();
        assert_eq!(counts, vec![("bird", 2), ("fish", 1)]);
        assert_eq!(groups[1].1[0].get("depth"), Some(&Value::Int(-30)));
    }

    #[test]
    fn test_unknown_enum_code() {
        let buf = [1u8, 0, 9];
        let err = BinaryReader::new(&buf).read(fixtures::zoo(), 0).unwrap_err();
        assert!(matches!(err, Error::UnknownEnumCode { code: 9, .. }));
    }

    fn tagged() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new("tagged", "test", "numeric tags").field(
                ExportMode::ReadExport,
                "items",
                MultisubtypeMember::new(
                    "tagged_items",
                    Field::new(ExportMode::Read, "tag", "uint8_t"),
                    [("1", fixtures::BIRD)],
                    Length::Fixed(2),
                ),
            )
        })
    }

    #[test]
    fn test_unknown_subtype_tag() {
        let mut buf = vec![1u8];
        buf.put_f32_le(3.0);
        buf.put_u8(2);

        let err = BinaryReader::new(&buf).read(tagged(), 0).unwrap_err();
        assert!(matches!(err, Error::UnknownSubtype { ref tag, .. } if tag == "2"));
    }

    #[test]
    fn test_offset_gate_skips_entries() {
        let mut buf = Vec::new();
        buf.put_i32_le(40);
        buf.put_i32_le(0);
        buf.put_i32_le(80);
        tree_bytes(&mut buf, 1, b"ash\0\0\0\0\0");
        tree_bytes(&mut buf, 3, b"fir\0\0\0\0\0");

        let (end, record) = BinaryReader::new(&buf).read(fixtures::orchard(), 0).unwrap();

        assert_eq!(end, buf.len());
        let Some(Value::List(trees)) = record.get("trees") else {
            panic!("trees is not a list");
        };
        let ids: Vec<_> = trees.iter().map(|t| t.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(Value::Int(1)), Some(Value::Int(3))]);
    }

    fn short_gate() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new("short_gate", "test", "offset table too short")
                .field(ExportMode::Read, "offsets", "int32_t[2]")
                .field(
                    ExportMode::ReadExport,
                    "trees",
                    Member::Subdata(
                        SubdataMember::new(fixtures::TREE, Length::Fixed(3))
                            .offset_to(OffsetGate::nonzero("offsets")),
                    ),
                )
        })
    }

    #[test]
    fn test_offset_count_mismatch() {
        let buf = [1u8, 0, 0, 0, 1, 0, 0, 0];
        let err = BinaryReader::new(&buf).read(short_gate(), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::OffsetCountMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    fn negative() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::new("negative", "test", "computed length below zero").field(
                ExportMode::ReadExport,
                "trees",
                Member::Subdata(SubdataMember::new(
                    SchemaRef::new(fixtures::tree),
                    Length::Computed(|_| Ok(-1)),
                )),
            )
        })
    }

    #[test]
    fn test_negative_length() {
        let err = BinaryReader::new(&[]).read(negative(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { length: -1, .. }));
    }

    #[test]
    fn test_passed_args_prepopulate_elements() {
        fn parent() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::new("parent", "test", "forwards its version")
                    .field(ExportMode::Read, "version", "uint8_t")
                    .field(
                        ExportMode::ReadExport,
                        "trees",
                        Member::Subdata(
                            SubdataMember::new(fixtures::TREE, Length::Fixed(1))
                                .passed_args(["version"]),
                        ),
                    )
            })
        }

        let mut buf = vec![7u8];
        tree_bytes(&mut buf, 1, b"ash\0\0\0\0\0");

        let (_, record) = BinaryReader::new(&buf).read(parent(), 0).unwrap();
        let Some(Value::List(trees)) = record.get("trees") else {
            panic!("trees is not a list");
        };
        assert_eq!(trees[0].get("version"), Some(&Value::UInt(7)));
    }
}
