//! Schemas shared by the unit tests.

use crate::schema::{
    EnumLookupMember, EnumMember, ExportMode, Field, Length, Member, MultisubtypeMember,
    OffsetGate, RawType, Schema, SchemaRef, SubdataMember,
};
use std::sync::OnceLock;

use ExportMode::{NoReadExport, Read, ReadExport, ReadUnknown};

pub(crate) const TREE: SchemaRef = SchemaRef::new(tree);
pub(crate) const OBJECT: SchemaRef = SchemaRef::new(object);
pub(crate) const BIRD: SchemaRef = SchemaRef::new(bird);
pub(crate) const FISH: SchemaRef = SchemaRef::new(fish);
pub(crate) const NODE: SchemaRef = SchemaRef::new(node);
pub(crate) const CYCLIC_A: SchemaRef = SchemaRef::new(cyclic_a);
pub(crate) const CYCLIC_B: SchemaRef = SchemaRef::new(cyclic_b);

/// Two plain columns: `id` and an 8 byte name
pub(crate) fn tree() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("tree", "nature", "a tree")
            .field(ReadExport, "id", "int32_t")
            .field(ReadExport, "name", "char[8]")
    })
}

pub(crate) fn leaf_color() -> EnumMember {
    EnumMember::new("leaf_color", ["A", "B", "C"])
}

pub(crate) fn leaf() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("leaf", "nature", "a leaf")
            .field(ReadExport, "size", "uint8_t")
            .field(NoReadExport, "color", leaf_color())
    })
}

/// Trees behind a count field, plus a group
pub(crate) fn forest() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("forest", "nature", "many trees\nin one place")
            .field(ReadExport, "tree_count", "uint8_t")
            .field(
                ReadExport,
                "trees",
                Member::Subdata(SubdataMember::new(TREE, "tree_count")),
            )
            .field(ReadExport, "oldest", Member::Group(TREE))
    })
}

pub(crate) fn object() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("object", "objects", "any object")
            .field(ReadExport, "id", "int32_t")
            .field(ReadExport, "name", "char[8]")
    })
}

/// Includes [`object`]
pub(crate) fn building() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("building", "buildings", "an object that stays in place")
            .include(OBJECT)
            .field(ReadExport, "hit_points", "int16_t")
            .field(ReadExport, "garrison", "uint8_t")
    })
}

/// Optional tail behind a continuation flag
pub(crate) fn sign() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("sign", "signs", "a sign with optional text")
            .field(ReadExport, "id", "uint8_t")
            .field(Read, "has_text", Member::ContinueFlag(RawType::UInt8))
            .field(ReadExport, "text", "char[4]")
    })
}

/// A value followed by two bytes that must be zero
pub(crate) fn padded() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("padded", "misc", "padded value")
            .field(ReadExport, "value", "int16_t")
            .field(
                Read,
                "padding",
                Member::ZeroGuard {
                    raw_type: RawType::UInt8,
                    length: 2,
                },
            )
    })
}

/// Unknown and read-only columns around one exported column
pub(crate) fn blob() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("blob", "misc", "partially understood data")
            .field(ReadUnknown, "skip", "uint16_t")
            .field(Read, "value_count", "uint8_t")
            .field(Read, "values", "int16_t[value_count]")
            .field(ReadExport, "ratio", "float")
    })
}

pub(crate) fn bird() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("bird", "animals", "an animal that flies")
            .field(ReadExport, "wingspan", "float")
    })
}

pub(crate) fn fish() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("fish", "animals", "an animal that swims")
            .field(ReadExport, "depth", "int16_t")
    })
}

pub(crate) fn animal_kinds() -> MultisubtypeMember {
    MultisubtypeMember::new(
        "animal_kinds",
        Field::new(
            Read,
            "animal_type",
            EnumLookupMember::new("animal_type", RawType::UInt8, [(1, "bird"), (2, "fish")]),
        ),
        [("bird", BIRD), ("fish", FISH)],
        "animal_count",
    )
}

/// Heterogeneous collection of birds and fish
pub(crate) fn zoo() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("zoo", "zoo", "animals of all kinds")
            .field(ReadExport, "animal_count", "uint16_t")
            .field(ReadExport, "animals", animal_kinds())
    })
}

/// Sparse collection gated by an offset table
pub(crate) fn orchard() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("orchard", "nature", "trees at known offsets")
            .field(Read, "tree_offsets", "int32_t[3]")
            .field(
                ReadExport,
                "trees",
                Member::Subdata(
                    SubdataMember::new(TREE, Length::Fixed(3))
                        .offset_to(OffsetGate::nonzero("tree_offsets")),
                ),
            )
    })
}

/// Schema that contains itself
pub(crate) fn node() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new("node", "graph", "tree node")
            .field(ReadExport, "value", "int32_t")
            .field(ReadExport, "child_count", "uint8_t")
            .field(
                ReadExport,
                "children",
                Member::Subdata(SubdataMember::new(NODE, "child_count")),
            )
    })
}

pub(crate) fn cyclic_a() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::new("cyclic_a", "cycle", "a").include(CYCLIC_B))
}

pub(crate) fn cyclic_b() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::new("cyclic_b", "cycle", "b").include(CYCLIC_A))
}
