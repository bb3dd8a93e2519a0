//! Code generation for member descriptors.

use super::headers::{headers, Need};
use super::parser::{EntryParser, MemberMethod};
use super::snippet::{ContentSnippet, HeaderSnippet, StructSnippet};
use super::{ExportConfig, ExportFormat};
use crate::error::{Error, Result};
use crate::record::{DATA_ABSENT, DATA_EXISTS};
use crate::schema::{Length, Member, MultisubtypeMember, INDEX_STRUCT_NAME};
use std::collections::BTreeSet;

impl Member {
    /// Type of the member inside a generated struct
    pub fn effective_type(&self, cfg: &ExportConfig) -> String {
        match self {
            Member::Number(t) | Member::ContinueFlag(t) => t.c_name().to_string(),
            Member::ZeroGuard { raw_type, .. } | Member::NumberArray { raw_type, .. } => {
                raw_type.c_name().to_string()
            }
            Member::CharArray(Length::Fixed(_)) => "char".to_string(),
            Member::CharArray(_) | Member::String => "std::string".to_string(),
            Member::Enum(e) => e.type_name.clone(),
            Member::EnumLookup(e) => e.inner.type_name.clone(),
            Member::Group(s) | Member::Include(s) => s.name().to_string(),
            Member::Subdata(s) | Member::Array(s) => format!(
                "{}::subdata<{}>",
                cfg.runtime(),
                cfg.namespacify(s.schema.name())
            ),
            Member::Multisubtype(m) => m.type_name.clone(),
            Member::Reference(r) => r.type_name.clone(),
        }
    }

    /// Types a struct entry of this member references
    pub fn typerefs(&self) -> BTreeSet<String> {
        let name = match self {
            Member::Enum(e) => &e.type_name,
            Member::EnumLookup(e) => &e.inner.type_name,
            Member::Multisubtype(m) => &m.type_name,
            Member::Reference(r) => &r.type_name,
            Member::Group(s) => return BTreeSet::from([s.name().to_string()]),
            Member::Subdata(s) | Member::Array(s) => {
                return BTreeSet::from([s.schema.name().to_string()])
            }
            _ => return BTreeSet::new(),
        };
        BTreeSet::from([name.clone()])
    }

    /// Headers a struct entry of this member needs in `format`
    pub fn headers(&self, format: ExportFormat) -> BTreeSet<HeaderSnippet> {
        let needs: &[Need] = match (self, format) {
            (Member::Number(t) | Member::ContinueFlag(t), ExportFormat::Struct)
                if t.is_fixed_width() =>
            {
                &[Need::FixedWidthInt]
            }
            (Member::ZeroGuard { raw_type, .. }, ExportFormat::Struct)
                if raw_type.is_fixed_width() =>
            {
                &[Need::FixedWidthInt]
            }
            (Member::CharArray(length), ExportFormat::Struct) if length.is_dynamic() => {
                &[Need::StdString]
            }
            (Member::String, ExportFormat::Struct) => &[Need::StdString],
            (Member::Multisubtype(_), ExportFormat::Struct) => &[Need::StdVector],
            (Member::Multisubtype(_), ExportFormat::StructImpl) => &[Need::CsvFile],
            (Member::Subdata(_) | Member::Array(_), ExportFormat::Struct) => &[Need::Subdata],
            _ => &[],
        };
        headers(needs)
    }

    /// Lines declaring this member inside a generated struct
    pub fn struct_entries(&self, name: &str, cfg: &ExportConfig) -> Vec<String> {
        match self {
            Member::CharArray(Length::Fixed(n)) => vec![format!("char {}[{}];", name, n)],
            _ => vec![format!("{} {};", self.effective_type(cfg), name)],
        }
    }

    /// Code filling this member from column `idx` of a tokenized row
    pub fn parsers(&self, idx: usize, name: &str, cfg: &ExportConfig) -> Result<Vec<EntryParser>> {
        let rt = cfg.runtime();
        let fill = |lines: Vec<String>, needs: &[Need]| {
            EntryParser::new(lines, needs, MemberMethod::Fill)
        };

        let parsers = match self {
            Member::Number(t) | Member::ZeroGuard { raw_type: t, .. } => vec![fill(
                vec![format!(
                    "if (sscanf(buf[{idx}], \"%{sym}\", &this->{name}) != 1) {{ return {idx}; }}",
                    idx = idx,
                    sym = t.scan_symbol(),
                    name = name
                )],
                &[Need::Sscanf],
            )],
            Member::ContinueFlag(_) => vec![fill(
                vec![
                    "//remember if the following members are undefined".to_string(),
                    format!("if (0 == strcmp(buf[{}], \"{}\")) {{", idx, DATA_ABSENT),
                    format!("\tthis->{} = 0;", name),
                    format!("}} else if (0 == strcmp(buf[{}], \"{}\")) {{", idx, DATA_EXISTS),
                    format!("\tthis->{} = 1;", name),
                    "} else {".to_string(),
                    format!(
                        "\tthrow {}::Error(\"unexpected value '%s' for {}\", buf[{}]);",
                        rt, name, idx
                    ),
                    "}".to_string(),
                ],
                &[Need::Strcmp, Need::Error],
            )],
            Member::Enum(_) | Member::EnumLookup(_) => {
                let e = self
                    .as_enum()
                    .ok_or_else(|| Error::internal("enum member without enum view"))?;
                let mut lines = vec![format!("// parse enum {}", e.type_name)];
                for (i, value) in e.values.iter().enumerate() {
                    let keyword = if i == 0 { "" } else { "else " };
                    lines.push(format!(
                        "{}if (0 == strcmp(buf[{}], \"{}\")) {{",
                        keyword, idx, value
                    ));
                    lines.push(format!("\tthis->{} = {}::{};", name, e.type_name, value));
                    lines.push("}".to_string());
                }
                lines.push("else {".to_string());
                lines.push(format!(
                    "\tthrow {}::Error(\"unknown enum value '%s' encountered. valid are: {}\", buf[{}]);",
                    rt,
                    e.values.join(","),
                    idx
                ));
                lines.push("}".to_string());
                vec![fill(lines, &[Need::Strcmp, Need::Error])]
            }
            Member::CharArray(Length::Fixed(n)) => vec![fill(
                vec![
                    format!("strncpy(this->{}, buf[{}], {});", name, idx, n),
                    format!("this->{}[{}] = '\\0';", name, n.saturating_sub(1)),
                ],
                &[Need::Strncpy],
            )],
            Member::CharArray(_) | Member::String => {
                vec![fill(vec![format!("this->{} = buf[{}];", name, idx)], &[])]
            }
            Member::Group(_) => vec![fill(vec![format!("this->{}.fill(buf[{}]);", name, idx)], &[])],
            Member::Subdata(_) | Member::Array(_) => vec![
                fill(vec![format!("this->{}.filename = buf[{}];", name, idx)], &[]),
                EntryParser::new(
                    vec![format!("this->{}.read(basedir);", name)],
                    &[],
                    MemberMethod::Recurse,
                ),
            ],
            Member::Multisubtype(_) => vec![
                fill(
                    vec![format!("this->{}.index_file.filename = buf[{}];", name, idx)],
                    &[],
                ),
                EntryParser::new(
                    vec![format!("this->{}.recurse(basedir);", name)],
                    &[],
                    MemberMethod::Recurse,
                ),
            ],
            Member::Reference(r) => {
                return Err(Error::UnresolvedReference {
                    type_name: r.type_name.clone(),
                })
            }
            Member::NumberArray { .. } | Member::Include(_) => {
                return Err(Error::internal(format!(
                    "member '{}' of kind {} has no row parser",
                    name, self
                )))
            }
        };

        Ok(parsers)
    }

    /// Type definitions this member contributes to `format`
    ///
    /// Enums produce an `enum class` declaration and heterogeneous
    /// collections a container struct with its implementation. The snippets
    /// are placed in the member's definition file.
    pub fn type_snippets(&self, format: ExportFormat, cfg: &ExportConfig) -> Result<Vec<ContentSnippet>> {
        match (self, format) {
            (Member::Enum(_) | Member::EnumLookup(_), ExportFormat::Struct) => {
                let e = self
                    .as_enum()
                    .ok_or_else(|| Error::internal("enum member without enum view"))?;
                let values: Vec<String> = e.values.iter().map(|v| format!("\t{}", v)).collect();
                let text = format!("enum class {} {{\n{}\n}};\n\n", e.type_name, values.join(",\n"));

                Ok(vec![ContentSnippet::body(text, self.home_file()?, e.type_name.as_str())
                    .label(format!("enum class {}", e.type_name))
                    .defines([e.type_name.as_str()])])
            }
            (Member::Multisubtype(m), ExportFormat::Struct) => {
                Ok(vec![container_struct(m, self.home_file()?, cfg)])
            }
            (Member::Multisubtype(m), ExportFormat::StructImpl) => {
                Ok(vec![container_impl(m, self.home_file()?, cfg)])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Member {
    fn home_file(&self) -> Result<&str> {
        self.definition_file().ok_or_else(|| {
            Error::internal(format!(
                "type {} has no definition file",
                self.defined_type().unwrap_or_default()
            ))
        })
    }
}

fn container_struct(m: &MultisubtypeMember, file_name: &str, cfg: &ExportConfig) -> ContentSnippet {
    let rt = cfg.runtime();
    let mut builder = StructSnippet::new(file_name, m.type_name.as_str());

    for (tag, schema) in m.sorted_lookup() {
        builder.add_member(format!(
            "struct {}::subdata<{}> {};",
            rt,
            cfg.namespacify(schema.name()),
            tag
        ));
        builder.add_references([schema.name().to_string()]);
    }

    builder.add_includes(headers(&[Need::Subdata]));
    builder.add_references([INDEX_STRUCT_NAME.to_string()]);
    builder.add_member(format!(
        "struct {}::subdata<{}> index_file;\n",
        rt, INDEX_STRUCT_NAME
    ));

    for method in MemberMethod::ALL {
        builder.add_member(format!("{};", method.signature("", false, cfg)));
        builder.add_includes(method.declaration_headers());
    }

    builder.build()
}

fn container_impl(m: &MultisubtypeMember, file_name: &str, cfg: &ExportConfig) -> ContentSnippet {
    let rt = cfg.runtime();
    let name = &m.type_name;
    let count = m.class_lookup.len();

    let mut text = format!(
        "int {name}::fill(char * /*line*/) {{\n\
         \treturn -1;\n\
         }}\n\
         int {name}::recurse({rt}::Dir basedir) {{\n\
         \tthis->index_file.read(basedir); //read ref-file entries\n\
         \tint subtype_count = this->index_file.data.size();\n\
         \tif (subtype_count != {count}) {{\n\
         \t\tthrow {rt}::Error(\"multisubtype index file entry count mismatched! %d != {count}\", subtype_count);\n\
         \t}}\n\
         \n\
         \t{rt}::Dir new_basedir = basedir.append({rt}::dirname(this->index_file.filename));\n\
         \tint idx = -1, idxtry;\n\
         \n",
        name = name,
        rt = rt,
        count = count,
    );

    let mut references: BTreeSet<String> = BTreeSet::new();
    for (tag, schema) in m.sorted_lookup() {
        references.insert(schema.name().to_string());
        text.push_str(&format!(
            "\tidxtry = 0;\n\
             \tfor (auto &file_reference : this->index_file.data) {{\n\
             \t\tif (file_reference.subtype == \"{tag}\") {{\n\
             \t\t\tidx = idxtry;\n\
             \t\t\tbreak;\n\
             \t\t}}\n\
             \t\tidxtry += 1;\n\
             \t}}\n\
             \tif (idx == -1) {{\n\
             \t\tthrow {rt}::Error(\"multisubtype index file contains no entry for {tag}!\");\n\
             \t}}\n\
             \tthis->{tag}.filename = this->index_file.data[idx].filename;\n\
             \tthis->{tag}.read(new_basedir);\n\
             \tidx = -1;\n\
             \n",
            tag = tag,
            rt = rt,
        ));
    }
    text.push_str("\treturn -1;\n}\n");

    references.insert(name.clone());
    references.insert(INDEX_STRUCT_NAME.to_string());

    let includes = headers(&[Need::Dir, Need::Error, Need::CsvFile]);

    ContentSnippet::body(text, file_name, name.as_str())
        .label(format!("multisubtype {} container fill function", name))
        .references(references)
        .includes(includes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::schema::{EnumMember, RawType, SubdataMember, TypeReference};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_parser() {
        let cfg = ExportConfig::default();
        let parsers = Member::Number(RawType::UInt16).parsers(2, "hp", &cfg).unwrap();
        assert_eq!(parsers.len(), 1);
        assert_eq!(
            parsers[0].lines,
            vec!["if (sscanf(buf[2], \"%hu\", &this->hp) != 1) { return 2; }"]
        );
        assert!(parsers[0].headers.contains(&HeaderSnippet::global("cstdio")));
    }

    #[test]
    fn test_enum_parser() {
        let cfg = ExportConfig::default();
        let member = Member::Enum(EnumMember::new("leaf_color", ["A", "B"]));
        let lines = member.parsers(1, "color", &cfg).unwrap().remove(0).lines;

        assert_eq!(
            lines,
            vec![
                "// parse enum leaf_color",
                "if (0 == strcmp(buf[1], \"A\")) {",
                "\tthis->color = leaf_color::A;",
                "}",
                "else if (0 == strcmp(buf[1], \"B\")) {",
                "\tthis->color = leaf_color::B;",
                "}",
                "else {",
                "\tthrow openage::util::Error(\"unknown enum value '%s' encountered. valid are: A,B\", buf[1]);",
                "}",
            ]
        );
    }

    #[test]
    fn test_fixed_char_array() {
        let cfg = ExportConfig::default();
        let member = Member::CharArray(Length::Fixed(8));

        assert_eq!(member.struct_entries("name", &cfg), vec!["char name[8];"]);
        assert_eq!(
            member.parsers(1, "name", &cfg).unwrap()[0].lines,
            vec!["strncpy(this->name, buf[1], 8);", "this->name[7] = '\\0';"]
        );
        assert!(member.headers(ExportFormat::Struct).is_empty());
    }

    #[test]
    fn test_subdata_parsers_split_methods() {
        let cfg = ExportConfig::default();
        let member = Member::Subdata(SubdataMember::new(fixtures::TREE, "tree_count"));

        assert_eq!(
            member.effective_type(&cfg),
            "openage::util::subdata<gamedata::tree>"
        );
        let parsers = member.parsers(1, "trees", &cfg).unwrap();
        assert_eq!(parsers[0].destination, MemberMethod::Fill);
        assert_eq!(parsers[1].destination, MemberMethod::Recurse);
        assert_eq!(parsers[1].lines, vec!["this->trees.read(basedir);"]);
    }

    #[test]
    fn test_unresolved_reference() {
        let cfg = ExportConfig::default();
        let member = Member::Reference(TypeReference {
            type_name: "unit_class".to_string(),
        });
        assert!(matches!(
            member.parsers(0, "class", &cfg),
            Err(Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_enum_snippet() {
        let cfg = ExportConfig::default();
        let member = Member::Enum(fixtures::leaf_color().in_file("nature"));

        let snippets = member.type_snippets(ExportFormat::Struct, &cfg).unwrap();
        assert_eq!(snippets[0].text(), "enum class leaf_color {\n\tA,\n\tB,\n\tC\n};\n\n");
        assert_eq!(snippets[0].file_name(), Some("nature"));
        assert!(member
            .type_snippets(ExportFormat::Csv, &cfg)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_container_snippets() {
        let cfg = ExportConfig::default();
        let member = Member::Multisubtype(fixtures::animal_kinds().in_file("zoo"));

        let decl = member.type_snippets(ExportFormat::Struct, &cfg).unwrap().remove(0);
        assert!(decl.text().starts_with(
            "struct animal_kinds {\n\
             \tstruct openage::util::subdata<gamedata::bird> bird;\n\
             \tstruct openage::util::subdata<gamedata::fish> fish;\n\
             \tstruct openage::util::subdata<multisubtype_ref> index_file;\n\n"
        ));
        assert!(decl.referenced_types().contains(INDEX_STRUCT_NAME));

        let imp = member
            .type_snippets(ExportFormat::StructImpl, &cfg)
            .unwrap()
            .remove(0);
        assert!(imp.text().contains("mismatched! %d != 2\""));
        assert!(imp.text().contains("this->fish.read(new_basedir);"));
        assert!(imp.defined_types().is_empty());
    }
}
