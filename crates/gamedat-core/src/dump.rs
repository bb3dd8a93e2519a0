//! Flattening decoded records into data definitions.
//!
//! Every collection member of a record becomes its own data file. Its name
//! is the parent file name followed by `-member`. Elements of a collection
//! are dumped under `collection/0000`, `collection/0001` and so on, so their
//! own collections land in the collection's directory. A heterogeneous
//! collection writes one file per subtype tag below `parent-member/` and an
//! index file at `parent-member` listing the subtype files.

use crate::codegen::ExportConfig;
use crate::definition::{DataDefinition, StructDefinition};
use crate::error::{Error, Result};
use crate::record::{Record, Value};
use crate::schema::{
    index_file_schema, Member, Schema, EXPORT_MODES, INDEX_FILENAME_FIELD, INDEX_SUBTYPE_FIELD,
};
use tracing::{debug, trace};

/// Dumps one record
///
/// Returns the data definitions of every collection reachable from `record`
/// and the record's own row. In the row, collection fields hold the path of
/// their data file and group fields hold the group's row.
pub fn dump(
    schema: &Schema,
    record: &Record,
    filename: &str,
    cfg: &ExportConfig,
) -> Result<(Vec<DataDefinition>, Record)> {
    let mut definitions = Vec::new();
    let mut row = Record::new();

    for entry in schema.data_format(Some(&EXPORT_MODES), true)? {
        let field = entry.field;
        let name = field.name.as_str();
        let member = field.member()?;
        let value = record.get(name).ok_or_else(|| Error::MissingValue {
            field: name.to_string(),
        })?;

        match member.as_ref() {
            Member::Subdata(sub) | Member::Array(sub) => {
                let member_file = format!("{}-{}", filename, name);
                let items = match value {
                    Value::List(items) => items.as_slice(),
                    _ => return Err(Error::type_mismatch(name, "a list of records")),
                };

                trace!("{}: entering {} ({} items)", filename, name, items.len());

                let schema = sub.schema.get();
                let rows = dump_items(schema, items, &member_file, cfg, &mut definitions)?;
                definitions.push(DataDefinition::new(
                    StructDefinition::new(schema)?,
                    rows,
                    member_file.as_str(),
                ));
                row.set(name, Value::Path(member_file));
            }
            Member::Multisubtype(multi) => {
                let member_file = format!("{}-{}", filename, name);
                let groups = match value {
                    Value::Subtypes(groups) => groups,
                    _ => return Err(Error::type_mismatch(name, "records grouped by subtype")),
                };

                let mut index_rows = Vec::with_capacity(multi.class_lookup.len());
                for (tag, subtype) in &multi.class_lookup {
                    let items = groups
                        .iter()
                        .find(|(t, _)| t == tag)
                        .map_or(&[][..], |(_, items)| items.as_slice());
                    let subtype_file = format!("{}/{}", member_file, tag);

                    trace!("{}: entering {}/{} ({} items)", filename, name, tag, items.len());

                    let schema = subtype.get();
                    let rows = dump_items(schema, items, &subtype_file, cfg, &mut definitions)?;
                    definitions.push(DataDefinition::new(
                        StructDefinition::new(schema)?,
                        rows,
                        subtype_file.as_str(),
                    ));

                    index_rows.push(
                        Record::new()
                            .with(INDEX_SUBTYPE_FIELD, tag.as_str())
                            .with(
                                INDEX_FILENAME_FIELD,
                                format!("{}{}", subtype_file, cfg.csv_suffix()),
                            ),
                    );
                }

                definitions.push(DataDefinition::new(
                    StructDefinition::new(index_file_schema())?,
                    index_rows,
                    member_file.as_str(),
                ));
                row.set(name, Value::Path(member_file));
            }
            Member::Group(group) => {
                let nested = match value {
                    Value::Record(nested) => nested,
                    _ => return Err(Error::type_mismatch(name, "a nested record")),
                };
                let (nested_definitions, nested_row) =
                    dump(group.get(), nested, &format!("{}-{}", filename, name), cfg)?;
                definitions.extend(nested_definitions);
                row.set(name, Value::Record(nested_row));
            }
            _ => row.set(name, value.clone()),
        }
    }

    Ok((definitions, row))
}

fn dump_items(
    schema: &Schema,
    items: &[Record],
    collection_file: &str,
    cfg: &ExportConfig,
    definitions: &mut Vec<DataDefinition>,
) -> Result<Vec<Record>> {
    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let item_file = format!("{}/{:04}", collection_file, idx);
        let (nested, row) = dump(schema, item, &item_file, cfg)?;
        definitions.extend(nested);
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Dumps a top-level record, including the data definition of its own row
///
/// The root row is written to `filename`.
pub fn dump_root(
    schema: &Schema,
    record: &Record,
    filename: &str,
    cfg: &ExportConfig,
) -> Result<Vec<DataDefinition>> {
    let (mut definitions, row) = dump(schema, record, filename, cfg)?;
    definitions.push(DataDefinition::new(
        StructDefinition::new(schema)?,
        vec![row],
        filename,
    ));

    debug!(
        "{}: dumped {} data definitions",
        schema.name_struct(),
        definitions.len()
    );
    Ok(definitions)
}
