//! Export orchestration.
//!
//! [`DataFormatter`] collects struct and data definitions, keeps the registry
//! of shared types (enums and heterogeneous collection containers), and turns
//! everything into a map from output path to file content.

use crate::codegen::{ContentSnippet, ExportConfig, ExportFormat, FileExports, GeneratedFile};
use crate::definition::{DataDefinition, StructDefinition};
use crate::error::{Error, Result};
use crate::schema::Member;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A registered definition
#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
    /// Struct without rows, exportable as code only
    Struct(StructDefinition),
    /// Struct with rows
    Data(DataDefinition),
}

impl DataSet {
    /// The struct definition
    pub fn definition(&self) -> &StructDefinition {
        match self {
            DataSet::Struct(def) => def,
            DataSet::Data(data) => data.definition(),
        }
    }

    fn definition_mut(&mut self) -> &mut StructDefinition {
        match self {
            DataSet::Struct(def) => def,
            DataSet::Data(data) => data.definition_mut(),
        }
    }

    fn snippets(&self, format: ExportFormat, cfg: &ExportConfig) -> Result<Vec<ContentSnippet>> {
        match (format, self) {
            (ExportFormat::Csv, DataSet::Data(data)) => data.generate_csv(cfg),
            (ExportFormat::Csv, DataSet::Struct(def)) => Err(Error::UnsupportedFormat {
                name: def.name_struct().to_string(),
                format: format.to_string(),
            }),
            (ExportFormat::Struct, _) => Ok(self.definition().generate_struct(cfg)),
            (ExportFormat::StructImpl, _) => self.definition().generate_struct_implementation(cfg),
        }
    }
}

impl From<StructDefinition> for DataSet {
    fn from(def: StructDefinition) -> Self {
        DataSet::Struct(def)
    }
}

impl From<DataDefinition> for DataSet {
    fn from(data: DataDefinition) -> Self {
        DataSet::Data(data)
    }
}

/// Collects definitions and exports them
#[derive(Debug, Clone)]
pub struct DataFormatter {
    cfg: ExportConfig,
    data: Vec<DataSet>,
    registry: BTreeMap<String, Member>,
}

impl DataFormatter {
    /// Creates an empty formatter
    pub fn new(cfg: ExportConfig) -> Self {
        Self {
            cfg,
            data: Vec::new(),
            registry: BTreeMap::new(),
        }
    }

    /// The export configuration
    pub fn config(&self) -> &ExportConfig {
        &self.cfg
    }

    /// Registered shared types by name
    pub fn registry(&self) -> &BTreeMap<String, Member> {
        &self.registry
    }

    /// Number of registered data sets
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Registers data sets and the shared types their members define
    ///
    /// A shared type without a home file is placed in the file of the first
    /// struct using it. Registering a type twice with a different definition
    /// is a [`Error::TypeConflict`].
    pub fn add_data<D: Into<DataSet>>(&mut self, sets: impl IntoIterator<Item = D>) -> Result<()> {
        for set in sets {
            let set = set.into();
            let def = set.definition();

            for (_, member) in def.members() {
                let Some(type_name) = member.defined_type() else {
                    continue;
                };

                let mut member = member.clone();
                member.default_definition_file(def.name_struct_file());

                match self.registry.get(type_name) {
                    Some(existing) if *existing != member => {
                        return Err(Error::type_conflict(type_name));
                    }
                    Some(_) => {}
                    None => {
                        debug!("registering type {} from {}", type_name, def.name_struct());
                        self.registry.insert(type_name.to_string(), member);
                    }
                }
            }

            self.data.push(set);
        }
        Ok(())
    }

    /// Registers data definitions whose data files get `prefix` prepended
    pub fn add_data_with_prefix(
        &mut self,
        sets: impl IntoIterator<Item = DataDefinition>,
        prefix: &str,
    ) -> Result<()> {
        self.add_data(sets.into_iter().map(|data| data.with_prefix(prefix)))
    }

    /// Generates every registered data set in every requested format
    ///
    /// Returns output path to file content. Declaration and implementation
    /// files include the declaration files of the types they use, so an
    /// implementation export should request the declaration format too.
    pub fn export(&mut self, formats: &[ExportFormat]) -> Result<BTreeMap<String, String>> {
        for set in &mut self.data {
            set.definition_mut().dynamic_ref_update(&self.registry)?;
        }

        let mut files: Vec<GeneratedFile> = Vec::new();
        for &format in formats {
            files.extend(self.bucket(format)?);
        }

        let pool: Vec<FileExports> = files.iter().map(GeneratedFile::exports).collect();
        for file in &mut files {
            if file.format() != ExportFormat::Csv {
                file.create_xref_headers(&pool, &self.cfg)?;
            }
        }

        let mut output = BTreeMap::new();
        for file in &files {
            let (path, content) = file.generate(&self.cfg)?;
            if output.insert(path.clone(), content).is_some() {
                return Err(Error::internal(format!("output path {} generated twice", path)));
            }
        }

        info!("exported {} files", output.len());
        Ok(output)
    }

    fn bucket(&self, format: ExportFormat) -> Result<Vec<GeneratedFile>> {
        let mut snippets = Vec::new();
        for set in &self.data {
            snippets.extend(set.snippets(format, &self.cfg)?);
        }
        for member in self.registry.values() {
            snippets.extend(member.type_snippets(format, &self.cfg)?);
        }

        let mut files: Vec<GeneratedFile> = Vec::new();
        let mut lookup: BTreeMap<String, usize> = BTreeMap::new();
        let mut defined_in: BTreeMap<String, String> = BTreeMap::new();

        for snippet in snippets {
            let file_name = snippet
                .file_name()
                .ok_or_else(|| Error::internal(format!("{} has no target file", snippet.describe())))?
                .to_string();

            for type_name in snippet.defined_types() {
                match defined_in.get(type_name) {
                    Some(home) if *home != file_name => return Err(Error::type_conflict(type_name.as_str())),
                    Some(_) => {}
                    None => {
                        defined_in.insert(type_name.clone(), file_name.clone());
                    }
                }
            }

            let idx = *lookup.entry(file_name.clone()).or_insert_with(|| {
                files.push(GeneratedFile::new(file_name.as_str(), format));
                files.len() - 1
            });
            files[idx].add_snippet(snippet, true)?;
        }

        debug!("{}: {} files", format, files.len());
        Ok(files)
    }
}
