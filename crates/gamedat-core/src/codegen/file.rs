//! One generated output file.

use super::snippet::{ContentSnippet, HeaderSnippet, Section, SnippetGraph};
use super::{substitute, ExportConfig, ExportFormat};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Types a generated file defines, used to resolve references across files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExports {
    /// Logical file name
    pub file_name: String,
    /// Format of the file
    pub format: ExportFormat,
    /// Types defined by the file's own snippets
    pub typedefs: BTreeSet<String>,
}

impl FileExports {
    /// Header snippet including this file, declaring its types
    pub fn include_snippet(&self, cfg: &ExportConfig) -> ContentSnippet {
        let suffix = &cfg.format_preferences(self.format).file_suffix;
        HeaderSnippet::local(format!("{}{}", self.file_name, suffix))
            .to_snippet()
            .defines(self.typedefs.iter().cloned())
    }
}

/// Collects the snippets of one output file and renders it
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    file_name: String,
    format: ExportFormat,
    snippets: Vec<ContentSnippet>,
    typedefs: BTreeSet<String>,
    typerefs: BTreeSet<String>,
    included_typedefs: BTreeSet<String>,
    defined_by: BTreeMap<String, usize>,
}

impl GeneratedFile {
    /// Creates an empty file
    pub fn new(file_name: impl Into<String>, format: ExportFormat) -> Self {
        Self {
            file_name: file_name.into(),
            format,
            snippets: Vec::new(),
            typedefs: BTreeSet::new(),
            typerefs: BTreeSet::new(),
            included_typedefs: BTreeSet::new(),
            defined_by: BTreeMap::new(),
        }
    }

    /// Logical file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Output format
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Snippets added so far
    pub fn snippets(&self) -> &[ContentSnippet] {
        &self.snippets
    }

    /// Types defined by this file's own snippets
    pub fn typedefs(&self) -> &BTreeSet<String> {
        &self.typedefs
    }

    /// Types referenced by this file's own snippets
    pub fn typerefs(&self) -> &BTreeSet<String> {
        &self.typerefs
    }

    /// Adds a snippet and, recursively, the headers it requires
    ///
    /// With `inherit_typedefs` the snippet's types count as defined and
    /// referenced by this file. Otherwise its definitions are only known to
    /// be available through an include. A snippet equal to one already
    /// present is skipped. Defining a type another snippet of this file
    /// already defines is a [`Error::TypeConflict`].
    pub fn add_snippet(&mut self, snippet: ContentSnippet, inherit_typedefs: bool) -> Result<()> {
        if let Some(target) = snippet.file_name() {
            if target != self.file_name {
                return Err(Error::SnippetFileMismatch {
                    expected: self.file_name.clone(),
                    found: target.to_string(),
                });
            }
        }

        if let Some(present) = self.snippets.iter().position(|s| *s == snippet) {
            trace!("{}: skipping present snippet {}", self.file_name, snippet.describe());
            if !inherit_typedefs && self.snippets[present].header().is_some() {
                self.included_typedefs
                    .extend(snippet.defined_types().iter().cloned());
            }
            return Ok(());
        }

        let idx = self.snippets.len();
        if inherit_typedefs {
            for name in snippet.defined_types() {
                if self.defined_by.insert(name.clone(), idx).is_some() {
                    return Err(Error::type_conflict(name.as_str()));
                }
            }
            self.typedefs.extend(snippet.defined_types().iter().cloned());
            self.typerefs
                .extend(snippet.referenced_types().iter().cloned());
        } else {
            self.included_typedefs
                .extend(snippet.defined_types().iter().cloned());
        }

        trace!(
            "{}: adding snippet {} defining {:?} referencing {:?}",
            self.file_name,
            snippet.describe(),
            snippet.defined_types(),
            snippet.referenced_types()
        );

        let includes: Vec<HeaderSnippet> = snippet.required_headers().iter().cloned().collect();
        self.snippets.push(snippet);

        for header in includes {
            self.add_snippet(header.to_snippet(), false)?;
        }

        Ok(())
    }

    /// The types this file exports to other files
    pub fn exports(&self) -> FileExports {
        FileExports {
            file_name: self.file_name.clone(),
            format: self.format,
            typedefs: self.typedefs.clone(),
        }
    }

    /// Includes the files of `pool` that define types this file references
    /// but does not define
    ///
    /// Fails with [`Error::StillMissingTypes`] if some reference is resolved
    /// neither locally, nor by an included header, nor by the pool.
    pub fn create_xref_headers(&mut self, pool: &[FileExports], cfg: &ExportConfig) -> Result<()> {
        let wanted: BTreeSet<String> = self.typerefs.difference(&self.typedefs).cloned().collect();
        let mut new_resolves = BTreeSet::new();

        for candidate in pool {
            if candidate.file_name == self.file_name && candidate.format == self.format {
                continue;
            }

            let resolves: BTreeSet<String> =
                candidate.typedefs.intersection(&wanted).cloned().collect();
            if resolves.is_empty() {
                continue;
            }

            debug!(
                "{}: including {} for {:?}",
                self.file_name, candidate.file_name, resolves
            );
            self.add_snippet(candidate.include_snippet(cfg), false)?;
            new_resolves.extend(resolves);
        }

        let still_missing: Vec<&String> = wanted
            .iter()
            .filter(|t| !self.included_typedefs.contains(*t) && !new_resolves.contains(*t))
            .collect();

        if !still_missing.is_empty() {
            return Err(Error::still_missing_types(
                self.file_name.as_str(),
                still_missing,
            ));
        }

        Ok(())
    }

    /// Renders the file
    ///
    /// Returns the output path and the content. Header snippets are written
    /// system headers first, each group sorted by name. Body snippets are
    /// written so that every snippet comes after the snippets defining the
    /// types it references.
    pub fn generate(&self, cfg: &ExportConfig) -> Result<(String, String)> {
        let prefs = cfg.format_preferences(self.format);

        let mut body: Vec<usize> = (0..self.snippets.len())
            .filter(|&i| self.snippets[i].section() == Section::Body)
            .collect();
        if body.is_empty() {
            return Err(Error::EmptyBody {
                file: self.file_name.clone(),
            });
        }
        body.sort_by(|&a, &b| {
            let (sa, sb) = (&self.snippets[a], &self.snippets[b]);
            (sa.order_key(), sa.text()).cmp(&(sb.order_key(), sb.text()))
        });

        let mut graph = SnippetGraph::new(&self.snippets);
        let mut missing = BTreeSet::new();
        for &idx in &body {
            missing.extend(graph.add_required_snippets(idx));
        }
        if !missing.is_empty() {
            return Err(Error::missing_types(self.file_name.as_str(), &missing));
        }

        let priority = |idx: usize| -> isize {
            let s = &self.snippets[idx];
            s.referenced_types().len() as isize - s.defined_types().len() as isize
        };
        body.sort_by_key(|&idx| priority(idx));

        let mut headers: Vec<&HeaderSnippet> = self
            .snippets
            .iter()
            .filter(|s| s.section() == Section::Header)
            .filter_map(ContentSnippet::header)
            .collect();

        let mut ordered: Vec<usize> = Vec::new();
        let mut placed = BTreeSet::new();
        for &idx in &body {
            for required in graph.get_required_snippets(idx)? {
                let snippet = &self.snippets[required];
                match snippet.section() {
                    Section::Header => {
                        if let Some(header) = snippet.header() {
                            if !headers.contains(&header) {
                                headers.push(header);
                            }
                        }
                    }
                    Section::Body => {
                        if placed.insert(required) {
                            ordered.push(required);
                        }
                    }
                }
            }
        }

        headers.sort_by(|a, b| (!a.is_global, &a.name).cmp(&(!b.is_global, &b.name)));
        headers.dedup();

        let header_text: String = headers.iter().map(|h| h.text()).collect();
        let body_text: Vec<&str> = ordered.iter().map(|&i| self.snippets[i].text()).collect();
        let body_text = body_text.join("\n");

        let namespace = cfg.namespace_name();
        let header_guard = format!(
            "{}_{}",
            namespace.to_uppercase(),
            self.file_name.replace('/', "_").to_uppercase()
        );
        let vars = [
            ("header_guard", header_guard.as_str()),
            ("namespace", namespace),
            ("headers", header_text.as_str()),
            ("guard_prefix", cfg.guard_prefix_name()),
        ];

        let content = format!(
            "{}{}{}",
            substitute(&prefs.content_prefix, &vars),
            body_text,
            substitute(&prefs.content_suffix, &vars),
        );

        debug!(
            "{}: generated {} body snippets, {} headers",
            self.file_name,
            ordered.len(),
            headers.len()
        );

        Ok((prefs.output_path(&self.file_name), content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(file: &str, key: &str, defines: &[&str], references: &[&str]) -> ContentSnippet {
        ContentSnippet::body(format!("// {}\n", key), file, key)
            .label(key)
            .defines(defines.iter().copied())
            .references(references.iter().copied())
    }

    #[test]
    fn test_wrong_file_rejected() {
        let mut file = GeneratedFile::new("units", ExportFormat::Struct);
        let err = file.add_snippet(body("other", "a", &[], &[]), true).unwrap_err();
        assert!(matches!(err, Error::SnippetFileMismatch { .. }));
    }

    #[test]
    fn test_duplicate_snippet_skipped() {
        let mut file = GeneratedFile::new("units", ExportFormat::Struct);
        file.add_snippet(body("units", "a", &["a"], &[]), true).unwrap();
        file.add_snippet(body("units", "a", &["a"], &[]), true).unwrap();
        assert_eq!(file.snippets().len(), 1);
    }

    #[test]
    fn test_conflicting_definition() {
        let mut file = GeneratedFile::new("units", ExportFormat::Struct);
        file.add_snippet(body("units", "a", &["a"], &[]), true).unwrap();
        let other = ContentSnippet::body("struct a {};\n", "units", "a").defines(["a"]);
        assert!(matches!(
            file.add_snippet(other, true),
            Err(Error::TypeConflict { .. })
        ));
    }

    #[test]
    fn test_empty_body() {
        let file = GeneratedFile::new("units", ExportFormat::Struct);
        assert!(matches!(
            file.generate(&ExportConfig::default()),
            Err(Error::EmptyBody { .. })
        ));
    }

    #[test]
    fn test_missing_types() {
        let mut file = GeneratedFile::new("units", ExportFormat::Csv);
        file.add_snippet(body("units", "a", &["a"], &["ghost"]), true).unwrap();
        match file.generate(&ExportConfig::default()).unwrap_err() {
            Error::MissingTypes { types, .. } => assert_eq!(types, vec!["ghost"]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_dependencies_written_first() {
        let mut file = GeneratedFile::new("units", ExportFormat::Csv);
        file.add_snippet(body("units", "archer", &["archer"], &["unit", "bow"]), true)
            .unwrap();
        file.add_snippet(body("units", "unit", &["unit"], &[]), true).unwrap();
        file.add_snippet(body("units", "bow", &["bow"], &["unit"]), true).unwrap();

        let (path, content) = file.generate(&ExportConfig::default()).unwrap();
        assert_eq!(path, "units.csv");
        assert_eq!(content, "// unit\n\n// bow\n\n// archer\n");
    }

    #[test]
    fn test_generation_is_deterministic() {
        let build = |order: &[usize]| {
            let snippets = [
                body("units", "c", &["c"], &["a"]),
                body("units", "a", &["a"], &[]),
                body("units", "b", &["b"], &[]),
            ];
            let mut file = GeneratedFile::new("units", ExportFormat::Csv);
            for &i in order {
                file.add_snippet(snippets[i].clone(), true).unwrap();
            }
            file.generate(&ExportConfig::default()).unwrap()
        };
        assert_eq!(build(&[0, 1, 2]), build(&[2, 1, 0]));
    }

    #[test]
    fn test_headers_and_guard() {
        let mut file = GeneratedFile::new("unit/archer", ExportFormat::Struct);
        let snippet = body("unit/archer", "archer", &["archer"], &[]).includes([
            HeaderSnippet::local("../util/file.h"),
            HeaderSnippet::global("stdint.h"),
            HeaderSnippet::global("cstring"),
        ]);
        file.add_snippet(snippet, true).unwrap();

        let (path, content) = file.generate(&ExportConfig::default()).unwrap();
        assert_eq!(path, "unit/archer.gen.h");
        assert!(content.starts_with(
            "#ifndef OPENAGE_GAMEDATA_UNIT_ARCHER_GEN_H_\n#define OPENAGE_GAMEDATA_UNIT_ARCHER_GEN_H_\n\n\
             #include <cstring>\n#include <stdint.h>\n#include \"../util/file.h\"\n"
        ));
        assert!(content.contains("namespace gamedata {\n\n// archer\n"));
        assert!(content.ends_with("\n} //namespace gamedata\n\n#endif\n"));
    }

    #[test]
    fn test_xref_headers() {
        let cfg = ExportConfig::default();

        let mut units = GeneratedFile::new("units", ExportFormat::Struct);
        units.add_snippet(body("units", "unit", &["unit"], &[]), true).unwrap();

        let mut archers = GeneratedFile::new("archers", ExportFormat::Struct);
        archers
            .add_snippet(body("archers", "archer", &["archer"], &["unit"]), true)
            .unwrap();

        let pool = vec![units.exports(), archers.exports()];
        archers.create_xref_headers(&pool, &cfg).unwrap();

        let (_, content) = archers.generate(&cfg).unwrap();
        assert!(content.contains("#include \"units.gen.h\"\n"));
    }

    #[test]
    fn test_xref_still_missing() {
        let cfg = ExportConfig::default();
        let mut archers = GeneratedFile::new("archers", ExportFormat::Struct);
        archers
            .add_snippet(body("archers", "archer", &["archer"], &["unit"]), true)
            .unwrap();

        let pool = vec![archers.exports()];
        assert!(matches!(
            archers.create_xref_headers(&pool, &cfg),
            Err(Error::StillMissingTypes { .. })
        ));
    }
}
