//! Snippet-based code generation.
//!
//! ## Architecture
//!
//! Generators emit [`ContentSnippet`]s: text fragments that declare which
//! type names they define and which they reference. Snippets are bucketed
//! into one [`GeneratedFile`] per target file, which resolves dependencies
//! between them, orders them deterministically and wraps the result in a
//! format-specific prefix and suffix.
//!
//! All output knobs live in one immutable [`ExportConfig`] that is passed
//! explicitly to every generator.

mod file;
mod headers;
pub(crate) mod members;
mod parser;
mod snippet;

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub use file::{FileExports, GeneratedFile};
pub use headers::Need;
pub use parser::{EntryParser, MemberMethod};
pub use snippet::{ContentSnippet, HeaderSnippet, Section, SnippetGraph, StructSnippet};

/// Warning inserted into every generated source file
pub const DONT_EDIT: &str = "
//do not edit this file, it's autogenerated. all changes will be undone!
//make changes in the convert script and regenerate the files.";

/// Kind of generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportFormat {
    /// Delimited data rows
    Csv,
    /// Type declarations
    Struct,
    /// Type implementations
    StructImpl,
}

impl ExportFormat {
    /// Every format, in export order
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::Csv,
        ExportFormat::Struct,
        ExportFormat::StructImpl,
    ];

    /// Returns the format name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Struct => "struct",
            ExportFormat::StructImpl => "structimpl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExportFormat::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::UnknownFormat {
                format: s.to_string(),
            })
    }
}

/// Output preferences of one format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPreferences {
    /// Folder prepended to every output path
    pub folder: String,
    /// Suffix appended to every file name
    pub file_suffix: String,
    /// Template written before the body
    pub content_prefix: String,
    /// Template written after the body
    pub content_suffix: String,
}

impl FormatPreferences {
    /// Preferences with a suffix and no wrapping
    pub fn plain(file_suffix: impl Into<String>) -> Self {
        Self {
            folder: String::new(),
            file_suffix: file_suffix.into(),
            content_prefix: String::new(),
            content_suffix: String::new(),
        }
    }

    /// Output path of a logical file
    pub fn output_path(&self, file_name: &str) -> String {
        if self.folder.is_empty() {
            format!("{}{}", file_name, self.file_suffix)
        } else {
            format!(
                "{}/{}{}",
                self.folder.trim_end_matches('/'),
                file_name,
                self.file_suffix
            )
        }
    }
}

/// Configuration for an export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    namespace: String,
    runtime_namespace: String,
    guard_prefix: String,
    delimiter: char,
    csv: FormatPreferences,
    structs: FormatPreferences,
    struct_impl: FormatPreferences,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            namespace: "gamedata".to_string(),
            runtime_namespace: "openage::util".to_string(),
            guard_prefix: "OPENAGE".to_string(),
            delimiter: ',',
            csv: FormatPreferences::plain(".csv"),
            structs: FormatPreferences {
                folder: String::new(),
                file_suffix: ".gen.h".to_string(),
                content_prefix: format!(
                    "#ifndef ${{guard_prefix}}_${{header_guard}}_GEN_H_\n\
                     #define ${{guard_prefix}}_${{header_guard}}_GEN_H_\n\
                     \n\
                     ${{headers}}{}\n\
                     \n\
                     namespace ${{namespace}} {{\n\
                     \n",
                    DONT_EDIT
                ),
                content_suffix: "\n} //namespace ${namespace}\n\n#endif\n".to_string(),
            },
            struct_impl: FormatPreferences {
                folder: String::new(),
                file_suffix: ".gen.cpp".to_string(),
                content_prefix: format!(
                    "\n${{headers}}{}\n\nnamespace ${{namespace}} {{\n\n",
                    DONT_EDIT
                ),
                content_suffix: "} //namespace ${namespace}\n".to_string(),
            },
        }
    }
}

impl ExportConfig {
    /// Creates a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace of generated code
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the namespace of the runtime support library
    pub fn runtime_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.runtime_namespace = namespace.into();
        self
    }

    /// Sets the include guard prefix
    pub fn guard_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.guard_prefix = prefix.into();
        self
    }

    /// Sets the column delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Replaces the preferences of one format
    pub fn preferences(mut self, format: ExportFormat, prefs: FormatPreferences) -> Self {
        *self.prefs_mut(format) = prefs;
        self
    }

    /// Sets the output folder of one format
    pub fn folder(mut self, format: ExportFormat, folder: impl Into<String>) -> Self {
        self.prefs_mut(format).folder = folder.into();
        self
    }

    fn prefs_mut(&mut self, format: ExportFormat) -> &mut FormatPreferences {
        match format {
            ExportFormat::Csv => &mut self.csv,
            ExportFormat::Struct => &mut self.structs,
            ExportFormat::StructImpl => &mut self.struct_impl,
        }
    }

    /// Namespace of generated code
    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    /// Namespace of the runtime support library
    pub fn runtime(&self) -> &str {
        &self.runtime_namespace
    }

    /// Include guard prefix
    pub fn guard_prefix_name(&self) -> &str {
        &self.guard_prefix
    }

    /// Column delimiter
    pub fn delimiter_char(&self) -> char {
        self.delimiter
    }

    /// Preferences of one format
    pub fn format_preferences(&self, format: ExportFormat) -> &FormatPreferences {
        match format {
            ExportFormat::Csv => &self.csv,
            ExportFormat::Struct => &self.structs,
            ExportFormat::StructImpl => &self.struct_impl,
        }
    }

    /// Suffix of data files
    pub fn csv_suffix(&self) -> &str {
        &self.csv.file_suffix
    }

    /// Qualifies a type name with the generated namespace
    pub fn namespacify(&self, type_name: &str) -> String {
        format!("{}::{}", self.namespace, type_name)
    }
}

/// Replaces `${name}` and `$name` placeholders
///
/// Unknown placeholders are left untouched and `$$` produces a literal `$`.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let lookup = |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    let key = &braced[..end];
                    match lookup(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[pos..pos + end + 3]),
                    }
                    rest = &braced[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let key = &after[..len];
            match lookup(key) {
                Some(value) if !key.is_empty() => out.push_str(value),
                _ => {
                    out.push('$');
                    out.push_str(key);
                }
            }
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    out
}
