//! Row parser and recursion methods of generated structs.

use super::headers::{headers, Need};
use super::snippet::{ContentSnippet, HeaderSnippet};
use super::ExportConfig;
use std::collections::BTreeSet;

/// Generated method of a struct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberMethod {
    /// Fills the struct from one tokenized row
    Fill,
    /// Reads the files referenced by collection members
    Recurse,
}

impl MemberMethod {
    /// Every method, ordered by name
    pub const ALL: [MemberMethod; 2] = [MemberMethod::Fill, MemberMethod::Recurse];

    /// Method name
    pub fn name(self) -> &'static str {
        match self {
            MemberMethod::Fill => "fill",
            MemberMethod::Recurse => "recurse",
        }
    }

    /// Method signature
    ///
    /// `class_prefix` is `"name::"` for out of line definitions and empty
    /// inside the declaration. Stubs leave the argument unnamed.
    pub fn signature(self, class_prefix: &str, stub: bool, cfg: &ExportConfig) -> String {
        match (self, stub) {
            (MemberMethod::Fill, false) => format!("int {}fill(char *by_line)", class_prefix),
            (MemberMethod::Fill, true) => format!("int {}fill(char * /*by_line*/)", class_prefix),
            (MemberMethod::Recurse, false) => {
                format!("int {}recurse({}::Dir basedir)", class_prefix, cfg.runtime())
            }
            (MemberMethod::Recurse, true) => {
                format!("int {}recurse({}::Dir /*basedir*/)", class_prefix, cfg.runtime())
            }
        }
    }

    /// Headers the declaration needs
    pub fn declaration_headers(self) -> BTreeSet<HeaderSnippet> {
        match self {
            MemberMethod::Fill => BTreeSet::new(),
            MemberMethod::Recurse => headers(&[Need::Dir]),
        }
    }

    fn implementation_headers(self) -> BTreeSet<HeaderSnippet> {
        match self {
            MemberMethod::Fill => headers(&[Need::Tokenize, Need::Error]),
            MemberMethod::Recurse => BTreeSet::new(),
        }
    }

    /// Out of line definition of this method for `class_name`
    ///
    /// Without parsers the definition is a stub returning `-1`.
    pub fn snippet(
        self,
        class_name: &str,
        file_name: &str,
        parsers: &[&EntryParser],
        cfg: &ExportConfig,
    ) -> ContentSnippet {
        let stub = parsers.is_empty();
        let signature = self.signature(&format!("{}::", class_name), stub, cfg);
        let rt = cfg.runtime();

        let code: Vec<String> = parsers.iter().map(|p| p.code()).collect();
        let code = code.join("\n");

        let text = match (self, stub) {
            (_, true) => format!("{} {{\n\treturn -1;\n}}\n", signature),
            (MemberMethod::Fill, false) => {
                let count = format!("{}::member_count", class_name);
                format!(
                    "{sig} {{\n\
                     \tchar *buf[{count}];\n\
                     \tint count = {rt}::string_tokenize_to_buf(by_line, '{delim}', buf, {count});\n\
                     \n\
                     \tif (count != {count}) {{\n\
                     \t\tthrow {rt}::Error(\"tokenizing {name} led to %d columns (expecting %zu)!\", count, {count});\n\
                     \t}}\n\
                     \n\
                     {code}\n\
                     \n\
                     \treturn -1;\n\
                     }}\n",
                    sig = signature,
                    count = count,
                    rt = rt,
                    delim = char_literal(cfg.delimiter_char()),
                    name = class_name,
                    code = code,
                )
            }
            (MemberMethod::Recurse, false) => {
                format!("{} {{\n{}\n\n\treturn -1;\n}}\n", signature, code)
            }
        };

        let mut includes = self.implementation_headers();
        let mut references = BTreeSet::from([class_name.to_string()]);
        for parser in parsers {
            includes.extend(parser.headers.iter().cloned());
            references.extend(parser.typerefs.iter().cloned());
        }

        ContentSnippet::body(text, file_name, format!("{}_{}", class_name, self.name()))
            .label(signature)
            .references(references)
            .includes(includes)
    }
}

fn char_literal(c: char) -> String {
    match c {
        '\t' => "\\t".to_string(),
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        c => c.to_string(),
    }
}

/// Code that parses one member inside a generated method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryParser {
    /// Code lines, without indentation
    pub lines: Vec<String>,
    /// Headers the code needs
    pub headers: BTreeSet<HeaderSnippet>,
    /// Types the code references
    pub typerefs: BTreeSet<String>,
    /// Method the code belongs to
    pub destination: MemberMethod,
}

impl EntryParser {
    /// Creates a parser
    pub fn new(lines: Vec<String>, needs: &[Need], destination: MemberMethod) -> Self {
        Self {
            lines,
            headers: headers(needs),
            typerefs: BTreeSet::new(),
            destination,
        }
    }

    /// Adds referenced types
    pub fn with_typerefs(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.typerefs.extend(types);
        self
    }

    /// The code, indented by one tab
    pub fn code(&self) -> String {
        format!("\t{}", self.lines.join("\n\t"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stub_snippets() {
        let cfg = ExportConfig::default();

        let fill = MemberMethod::Fill.snippet("tree", "nature", &[], &cfg);
        assert_eq!(fill.text(), "int tree::fill(char * /*by_line*/) {\n\treturn -1;\n}\n");

        let recurse = MemberMethod::Recurse.snippet("tree", "nature", &[], &cfg);
        assert_eq!(
            recurse.text(),
            "int tree::recurse(openage::util::Dir /*basedir*/) {\n\treturn -1;\n}\n"
        );
        assert_eq!(recurse.order_key(), "tree_recurse");
        assert!(recurse.referenced_types().contains("tree"));
    }

    #[test]
    fn test_fill_snippet() {
        let cfg = ExportConfig::default();
        let parser = EntryParser::new(
            vec!["this->name = buf[1];".to_string()],
            &[Need::StdString],
            MemberMethod::Fill,
        );

        let snippet = MemberMethod::Fill.snippet("tree", "nature", &[&parser], &cfg);
        let text = snippet.text();

        assert!(text.starts_with("int tree::fill(char *by_line) {\n\tchar *buf[tree::member_count];\n"));
        assert!(text.contains("string_tokenize_to_buf(by_line, ',', buf, tree::member_count);"));
        assert!(text.contains("\tthis->name = buf[1];\n\n\treturn -1;\n}\n"));
        assert!(snippet
            .required_headers()
            .contains(&HeaderSnippet::local("../util/strings.h")));
        assert!(snippet.required_headers().contains(&HeaderSnippet::global("string")));
    }

    #[test]
    fn test_code_indents_every_line() {
        let parser = EntryParser::new(
            vec!["if (x) {".to_string(), "\treturn 0;".to_string(), "}".to_string()],
            &[],
            MemberMethod::Fill,
        );
        assert_eq!(parser.code(), "\tif (x) {\n\t\treturn 0;\n\t}");
    }
}
