//! Content snippets and their dependency graph.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use tracing::trace;

/// Part of a generated file a snippet is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Include directives, outside the namespace
    Header,
    /// Declarations and definitions
    Body,
}

/// An includable header
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderSnippet {
    /// Header path as written in the include directive
    pub name: String,
    /// `<...>` if true, `"..."` otherwise
    pub is_global: bool,
}

impl HeaderSnippet {
    /// A system header
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_global: true,
        }
    }

    /// A header relative to the generated file
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_global: false,
        }
    }

    /// The include directive
    pub fn text(&self) -> String {
        if self.is_global {
            format!("#include <{}>\n", self.name)
        } else {
            format!("#include \"{}\"\n", self.name)
        }
    }

    /// Wraps the header into a snippet that fits any file
    pub fn to_snippet(&self) -> ContentSnippet {
        ContentSnippet {
            text: self.text(),
            file_name: None,
            section: Section::Header,
            defines: BTreeSet::new(),
            references: BTreeSet::new(),
            includes: BTreeSet::new(),
            order_key: self.name.clone(),
            label: None,
            header: Some(self.clone()),
        }
    }
}

/// A unit of generated text with declared type dependencies
///
/// Two snippets are equal if they have the same target file, text, section,
/// defined and referenced types. Header snippets are equal if they include
/// the same header.
#[derive(Debug, Clone)]
pub struct ContentSnippet {
    text: String,
    file_name: Option<String>,
    section: Section,
    defines: BTreeSet<String>,
    references: BTreeSet<String>,
    includes: BTreeSet<HeaderSnippet>,
    order_key: String,
    label: Option<String>,
    header: Option<HeaderSnippet>,
}

impl ContentSnippet {
    /// Creates a snippet for `file_name`
    pub fn new(
        text: impl Into<String>,
        file_name: impl Into<String>,
        section: Section,
        order_key: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            file_name: Some(file_name.into()),
            section,
            defines: BTreeSet::new(),
            references: BTreeSet::new(),
            includes: BTreeSet::new(),
            order_key: order_key.into(),
            label: None,
            header: None,
        }
    }

    /// Creates a body snippet for `file_name`
    pub fn body(
        text: impl Into<String>,
        file_name: impl Into<String>,
        order_key: impl Into<String>,
    ) -> Self {
        Self::new(text, file_name, Section::Body, order_key)
    }

    /// Sets a short description used in logs and errors
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Declares defined types
    pub fn defines<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.defines.extend(types.into_iter().map(Into::into));
        self
    }

    /// Declares referenced types
    pub fn references<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.references.extend(types.into_iter().map(Into::into));
        self
    }

    /// Declares required headers
    pub fn includes(mut self, headers: impl IntoIterator<Item = HeaderSnippet>) -> Self {
        self.includes.extend(headers);
        self
    }

    /// Snippet text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Target file, `None` for snippets that fit any file
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Section the snippet is placed in
    pub fn section(&self) -> Section {
        self.section
    }

    /// Types defined by this snippet
    pub fn defined_types(&self) -> &BTreeSet<String> {
        &self.defines
    }

    /// Types referenced by this snippet
    pub fn referenced_types(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Headers this snippet requires
    pub fn required_headers(&self) -> &BTreeSet<HeaderSnippet> {
        &self.includes
    }

    /// Key used to order sibling snippets
    pub fn order_key(&self) -> &str {
        &self.order_key
    }

    /// The header this snippet includes, for header snippets
    pub fn header(&self) -> Option<&HeaderSnippet> {
        self.header.as_ref()
    }

    /// Short human readable description
    pub fn describe(&self) -> String {
        if let Some(header) = &self.header {
            return format!("header {}", header.name);
        }
        match &self.label {
            Some(label) => label.clone(),
            None => {
                let head: String = self.text.chars().take(25).collect();
                format!("{:?}...", head)
            }
        }
    }
}

impl PartialEq for ContentSnippet {
    fn eq(&self, other: &Self) -> bool {
        match (&self.header, &other.header) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.file_name == other.file_name
                    && self.text == other.text
                    && self.section == other.section
                    && self.defines == other.defines
                    && self.references == other.references
            }
            _ => false,
        }
    }
}

impl Eq for ContentSnippet {}

impl Hash for ContentSnippet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.header {
            Some(header) => header.hash(state),
            None => {
                self.file_name.hash(state);
                self.text.hash(state);
                self.section.hash(state);
                self.defines.hash(state);
                self.references.hash(state);
            }
        }
    }
}

/// Builder for struct declaration snippets
#[derive(Debug, Clone)]
pub struct StructSnippet {
    file_name: String,
    struct_name: String,
    comment: Option<String>,
    parents: Vec<String>,
    members: Vec<String>,
    references: BTreeSet<String>,
    includes: BTreeSet<HeaderSnippet>,
}

impl StructSnippet {
    /// Starts a struct declaration
    pub fn new(file_name: impl Into<String>, struct_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            struct_name: struct_name.into(),
            comment: None,
            parents: Vec::new(),
            members: Vec::new(),
            references: BTreeSet::new(),
            includes: BTreeSet::new(),
        }
    }

    /// Sets the doc comment written above the struct
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.is_empty()).then_some(comment);
        self
    }

    /// Sets the parent structs
    pub fn parents(mut self, parents: Vec<String>) -> Self {
        self.references.extend(parents.iter().cloned());
        self.parents = parents;
        self
    }

    /// Appends one member line
    pub fn add_member(&mut self, line: impl Into<String>) {
        self.members.push(line.into());
    }

    /// Appends member lines
    pub fn add_members(&mut self, lines: impl IntoIterator<Item = String>) {
        self.members.extend(lines);
    }

    /// Adds referenced types
    pub fn add_references(&mut self, types: impl IntoIterator<Item = String>) {
        self.references.extend(types);
    }

    /// Adds required headers
    pub fn add_includes(&mut self, headers: impl IntoIterator<Item = HeaderSnippet>) {
        self.includes.extend(headers);
    }

    /// Renders the declaration
    pub fn build(self) -> ContentSnippet {
        let comment = match &self.comment {
            Some(c) => format!("/**\n * {}\n */\n", c.split('\n').collect::<Vec<_>>().join("\n * ")),
            None => String::new(),
        };
        let inheritance = if self.parents.is_empty() {
            String::new()
        } else {
            format!(" : {}", self.parents.join(", "))
        };
        let members: String = self.members.iter().map(|m| format!("\t{}\n", m)).collect();

        let text = format!(
            "{}struct {}{} {{\n{}}};\n",
            comment, self.struct_name, inheritance, members
        );

        ContentSnippet::body(text, self.file_name, self.struct_name.clone())
            .label(format!("struct {}", self.struct_name))
            .defines([self.struct_name])
            .references(self.references)
            .includes(self.includes)
    }
}

/// Dependency graph over the snippets of one file
///
/// Edges point from a snippet to the snippets defining the types it
/// references.
#[derive(Debug)]
pub struct SnippetGraph<'a> {
    snippets: &'a [ContentSnippet],
    required: Vec<BTreeSet<usize>>,
}

impl<'a> SnippetGraph<'a> {
    /// Creates a graph without edges
    pub fn new(snippets: &'a [ContentSnippet]) -> Self {
        Self {
            snippets,
            required: vec![BTreeSet::new(); snippets.len()],
        }
    }

    /// Links snippet `idx` to every other snippet defining a type it
    /// references
    ///
    /// Returns the referenced types nothing defines.
    pub fn add_required_snippets(&mut self, idx: usize) -> BTreeSet<String> {
        let snippet = &self.snippets[idx];
        let mut resolved: BTreeSet<String> = snippet
            .references
            .intersection(&snippet.defines)
            .cloned()
            .collect();

        for (candidate_idx, candidate) in self.snippets.iter().enumerate() {
            if candidate_idx == idx {
                continue;
            }

            let hits: Vec<&String> = snippet
                .references
                .intersection(&candidate.defines)
                .collect();
            if hits.is_empty() {
                continue;
            }

            self.required[idx].insert(candidate_idx);
            resolved.extend(hits.into_iter().cloned());
        }

        trace!(
            "snippet {} requires {:?}",
            snippet.describe(),
            self.required[idx]
                .iter()
                .map(|&i| self.snippets[i].describe())
                .collect::<Vec<_>>()
        );

        snippet.references.difference(&resolved).cloned().collect()
    }

    /// All snippets `idx` depends on, transitively and depth first, followed
    /// by `idx` itself
    ///
    /// Siblings are visited in order-key order. A dependency cycle is an
    /// error.
    pub fn get_required_snippets(&self, idx: usize) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.visit(idx, &mut stack, &mut out)?;
        Ok(out)
    }

    fn visit(&self, idx: usize, stack: &mut Vec<usize>, out: &mut Vec<usize>) -> Result<()> {
        if let Some(pos) = stack.iter().position(|&s| s == idx) {
            let chain: Vec<String> = stack[pos..]
                .iter()
                .chain(std::iter::once(&idx))
                .map(|&s| self.snippets[s].describe())
                .collect();
            return Err(Error::DependencyCycle {
                chain: chain.join(" -> "),
            });
        }

        let mut children: Vec<usize> = self.required[idx].iter().copied().collect();
        children.sort_by(|&a, &b| {
            let (sa, sb) = (&self.snippets[a], &self.snippets[b]);
            (sa.order_key.as_str(), sa.text.as_str(), a).cmp(&(sb.order_key.as_str(), sb.text.as_str(), b))
        });

        stack.push(idx);
        for child in children {
            self.visit(child, stack, out)?;
        }
        stack.pop();

        out.push(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snippet(key: &str, defines: &[&str], references: &[&str]) -> ContentSnippet {
        ContentSnippet::body(format!("// {}\n", key), "test", key)
            .label(key)
            .defines(defines.iter().copied())
            .references(references.iter().copied())
    }

    #[test]
    fn test_equality_ignores_order_key() {
        let a = ContentSnippet::body("x", "f", "a").defines(["T"]);
        let b = ContentSnippet::body("x", "f", "b").defines(["T"]);
        let c = ContentSnippet::body("y", "f", "a").defines(["T"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_header_equality() {
        let a = HeaderSnippet::local("unit.gen.h").to_snippet().defines(["unit"]);
        let b = HeaderSnippet::local("unit.gen.h").to_snippet();
        assert_eq!(a, b);
        assert_ne!(a, HeaderSnippet::global("unit.gen.h").to_snippet());
    }

    #[test]
    fn test_required_and_missing() {
        let snippets = vec![
            snippet("user", &["user"], &["a", "b", "missing"]),
            snippet("a", &["a"], &[]),
            snippet("b", &["b"], &[]),
        ];
        let mut graph = SnippetGraph::new(&snippets);

        let missing = graph.add_required_snippets(0);
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["missing"]);
        assert_eq!(graph.get_required_snippets(0).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let snippets = vec![snippet("node", &["node"], &["node"])];
        let mut graph = SnippetGraph::new(&snippets);

        assert!(graph.add_required_snippets(0).is_empty());
        assert_eq!(graph.get_required_snippets(0).unwrap(), vec![0]);
    }

    #[test]
    fn test_children_sorted_by_order_key() {
        let snippets = vec![
            snippet("zeta", &["zeta"], &[]),
            snippet("user", &["user"], &["zeta", "alpha"]),
            snippet("alpha", &["alpha"], &[]),
        ];
        let mut graph = SnippetGraph::new(&snippets);
        graph.add_required_snippets(1);

        assert_eq!(graph.get_required_snippets(1).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_cycle_detected() {
        let snippets = vec![
            snippet("a", &["a"], &["b"]),
            snippet("b", &["b"], &["a"]),
        ];
        let mut graph = SnippetGraph::new(&snippets);
        graph.add_required_snippets(0);
        graph.add_required_snippets(1);

        let err = graph.get_required_snippets(0).unwrap_err();
        match err {
            Error::DependencyCycle { chain } => assert_eq!(chain, "a -> b -> a"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_struct_snippet_rendering() {
        let mut builder = StructSnippet::new("units", "archer")
            .comment("ranged unit\nwith a bow")
            .parents(vec!["unit".to_string()]);
        builder.add_member("int16_t range;");
        let snippet = builder.build();

        assert_eq!(
            snippet.text(),
            "/**\n * ranged unit\n * with a bow\n */\nstruct archer : unit {\n\tint16_t range;\n};\n"
        );
        assert!(snippet.defined_types().contains("archer"));
        assert!(snippet.referenced_types().contains("unit"));
    }
}
