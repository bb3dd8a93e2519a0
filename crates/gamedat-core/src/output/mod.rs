//! Destinations for exported files.
//!
//! [`DataFormatter::export`](crate::DataFormatter::export) returns a map from
//! relative output path to content. An [`ArtifactWriter`] decides what
//! happens to each entry.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Receives exported files one by one
///
/// # Example
///
/// ```
/// use gamedat_core::output::ArtifactWriter;
/// use gamedat_core::Result;
///
/// struct Listing(Vec<String>);
///
/// impl ArtifactWriter for Listing {
///     fn write_artifact(&mut self, path: &str, _content: &str) -> Result<()> {
///         self.0.push(path.to_string());
///         Ok(())
///     }
/// }
/// ```
pub trait ArtifactWriter {
    /// Handles one file
    fn write_artifact(&mut self, path: &str, content: &str) -> Result<()>;

    /// Handles every file of an export, in path order
    fn write_all(&mut self, artifacts: &BTreeMap<String, String>) -> Result<()> {
        for (path, content) in artifacts {
            self.write_artifact(path, content)?;
        }
        Ok(())
    }
}

/// A writer that discards everything
#[derive(Debug, Default)]
pub struct NullWriter;

impl ArtifactWriter for NullWriter {
    fn write_artifact(&mut self, _path: &str, _content: &str) -> Result<()> {
        Ok(())
    }
}

/// A writer that only counts what it receives
#[derive(Debug, Default)]
pub struct StatsWriter {
    /// Number of files
    pub files: usize,
    /// Total content size in bytes
    pub bytes: usize,
}

impl ArtifactWriter for StatsWriter {
    fn write_artifact(&mut self, _path: &str, content: &str) -> Result<()> {
        self.files += 1;
        self.bytes += content.len();
        Ok(())
    }
}

/// Writes files below a root directory
///
/// Paths must be relative and must not leave the root. Files whose content
/// on disk already matches are left alone so their timestamps survive
/// repeated exports.
#[derive(Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
    written: usize,
    unchanged: usize,
}

impl DirectoryWriter {
    /// Creates a writer for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
            unchanged: 0,
        }
    }

    /// The output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files written
    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of files skipped because their content did not change
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    /// Resolves `path` below the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes || path.is_empty() {
            return Err(Error::path_traversal(relative));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactWriter for DirectoryWriter {
    fn write_artifact(&mut self, path: &str, content: &str) -> Result<()> {
        let target = self.resolve(path)?;

        if let Ok(existing) = fs::read(&target) {
            if existing == content.as_bytes() {
                trace!("unchanged: {}", target.display());
                self.unchanged += 1;
                return Ok(());
            }
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| Error::file_write(&target, e))?;

        debug!("wrote {} ({} bytes)", target.display(), content.len());
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifacts() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("zoo.csv".to_string(), "#struct zoo\n".to_string()),
            ("zoo-animals/bird.csv".to_string(), "#struct bird\n".to_string()),
        ])
    }

    #[test]
    fn test_null_writer() {
        let mut writer = NullWriter;
        assert!(writer.write_all(&artifacts()).is_ok());
    }

    #[test]
    fn test_stats_writer() {
        let mut writer = StatsWriter::default();
        writer.write_all(&artifacts()).unwrap();

        assert_eq!(writer.files, 2);
        assert_eq!(writer.bytes, 25);
    }

    #[test]
    fn test_directory_writer_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DirectoryWriter::new(temp_dir.path());
        writer.write_all(&artifacts()).unwrap();

        let bird = fs::read_to_string(temp_dir.path().join("zoo-animals/bird.csv")).unwrap();
        assert_eq!(bird, "#struct bird\n");
        assert_eq!(writer.written(), 2);
    }

    #[test]
    fn test_directory_writer_skips_unchanged() {
        let temp_dir = TempDir::new().unwrap();

        let mut first = DirectoryWriter::new(temp_dir.path());
        first.write_all(&artifacts()).unwrap();

        let mut changed = artifacts();
        changed.insert("zoo.csv".to_string(), "#struct zoo\n#changed\n".to_string());

        let mut second = DirectoryWriter::new(temp_dir.path());
        second.write_all(&changed).unwrap();
        assert_eq!(second.written(), 1);
        assert_eq!(second.unchanged(), 1);

        let zoo = fs::read_to_string(temp_dir.path().join("zoo.csv")).unwrap();
        assert_eq!(zoo, "#struct zoo\n#changed\n");
    }

    #[test]
    fn test_path_traversal_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DirectoryWriter::new(temp_dir.path());

        for path in ["../escape.csv", "a/../../escape.csv", "/etc/passwd", ""] {
            let err = writer.write_artifact(path, "x").unwrap_err();
            assert!(matches!(err, Error::PathTraversal { .. }), "{}", path);
        }
        assert_eq!(writer.written(), 0);
    }
}
