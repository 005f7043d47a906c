//! Definition sources for lazy bulk-loading.

use std::path::PathBuf;

use crate::error::LoadError;

/// Location of a definitions document.
///
/// Sources are consulted once, in configuration order, the first time a
/// template lookup misses.
pub trait DefinitionSource: Send + Sync {
    /// Human-readable name for logs and errors.
    fn name(&self) -> String;

    /// Read the whole document.
    fn read(&self) -> Result<String, LoadError>;
}

/// Definitions document on the filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DefinitionSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String, LoadError> {
        std::fs::read_to_string(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Definitions document held in memory.
#[derive(Debug, Clone)]
pub struct StringSource {
    name: String,
    content: String,
}

impl StringSource {
    /// Create a named in-memory source.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl DefinitionSource for StringSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> Result<String, LoadError> {
        Ok(self.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.xml");
        std::fs::write(&path, "<definitions/>").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.read().unwrap(), "<definitions/>");
        assert!(source.name().ends_with("defs.xml"));
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/defs.xml");
        assert!(matches!(source.read(), Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_string_source() {
        let source = StringSource::new("inline", "<definitions/>");
        assert_eq!(source.name(), "inline");
        assert_eq!(source.read().unwrap(), "<definitions/>");
    }
}
