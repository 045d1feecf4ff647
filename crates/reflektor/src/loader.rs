//! Stylesheet source resolution.
//!
//! The parser never touches the filesystem itself: the entry stylesheet and
//! every `@import` go through a [`StylesheetLoader`], which maps a
//! `(name, extension, location)` triple to source text.
//!
//! Two loaders are provided:
//!
//! - [`FsLoader`] reads `<dir>/<name>.<extension>` for [`Location::Dir`]
//! - [`MemoryLoader`] serves inline sources grouped in named bundles, for
//!   [`Location::Bundle`] (embedded stylesheets, tests)
//!
//! ```rust
//! use reflektor::{Location, MemoryLoader, StylesheetLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with_source("app", "main.less", "@import \"colors\";")
//!     .with_source("app", "colors.less", "@global { @accent = #ff9900; }");
//!
//! let text = loader.load("colors", "less", &Location::bundle("app")).unwrap();
//! assert!(text.contains("@accent"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::LoadError;

/// Where stylesheet files are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// A filesystem directory.
    Dir(PathBuf),
    /// A named bundle of in-memory sources.
    Bundle(String),
}

impl Location {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Location::Dir(path.into())
    }

    pub fn bundle(name: impl Into<String>) -> Self {
        Location::Bundle(name.into())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Dir(path) => write!(f, "directory '{}'", path.display()),
            Location::Bundle(name) => write!(f, "bundle '{}'", name),
        }
    }
}

/// Resolves stylesheet names to source text.
pub trait StylesheetLoader {
    fn load(&self, name: &str, extension: &str, location: &Location) -> Result<String, LoadError>;
}

fn not_found(name: &str, extension: &str, location: &Location) -> LoadError {
    LoadError::NotFound {
        name: name.to_string(),
        extension: extension.to_string(),
        location: location.to_string(),
    }
}

/// Loads `<dir>/<name>.<extension>` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl FsLoader {
    pub fn new() -> Self {
        Self
    }
}

impl StylesheetLoader for FsLoader {
    fn load(&self, name: &str, extension: &str, location: &Location) -> Result<String, LoadError> {
        let Location::Dir(dir) = location else {
            return Err(not_found(name, extension, location));
        };
        let path = dir.join(format!("{}.{}", name, extension));
        fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => not_found(name, extension, location),
            _ => LoadError::Io {
                path,
                message: err.to_string(),
            },
        })
    }
}

/// Serves sources registered in memory, keyed by bundle and file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `file_name` (including its extension) to `bundle`, replacing any
    /// previous source with that name.
    pub fn add_source(
        &mut self,
        bundle: impl Into<String>,
        file_name: impl Into<String>,
        source: impl Into<String>,
    ) {
        self.bundles
            .entry(bundle.into())
            .or_default()
            .insert(file_name.into(), source.into());
    }

    pub fn with_source(
        mut self,
        bundle: impl Into<String>,
        file_name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.add_source(bundle, file_name, source);
        self
    }

    /// Adds many sources to one bundle.
    pub fn add_bundle(&mut self, bundle: impl Into<String>, sources: HashMap<String, String>) {
        self.bundles.entry(bundle.into()).or_default().extend(sources);
    }
}

impl StylesheetLoader for MemoryLoader {
    fn load(&self, name: &str, extension: &str, location: &Location) -> Result<String, LoadError> {
        let Location::Bundle(bundle) = location else {
            return Err(not_found(name, extension, location));
        };
        self.bundles
            .get(bundle)
            .and_then(|files| files.get(&format!("{}.{}", name, extension)))
            .cloned()
            .ok_or_else(|| not_found(name, extension, location))
    }
}

impl<L: StylesheetLoader + ?Sized> StylesheetLoader for Box<L> {
    fn load(&self, name: &str, extension: &str, location: &Location) -> Result<String, LoadError> {
        (**self).load(name, extension, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_loader_reads_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.less"), ".A { x: 1; }").unwrap();

        let text = FsLoader
            .load("main", "less", &Location::dir(dir.path()))
            .unwrap();
        assert_eq!(text, ".A { x: 1; }");
    }

    #[test]
    fn test_fs_loader_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("themes")).unwrap();
        fs::write(dir.path().join("themes/dark.less"), "#dark { }").unwrap();

        let text = FsLoader
            .load("themes/dark", "less", &Location::dir(dir.path()))
            .unwrap();
        assert_eq!(text, "#dark { }");
    }

    #[test]
    fn test_fs_loader_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = FsLoader
            .load("missing", "less", &Location::dir(dir.path()))
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.to_string().contains("missing.less"));
    }

    #[test]
    fn test_fs_loader_rejects_bundles() {
        let err = FsLoader
            .load("main", "less", &Location::bundle("app"))
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn test_memory_loader() {
        let mut loader = MemoryLoader::new();
        loader.add_source("app", "main.less", "a");
        loader.add_source("app", "main.css", "b");
        loader.add_source("other", "main.less", "c");

        let app = Location::bundle("app");
        assert_eq!(loader.load("main", "less", &app).unwrap(), "a");
        assert_eq!(loader.load("main", "css", &app).unwrap(), "b");
        assert_eq!(
            loader.load("main", "less", &Location::bundle("other")).unwrap(),
            "c"
        );
        assert!(loader.load("nope", "less", &app).is_err());
        assert!(loader.load("main", "less", &Location::dir("/tmp")).is_err());
    }

    #[test]
    fn test_memory_loader_add_bundle_replaces() {
        let mut loader = MemoryLoader::new().with_source("app", "a.less", "old");
        let mut files = HashMap::new();
        files.insert("a.less".to_string(), "new".to_string());
        loader.add_bundle("app", files);
        assert_eq!(
            loader.load("a", "less", &Location::bundle("app")).unwrap(),
            "new"
        );
    }
}
