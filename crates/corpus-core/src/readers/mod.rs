//! Document readers.
//!
//! A reader turns a `source_type + config` into a list of documents. The
//! registry is a static mapping from source-type tag to factory; adding a
//! reader type means adding an arm here and nothing else changes.

mod local;

pub use local::LocalStoreReader;

use std::path::{Component, Path, PathBuf};

use crate::error::{KbError, KbResult};
use crate::types::Document;

/// Reader-specific options resolved from a registration.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Filesystem path for local stores.
    pub path: Option<PathBuf>,
    /// Opaque location for other sources.
    pub url: Option<String>,
}

/// Contract consumed by the ingestion pipeline.
///
/// `load_documents` is blocking and reads the entire corpus; the pipeline
/// runs it on the blocking pool. Failures are fatal to that KB's ingestion.
pub trait Reader: Send + Sync {
    fn configure(&mut self, options: &ReaderOptions) -> KbResult<()>;
    fn load_documents(&self) -> KbResult<Vec<Document>>;
    fn source_type(&self) -> &str;
}

/// Instantiate a reader for a source-type tag.
pub fn create_reader(source_type: &str) -> KbResult<Box<dyn Reader>> {
    match source_type {
        "local_store" | "onlysaid-kb" => Ok(Box::new(LocalStoreReader::new(source_type))),
        other => Err(KbError::InvalidSource(format!(
            "unknown source type: {}",
            other
        ))),
    }
}

/// Whether a source-type tag has a registered factory.
pub fn is_registered(source_type: &str) -> bool {
    matches!(source_type, "local_store" | "onlysaid-kb")
}

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_its_sources() {
        assert!(is_registered("local_store"));
        assert!(is_registered("onlysaid-kb"));
        assert!(!is_registered("web"));

        assert!(create_reader("local_store").is_ok());
        assert!(matches!(
            create_reader("web"),
            Err(KbError::InvalidSource(_))
        ));
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize_path(Path::new("/data/./kb/../fixtures")),
            PathBuf::from("/data/fixtures")
        );
        assert_eq!(normalize_path(Path::new("a/b/..")), PathBuf::from("a"));
        assert_eq!(normalize_path(Path::new(".")), PathBuf::from("."));
    }
}
