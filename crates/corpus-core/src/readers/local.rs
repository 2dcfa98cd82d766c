//! Local filesystem walker.
//!
//! Walks a directory tree and produces one document per file. The relative
//! directory becomes the document's `folder_id`, so the folder tree can be
//! reconstructed from the document list alone.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Reader, ReaderOptions};
use crate::error::{KbError, KbResult};
use crate::types::{Document, OriginalDoc};

/// Maximum characters kept in the document description.
const DESCRIPTION_CHARS: usize = 160;

/// Reader for corpora stored on the local filesystem.
pub struct LocalStoreReader {
    source_type: String,
    root: Option<PathBuf>,
}

impl LocalStoreReader {
    pub fn new(source_type: &str) -> Self {
        Self {
            source_type: source_type.to_string(),
            root: None,
        }
    }

    fn root(&self) -> KbResult<&Path> {
        self.root
            .as_deref()
            .ok_or_else(|| KbError::InvalidSource("reader not configured".to_string()))
    }
}

impl Reader for LocalStoreReader {
    fn configure(&mut self, options: &ReaderOptions) -> KbResult<()> {
        // Sources routed here with only a `url` are still local paths.
        let path = match (&options.path, &options.url) {
            (Some(path), _) => path.clone(),
            (None, Some(url)) => PathBuf::from(url),
            (None, None) => {
                return Err(KbError::InvalidSource(
                    "no path provided for local store".to_string(),
                ))
            }
        };

        if !path.is_dir() {
            return Err(KbError::InvalidSource(format!(
                "path does not exist or is not a directory: {}",
                path.display()
            )));
        }

        self.root = Some(path);
        Ok(())
    }

    fn load_documents(&self) -> KbResult<Vec<Document>> {
        let root = self.root()?;
        let mut documents = Vec::new();
        walk(root, root, &self.source_type, &mut documents)?;
        tracing::info!(
            root = %root.display(),
            count = documents.len(),
            "Loaded documents from local store"
        );
        Ok(documents)
    }

    fn source_type(&self) -> &str {
        &self.source_type
    }
}

fn walk(
    root: &Path,
    dir: &Path,
    source_type: &str,
    out: &mut Vec<Document>,
) -> KbResult<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| KbError::ReaderFailed(format!("read_dir {}: {}", dir.display(), e)))?
        .collect::<Result<_, _>>()
        .map_err(|e| KbError::ReaderFailed(format!("read_dir {}: {}", dir.display(), e)))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, source_type, out)?;
        } else if path.is_file() {
            out.push(read_document(root, &path, source_type)?);
        }
    }
    Ok(())
}

fn read_document(root: &Path, path: &Path, source_type: &str) -> KbResult<Document> {
    let bytes = fs::read(path)
        .map_err(|e| KbError::ReaderFailed(format!("read {}: {}", path.display(), e)))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let doc_type = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "text".to_string());

    // Forward-slash relative directory; empty for files at the root.
    let folder_id = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    let description: String = text.chars().take(DESCRIPTION_CHARS).collect();
    let id = uuid::Uuid::new_v4().to_string();

    Ok(Document {
        id: id.clone(),
        title: title.clone(),
        doc_type,
        date: chrono::Utc::now().to_rfc3339(),
        tags: Vec::new(),
        source: source_type.to_string(),
        description,
        url: path.to_string_lossy().into_owned(),
        folder_id,
        original: Some(OriginalDoc {
            id,
            text,
            metadata: serde_json::json!({
                "file_name": title,
                "file_path": path.to_string_lossy(),
            }),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("a/x.txt"), "alpha body").unwrap();
        fs::write(dir.path().join("b/y.txt"), "beta body").unwrap();
        fs::write(dir.path().join("b/nested/z.txt"), "gamma body").unwrap();
        fs::write(dir.path().join("root.txt"), "root body").unwrap();
        dir
    }

    #[test]
    fn configure_rejects_missing_path() {
        let mut reader = LocalStoreReader::new("local_store");
        let err = reader
            .configure(&ReaderOptions {
                path: Some(PathBuf::from("/no/such/path")),
                url: None,
            })
            .unwrap_err();
        assert!(matches!(err, KbError::InvalidSource(_)));

        let err = reader.configure(&ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, KbError::InvalidSource(_)));
    }

    #[test]
    fn loads_documents_with_relative_folder_ids() {
        let dir = fixture();
        let mut reader = LocalStoreReader::new("local_store");
        reader
            .configure(&ReaderOptions {
                path: Some(dir.path().to_path_buf()),
                url: None,
            })
            .unwrap();

        let docs = reader.load_documents().unwrap();
        assert_eq!(docs.len(), 4);

        let x = docs.iter().find(|d| d.title == "x.txt").unwrap();
        assert_eq!(x.folder_id, "a");
        assert_eq!(x.original.as_ref().unwrap().text, "alpha body");
        assert_eq!(x.doc_type, "txt");

        let z = docs.iter().find(|d| d.title == "z.txt").unwrap();
        assert_eq!(z.folder_id, "b/nested");

        let root = docs.iter().find(|d| d.title == "root.txt").unwrap();
        assert_eq!(root.folder_id, "");
    }

    #[test]
    fn configure_accepts_url_as_path() {
        let dir = fixture();
        let mut reader = LocalStoreReader::new("onlysaid-kb");
        reader
            .configure(&ReaderOptions {
                path: None,
                url: Some(dir.path().to_string_lossy().into_owned()),
            })
            .unwrap();
        assert_eq!(reader.load_documents().unwrap().len(), 4);
    }
}
