//! Reading resource bytes by URI.

use std::collections::HashMap;
use std::io;

use parking_lot::RwLock;
use url::Url;

use crate::error::ResourceError;

/// Fetches the raw bytes of a resolved resource.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, uri: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Loads `file:` URIs from disk. Other schemes are refused: nothing is
/// ever downloaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemLoader;

impl ResourceLoader for FileSystemLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, ResourceError> {
        let url = Url::parse(uri).map_err(|err| ResourceError::InvalidUri {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(ResourceError::Unsupported {
                uri: uri.to_string(),
            });
        }
        let path = url.to_file_path().map_err(|()| ResourceError::InvalidUri {
            uri: uri.to_string(),
            reason: "not a local path".to_string(),
        })?;
        tracing::trace!(path = %path.display(), "reading resource");
        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound {
                uri: uri.to_string(),
            },
            _ => ResourceError::Io {
                uri: uri.to_string(),
                source,
            },
        })
    }
}

/// An in-memory file system keyed by URI.
#[derive(Debug, Default)]
pub struct MemoryResourceLoader {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(uri.into(), content.into());
    }

    pub fn remove(&self, uri: &str) -> bool {
        self.files.write().remove(uri).is_some()
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, ResourceError> {
        self.files
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                uri: uri.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let loader = MemoryResourceLoader::new();
        loader.insert("file:///a.dtd", "<!ELEMENT a EMPTY>");
        assert_eq!(loader.load("file:///a.dtd").unwrap(), b"<!ELEMENT a EMPTY>");
        assert!(loader.remove("file:///a.dtd"));
        assert!(matches!(
            loader.load("file:///a.dtd"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_file_loader_reads_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.dtd");
        std::fs::write(&path, "<!ELEMENT a EMPTY>").unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        assert_eq!(
            FileSystemLoader.load(uri.as_str()).unwrap(),
            b"<!ELEMENT a EMPTY>"
        );

        let missing = Url::from_file_path(dir.path().join("missing.dtd")).unwrap();
        let err = FileSystemLoader.load(missing.as_str()).unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
        assert_eq!(err.uri(), Some(missing.as_str()));
    }

    #[test]
    fn test_file_loader_refuses_remote() {
        let err = FileSystemLoader.load("http://example.com/a.dtd").unwrap_err();
        assert!(matches!(err, ResourceError::Unsupported { .. }));
        let err = FileSystemLoader.load("not a uri").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidUri { .. }));
    }
}
