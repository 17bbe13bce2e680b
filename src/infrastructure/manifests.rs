//! Manifest sources.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::ports::{ManifestError, ManifestSource};

/// Reads `<root>/<name>`, adding a `.yaml` extension when `name` has none.
#[derive(Debug, Clone)]
pub struct FsManifestSource {
    root: PathBuf,
}

impl FsManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("yaml")
        }
    }
}

impl ManifestSource for FsManifestSource {
    fn load(&self, name: &str) -> Result<Vec<u8>, ManifestError> {
        let path = self.path_for(name);
        std::fs::read(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ManifestError::NotFound {
                    name: name.to_string(),
                    location: path.display().to_string(),
                }
            } else {
                ManifestError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }
}

/// Manifests held in memory, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifestSource {
    manifests: HashMap<String, Vec<u8>>,
}

impl InMemoryManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, blob: impl Into<Vec<u8>>) -> Self {
        self.manifests.insert(name.into(), blob.into());
        self
    }
}

impl ManifestSource for InMemoryManifestSource {
    fn load(&self, name: &str) -> Result<Vec<u8>, ManifestError> {
        self.manifests
            .get(name)
            .cloned()
            .ok_or_else(|| ManifestError::NotFound {
                name: name.to_string(),
                location: "memory".to_string(),
            })
    }
}
