use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest '{name}' not found (checked: {location})")]
    NotFound { name: String, location: String },

    #[error("Failed to read manifest '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies raw declarative-document blobs by logical name.
pub trait ManifestSource: Send + Sync {
    fn load(&self, name: &str) -> Result<Vec<u8>, ManifestError>;
}
