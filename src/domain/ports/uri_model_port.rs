//! Port definition for URI schemes.

use std::path::PathBuf;

use bytes::Bytes;

use crate::domain::entities::ImageFrom;

/// Bytes a URI model can provide without the network.
#[derive(Debug, Clone)]
pub enum LocalSource {
    /// A file on disk.
    File(PathBuf),
    /// Bytes already in memory.
    Bytes(Bytes),
}

impl LocalSource {
    /// Where results decoded from this source come from.
    #[must_use]
    pub const fn image_from(&self) -> ImageFrom {
        match self {
            Self::File(_) => ImageFrom::Local,
            Self::Bytes(_) => ImageFrom::Memory,
        }
    }

    /// Reads the bytes.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match self {
            Self::File(path) => tokio::fs::read(path).await.map(Bytes::from),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Capability descriptor for one URI scheme or pattern.
pub trait UriModel: Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if this model handles `uri`.
    fn matches(&self, uri: &str) -> bool;

    /// Returns true if the bytes must be downloaded.
    fn is_network(&self) -> bool {
        false
    }

    /// Key under which downloaded bytes are stored in the disk cache.
    fn disk_cache_key(&self, uri: &str) -> String {
        uri.to_string()
    }

    /// Resolves the bytes for a local URI.
    ///
    /// # Errors
    /// Returns error for network models or malformed URIs.
    fn local_source(&self, uri: &str) -> std::io::Result<LocalSource>;
}
