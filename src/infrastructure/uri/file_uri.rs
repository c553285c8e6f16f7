//! Local files, as `file://` URIs or absolute paths.

use std::path::{Path, PathBuf};

use crate::domain::ports::{LocalSource, UriModel};

const FILE_SCHEME: &str = "file://";

/// Files read straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileUriModel;

impl FileUriModel {
    fn path(uri: &str) -> Option<PathBuf> {
        let raw = uri.strip_prefix(FILE_SCHEME).unwrap_or(uri);
        let path = Path::new(raw);
        path.is_absolute().then(|| path.to_path_buf())
    }
}

impl UriModel for FileUriModel {
    fn name(&self) -> &'static str {
        "file"
    }

    fn matches(&self, uri: &str) -> bool {
        Self::path(uri).is_some()
    }

    fn local_source(&self, uri: &str) -> std::io::Result<LocalSource> {
        Self::path(uri).map(LocalSource::File).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{uri} is not an absolute path"),
            )
        })
    }
}
