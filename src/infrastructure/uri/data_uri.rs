//! Inline `data:` URIs with base64 payloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::domain::ports::{LocalSource, UriModel};

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Images embedded in the URI itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriModel;

impl DataUriModel {
    fn payload(uri: &str) -> Option<&str> {
        let rest = uri.strip_prefix(DATA_SCHEME)?;
        let (_, payload) = rest.split_once(BASE64_MARKER)?;
        Some(payload)
    }
}

impl UriModel for DataUriModel {
    fn name(&self) -> &'static str {
        "data"
    }

    fn matches(&self, uri: &str) -> bool {
        uri.starts_with(DATA_SCHEME)
    }

    fn local_source(&self, uri: &str) -> std::io::Result<LocalSource> {
        let payload = Self::payload(uri).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "data uri is not base64 encoded",
            )
        })?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(LocalSource::Bytes(Bytes::from(bytes)))
    }
}
