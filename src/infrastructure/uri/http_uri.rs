//! `http://` and `https://` URIs.

use crate::domain::ports::{LocalSource, UriModel};

/// Network URIs fetched through the downloader.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpUriModel;

impl HttpUriModel {
    const SCHEMES: [&'static str; 2] = ["http://", "https://"];
}

impl UriModel for HttpUriModel {
    fn name(&self) -> &'static str {
        "http"
    }

    fn matches(&self, uri: &str) -> bool {
        Self::SCHEMES.iter().any(|scheme| {
            uri.len() > scheme.len()
                && uri.is_char_boundary(scheme.len())
                && uri[..scheme.len()].eq_ignore_ascii_case(scheme)
        })
    }

    fn is_network(&self) -> bool {
        true
    }

    fn local_source(&self, uri: &str) -> std::io::Result<LocalSource> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("{uri} must be downloaded"),
        ))
    }
}
