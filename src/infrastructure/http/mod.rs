//! HTTP downloader backed by reqwest.

mod downloader;

pub use downloader::{HttpConfig, HttpDownloader};
