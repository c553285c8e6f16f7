//! Deduplication of concurrent requests producing identical results.

mod result_share_manager;

pub use result_share_manager::{ResultShareManager, ShareOutcome, ShareParticipant};
