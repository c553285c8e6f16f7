//! Requests, their options and the phases that drive them.

mod context;
mod options;
mod pipeline;
#[allow(clippy::module_inception)]
mod request;
mod state;

pub use context::{EngineComponents, EngineContext};
pub use options::{DisplayOptions, DownloadOptions, KEY_SEPARATOR, LoadOptions, RequestOptions};
pub use request::{Request, RequestHandle};

pub(crate) use pipeline::{launch, run_inline};
pub(crate) use request::RequestSpec;
