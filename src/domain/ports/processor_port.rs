//! Port definition for post-decode transformations.

use crate::domain::entities::Bitmap;
use crate::domain::errors::ProcessError;

use super::BitmapProvider;

/// Port for image processors. Called on blocking threads.
#[cfg_attr(test, mockall::automock)]
pub trait ImageProcessor: Send + Sync {
    /// Stable identity of the processor and its parameters.
    /// Becomes part of every cache key the processor is used in.
    fn key(&self) -> String;

    /// Transforms `bitmap`. The input may be given back to `pool` if the
    /// output uses a different buffer.
    ///
    /// # Errors
    /// Returns error if the transformation cannot be applied.
    fn process(&self, bitmap: Bitmap, pool: &dyn BitmapProvider) -> Result<Bitmap, ProcessError>;
}
