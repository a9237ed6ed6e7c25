//! Seams to the media-processing backend

use async_trait::async_trait;
use std::path::Path;
use video_edit_common::{MediaInfo, ProcessingError};

use crate::operation::Operation;

/// Applies one operation to a file, writing the result to `output`
///
/// Implementations must not modify `input`.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessingError>;
}

/// Reads duration and stream layout of a media file
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProcessingError>;
}
