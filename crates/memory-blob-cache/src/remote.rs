//! Remote blob store interface

use crate::error::Result;
use async_trait::async_trait;

/// Backend capable of fetching binary payloads by locator.
///
/// The cache never talks to a network itself; transport lives behind this
/// seam. Implementations map their own failures into `BlobError::Remote`.
#[async_trait]
pub trait BlobRemote: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}
