use async_trait::async_trait;

use super::error::StorageError;
use super::name::AssetName;

/// Durable storage for published image assets.
///
/// Every successful `store` yields a name that has never been returned before,
/// so concurrent writers never collide.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Validate that `data` is a supported image, write it, and return its new name.
    ///
    /// `declared_filename` is the client-supplied filename, if any. It is advisory
    /// only; the stored extension always follows the detected format.
    async fn store(
        &self,
        data: &[u8],
        declared_filename: Option<&str>,
    ) -> Result<AssetName, StorageError>;

    /// Retrieve all bytes of a stored asset.
    async fn get(&self, name: &AssetName) -> Result<Vec<u8>, StorageError>;

    /// Check whether an asset exists.
    async fn exists(&self, name: &AssetName) -> Result<bool, StorageError>;

    /// Delete an asset by name.
    ///
    /// Returns `true` if the asset was deleted, `false` if it did not exist.
    async fn delete(&self, name: &AssetName) -> Result<bool, StorageError>;
}
