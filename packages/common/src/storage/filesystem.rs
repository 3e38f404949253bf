use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::error::StorageError;
use super::format::{ImageFormat, ImageInfo};
use super::name::AssetName;
use super::traits::AssetStore;

/// Filesystem-backed asset store.
///
/// Assets live flat in `{base_path}/{name}`. Writes go to `{base_path}/.tmp`
/// first and are renamed into place, so readers never observe a partial file.
pub struct FilesystemAssetStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemAssetStore {
    /// Create a new filesystem asset store, creating its directories if needed.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn asset_path(&self, name: &AssetName) -> PathBuf {
        self.base_path.join(name.as_str())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

fn check_declared_extension(declared: Option<&str>, detected: ImageFormat) {
    let Some(filename) = declared else {
        return;
    };
    let declared_format = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension);
    if declared_format != Some(detected) {
        debug!(
            filename,
            detected = %detected,
            "Declared filename does not match detected image format"
        );
    }
}

#[async_trait]
impl AssetStore for FilesystemAssetStore {
    async fn store(
        &self,
        data: &[u8],
        declared_filename: Option<&str>,
    ) -> Result<AssetName, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let info = ImageInfo::decode(data)?;
        check_declared_extension(declared_filename, info.format);

        let name = AssetName::generate(info.format);
        let asset_path = self.asset_path(&name);

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &asset_path).await {
            let _ = fs::remove_file(&temp_path).await;
            if fs::remove_file(&asset_path).await.is_ok() {
                warn!(name = %name, "Removed partially written asset");
            }
            return Err(e.into());
        }

        debug!(name = %name, size = data.len(), "Stored asset");
        Ok(name)
    }

    async fn get(&self, name: &AssetName) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.asset_path(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &AssetName) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.asset_path(name)).await?)
    }

    async fn delete(&self, name: &AssetName) -> Result<bool, StorageError> {
        match fs::remove_file(self.asset_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
