mod error;
mod format;
mod name;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use format::{ImageFormat, ImageInfo};
pub use name::AssetName;
pub use traits::AssetStore;
