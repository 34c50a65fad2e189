//! Image upload admission
//!
//! Type, size and count are checked before anything is copied. An accepted
//! file is copied into the images directory and referenced by a `file://`
//! URL, so viewers in other processes can resolve it.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::constants::limits::{MAX_IMAGE_LAYERS, MAX_UPLOAD_BYTES};
use crate::layer::{Layer, LayerDraft};
use crate::store::{ResourceStore, StoreError};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("only PNG and GIF images can be uploaded")]
    UnsupportedType,

    #[error("image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("image layers are limited to {limit} per overlay")]
    ResourceLimitExceeded { limit: usize },

    #[error("cannot reference uploaded file {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Gif,
}

impl ImageFormat {
    /// Detect the format from the leading bytes of the file
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(PNG_MAGIC) {
            Some(ImageFormat::Png)
        } else if head.starts_with(GIF87_MAGIC) || head.starts_with(GIF89_MAGIC) {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }
}

/// A copied image ready to become a layer
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    /// `file://` URL of the stored copy
    pub src: String,
    /// Original file name, used as the layer name
    pub filename: String,
    pub path: PathBuf,
    pub format: ImageFormat,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> UploadError + '_ {
    move |source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Validate `source` and copy it into `images_dir`
///
/// `image_count` is how many image layers the target store already holds.
pub async fn upload_image(source: &Path, images_dir: &Path, image_count: usize) -> Result<UploadedImage, UploadError> {
    if image_count >= MAX_IMAGE_LAYERS {
        return Err(UploadError::ResourceLimitExceeded { limit: MAX_IMAGE_LAYERS });
    }

    let metadata = tokio::fs::metadata(source).await.map_err(io_error(source))?;
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: metadata.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let mut head = [0u8; 8];
    let mut file = tokio::fs::File::open(source).await.map_err(io_error(source))?;
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..]).await.map_err(io_error(source))?;
        if n == 0 {
            break;
        }
        read += n;
    }
    let format = ImageFormat::sniff(&head[..read]).ok_or(UploadError::UnsupportedType)?;
    drop(file);

    tokio::fs::create_dir_all(images_dir)
        .await
        .map_err(io_error(images_dir))?;

    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("image.{}", format.extension()));
    let stored = images_dir.join(format!("{}.{}", Uuid::new_v4().simple(), format.extension()));
    tokio::fs::copy(source, &stored).await.map_err(io_error(&stored))?;

    let absolute = tokio::fs::canonicalize(&stored).await.map_err(io_error(&stored))?;
    let src = Url::from_file_path(&absolute)
        .map_err(|_| UploadError::InvalidPath(absolute.clone()))?
        .to_string();

    info!(file = %filename, stored = %absolute.display(), format = ?format, "Accepted image upload");
    Ok(UploadedImage {
        src,
        filename,
        path: absolute,
        format,
    })
}

/// Upload `source` and add it to the store as an image layer
///
/// Rejections leave the store untouched.
pub async fn add_image_layer(
    store: &mut ResourceStore,
    source: &Path,
    images_dir: &Path,
) -> Result<Layer, UploadError> {
    let uploaded = upload_image(source, images_dir, store.image_count()).await?;
    match store.add_layer(LayerDraft::image(uploaded.src.clone(), uploaded.filename.clone())) {
        Ok(layer) => Ok(layer),
        Err(e) => {
            warn!(error = %e, "Store refused uploaded image, discarding copy");
            if let Err(remove) = tokio::fs::remove_file(&uploaded.path).await {
                debug!(error = %remove, "Failed to discard uploaded copy");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerContent, Locale};
    use crate::persistence::{MemorySnapshotStore, SnapshotStore};
    use crate::sync::LocalBus;
    use std::sync::Arc;

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn empty_store() -> ResourceStore {
        let persistence = MemorySnapshotStore::new();
        persistence.write(&Vec::new()).unwrap();
        ResourceStore::load(Arc::new(persistence), Box::new(LocalBus::new().channel()), Locale::En)
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ImageFormat::sniff(PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(b"GIF89a..."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"GIF87a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"\xff\xd8\xff\xe0"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
    }

    #[tokio::test]
    async fn test_png_is_copied_and_referenced() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), "crest.png");
        let images = dir.path().join("images");

        let uploaded = upload_image(&source, &images, 0).await.unwrap();
        assert_eq!(uploaded.filename, "crest.png");
        assert_eq!(uploaded.format, ImageFormat::Png);
        assert!(uploaded.src.starts_with("file://"));
        assert!(uploaded.path.starts_with(images.canonicalize().unwrap()));
        assert_eq!(std::fs::read(&uploaded.path).unwrap(), std::fs::read(&source).unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.png");
        std::fs::write(&source, b"\xff\xd8\xff\xe0 jpeg pretending").unwrap();

        let result = upload_image(&source, &dir.path().join("images"), 0).await;
        assert!(matches!(result, Err(UploadError::UnsupportedType)));
        assert!(!dir.path().join("images").exists());
    }

    #[tokio::test]
    async fn test_oversized_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("big.gif");
        let file = std::fs::File::create(&source).unwrap();
        file.set_len(MAX_UPLOAD_BYTES + 1).unwrap();

        let result = upload_image(&source, &dir.path().join("images"), 0).await;
        assert!(matches!(result, Err(UploadError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn test_cap_checked_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let result = upload_image(&dir.path().join("missing.png"), dir.path(), MAX_IMAGE_LAYERS).await;
        assert!(matches!(result, Err(UploadError::ResourceLimitExceeded { limit: 15 })));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = upload_image(&dir.path().join("missing.png"), dir.path(), 0).await;
        let err = result.unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
        assert!(err.to_string().contains("missing.png"));
    }

    #[tokio::test]
    async fn test_add_image_layer() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_png(dir.path(), "logo.png");
        let mut store = empty_store();

        let layer = add_image_layer(&mut store, &source, &dir.path().join("images")).await.unwrap();
        assert_eq!(layer.name, "logo.png");
        assert!(matches!(&layer.content, LayerContent::Image(image) if image.src.starts_with("file://")));
        assert_eq!(store.image_count(), 1);
        assert!(store.is_modified());
    }

    #[tokio::test]
    async fn test_rejected_upload_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, "hello").unwrap();
        let mut store = empty_store();

        assert!(add_image_layer(&mut store, &source, dir.path()).await.is_err());
        assert!(store.is_empty());
        assert!(!store.is_modified());
    }
}
