use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};

use crate::{IMAGE_SUFFIX_LENGTH, MEDIA_URL, RECIPE_IMAGE_DIR};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Expected a data URI of the form data:image/<ext>;base64,<payload>.")]
    Malformed,

    #[error("Unsupported image extension.")]
    Extension,

    #[error("Image payload is not valid base64.")]
    Payload,

    #[error("Image payload is empty.")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub file_name: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<ext>;base64,<payload>` into a `temp.<ext>` file.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, ImageError> {
    let rest = uri.trim().strip_prefix("data:image/").ok_or(ImageError::Malformed)?;
    let (extension, payload) = rest.split_once(";base64,").ok_or(ImageError::Malformed)?;

    if extension.is_empty()
        || extension.len() > 10
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ImageError::Extension);
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImageError::Payload)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let extension = extension.to_ascii_lowercase();
    Ok(DecodedImage {
        file_name: format!("temp.{extension}"),
        extension,
        bytes,
    })
}

fn suffixed_name(image: &DecodedImage) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(IMAGE_SUFFIX_LENGTH)
        .map(char::from)
        .collect();

    format!("temp_{suffix}.{}", image.extension)
}

/// Fills a freshly created file, deleting it again if the write fails.
async fn fill_or_discard<W: AsyncWrite + Unpin>(
    mut file: W,
    path: &Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            log::warn!("Failed to remove partial image {}: {cleanup}", path.display());
        }
        return Err(e);
    }
    Ok(())
}

/// Writes the image under `<media_root>/recipes/images/` and returns its
/// path relative to the media root. An existing file is never overwritten.
pub async fn store_image(media_root: &Path, image: &DecodedImage) -> std::io::Result<String> {
    let dir = media_root.join(RECIPE_IMAGE_DIR);
    fs::create_dir_all(&dir).await?;

    let mut name = image.file_name.to_owned();
    loop {
        let path: PathBuf = dir.join(&name);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                fill_or_discard(file, &path, &image.bytes).await?;
                log::debug!("Stored image {}", path.display());
                return Ok(format!("{RECIPE_IMAGE_DIR}/{name}"));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                name = suffixed_name(image);
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn remove_image(media_root: &Path, relative: &str) {
    if relative.is_empty() {
        return;
    }
    if let Err(e) = fs::remove_file(media_root.join(relative)).await {
        log::warn!("Failed to remove image {relative}: {e}");
    }
}

pub fn media_url(relative: &str) -> String {
    format!("{MEDIA_URL}{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_uri() {
        let image = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.file_name, "temp.png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn extension_is_normalised() {
        let image = decode_data_uri("data:image/JPEG;base64,aGVsbG8=").unwrap();
        assert_eq!(image.file_name, "temp.jpeg");
    }

    #[test]
    fn rejects_malformed_uris() {
        assert_eq!(decode_data_uri("aGVsbG8="), Err(ImageError::Malformed));
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVsbG8="), Err(ImageError::Malformed));
        assert_eq!(decode_data_uri("data:image/png,aGVsbG8="), Err(ImageError::Malformed));
        assert_eq!(decode_data_uri("data:image/p/g;base64,aGVsbG8="), Err(ImageError::Extension));
        assert_eq!(decode_data_uri("data:image/png;base64,@@@"), Err(ImageError::Payload));
        assert_eq!(decode_data_uri("data:image/png;base64,"), Err(ImageError::Empty));
    }

    #[tokio::test]
    async fn stored_files_never_collide() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", std::process::id()));
        let image = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();

        let first = store_image(&root, &image).await.unwrap();
        let second = store_image(&root, &image).await.unwrap();

        assert_eq!(first, "recipes/images/temp.png");
        assert_ne!(first, second);
        assert!(second.starts_with("recipes/images/temp_"));
        assert_eq!(std::fs::read(root.join(&second)).unwrap(), b"hello");

        remove_image(&root, &first).await;
        remove_image(&root, &second).await;
        assert!(!root.join(&first).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    struct BrokenDisk;

    impl AsyncWrite for BrokenDisk {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            _: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::new(ErrorKind::Other, "disk full")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_writes_leave_no_file_behind() {
        let path = std::env::temp_dir().join(format!("foodgram-partial-{}.png", std::process::id()));
        std::fs::write(&path, b"he").unwrap();

        let err = fill_or_discard(BrokenDisk, &path, b"hello").await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
    }

    #[test]
    fn media_urls() {
        assert_eq!(media_url("recipes/images/temp.png"), "/media/recipes/images/temp.png");
    }
}
