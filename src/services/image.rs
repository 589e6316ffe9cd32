use crate::config::MediaConfig;
use crate::constants::IMAGE_EXTENSIONS;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

const RECIPE_DIR: &str = "recipes";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image must be a data:image/<ext>;base64,<payload> string")]
    MalformedDataUri,

    #[error("Unsupported image type '{0}'")]
    UnsupportedExtension(String),

    #[error("Image payload is not valid base64")]
    InvalidBase64,

    #[error("Image is empty")]
    Empty,

    #[error("Image exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Image content is not a valid {0} file")]
    SignatureMismatch(String),

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Errors the client can fix by sending a different image.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Decoded image bytes with their declared extension (lowercase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Parses `data:image/<ext>;base64,<payload>`.
    pub fn from_data_uri(input: &str) -> Result<Self, ImageError> {
        let rest = input
            .trim()
            .strip_prefix("data:image/")
            .ok_or(ImageError::MalformedDataUri)?;
        let (extension, payload) = rest
            .split_once(";base64,")
            .ok_or(ImageError::MalformedDataUri)?;

        let extension = normalize_extension(extension)?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| ImageError::InvalidBase64)?;

        Ok(Self { extension, bytes })
    }

    /// Builds an upload from a multipart file part; the extension comes from
    /// the client-supplied file name.
    pub fn from_file(file_name: &str, bytes: Vec<u8>) -> Result<Self, ImageError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ImageError::UnsupportedExtension(file_name.to_string()))?;

        Ok(Self {
            extension: normalize_extension(extension)?,
            bytes,
        })
    }

    pub fn validate(&self, max_bytes: usize) -> Result<(), ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if self.bytes.len() > max_bytes {
            return Err(ImageError::TooLarge(max_bytes));
        }
        if !signature_matches(&self.extension, &self.bytes) {
            return Err(ImageError::SignatureMismatch(self.extension.clone()));
        }
        Ok(())
    }
}

fn normalize_extension(raw: &str) -> Result<String, ImageError> {
    let ext = raw.trim().to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ImageError::UnsupportedExtension(raw.to_string()))
    }
}

fn signature_matches(extension: &str, bytes: &[u8]) -> bool {
    match extension {
        "png" => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "jpg" | "jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "webp" => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
        _ => false,
    }
}

/// Writes recipe images under the media root and maps stored names to URLs.
#[derive(Debug, Clone)]
pub struct ImageService {
    media_root: PathBuf,
    url_prefix: String,
    max_bytes: usize,
}

impl ImageService {
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            media_root: PathBuf::from(&config.media_path),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            max_bytes: config.max_image_bytes,
        }
    }

    /// Validates and writes the image, returning its media-relative name
    /// (`recipes/<uuid>.<ext>`).
    pub async fn store(&self, upload: &ImageUpload) -> Result<String, ImageError> {
        upload.validate(self.max_bytes)?;

        let dir = self.media_root.join(RECIPE_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), upload.extension);
        let path = dir.join(&file_name);
        fs::write(&path, &upload.bytes).await?;

        info!(path = %path.display(), bytes = upload.bytes.len(), "Stored recipe image");

        Ok(format!("{RECIPE_DIR}/{file_name}"))
    }

    /// Best-effort removal of a previously stored image.
    pub async fn remove(&self, stored_name: &str) {
        if stored_name.is_empty() || stored_name.contains("..") {
            return;
        }
        let path = self.media_root.join(stored_name);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove recipe image");
            }
        }
    }

    #[must_use]
    pub fn public_url(&self, stored_name: &str) -> String {
        format!("{}/{}", self.url_prefix, stored_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn data_uri(ext: &str, bytes: &[u8]) -> String {
        format!("data:image/{ext};base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn test_decode_data_uri() {
        let upload = ImageUpload::from_data_uri(&data_uri("PNG", PNG)).unwrap();
        assert_eq!(upload.extension, "png");
        assert_eq!(upload.bytes, PNG);
        assert!(upload.validate(1024).is_ok());
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            ImageUpload::from_data_uri("not an image"),
            Err(ImageError::MalformedDataUri)
        ));
        assert!(matches!(
            ImageUpload::from_data_uri("data:image/bmp;base64,AAAA"),
            Err(ImageError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            ImageUpload::from_data_uri("data:image/png;base64,!!!"),
            Err(ImageError::InvalidBase64)
        ));
    }

    #[test]
    fn test_signature_must_match_extension() {
        let upload = ImageUpload::from_data_uri(&data_uri("gif", PNG)).unwrap();
        assert!(matches!(
            upload.validate(1024),
            Err(ImageError::SignatureMismatch(_))
        ));

        let webp = b"RIFF\x10\0\0\0WEBPVP8 ";
        let upload = ImageUpload::from_file("photo.webp", webp.to_vec()).unwrap();
        assert!(upload.validate(1024).is_ok());
        assert!(matches!(upload.validate(4), Err(ImageError::TooLarge(4))));
    }

    #[tokio::test]
    async fn test_store_and_remove() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let service = ImageService::new(&MediaConfig {
            media_path: root.display().to_string(),
            ..MediaConfig::default()
        });

        let upload = ImageUpload::from_data_uri(&data_uri("png", PNG)).unwrap();
        let stored = service.store(&upload).await.unwrap();
        assert!(stored.starts_with("recipes/"));
        assert!(stored.ends_with(".png"));
        assert!(root.join(&stored).exists());
        assert_eq!(service.public_url(&stored), format!("/media/{stored}"));

        service.remove(&stored).await;
        assert!(!root.join(&stored).exists());

        let _ = std::fs::remove_dir_all(root);
    }
}
