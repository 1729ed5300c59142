use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_SIGNATURES, RECIPE_IMAGE_DIR},
    error::{QueryError, ValidationError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes an inline image, either `data:image/png;base64,<payload>` or bare base64.
pub fn decode_image(payload: &str) -> Result<DecodedImage, ValidationError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ValidationError::new("image", "Image is required"));
    }

    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ValidationError::new("image", "Malformed data URL"))?;
            if !header.starts_with("image/") || !header.ends_with(";base64") {
                return Err(ValidationError::new(
                    "image",
                    "Only base64 encoded images are accepted",
                ));
            }
            data
        }
        None => payload,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ValidationError::new("image", "Image is not valid base64"))?;

    let extension = sniff_extension(&bytes)
        .ok_or_else(|| ValidationError::new("image", "Unsupported or corrupt image"))?;

    Ok(DecodedImage { bytes, extension })
}

fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }

    IMAGE_SIGNATURES
        .iter()
        .find(|(signature, _)| bytes.starts_with(signature))
        .map(|(_, extension)| *extension)
}

/// Local file storage for uploaded images.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };

        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Public URL of a stored file name.
    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.url, name)
    }

    /// Writes the image and returns its stored name, relative to the media root.
    pub async fn save(&self, image: &DecodedImage) -> Result<String, potion::Error> {
        let name = format!(
            "{RECIPE_IMAGE_DIR}/{}.{}",
            uuid::Uuid::new_v4().simple(),
            image.extension
        );
        let path = self.root.join(&name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| QueryError::new(format!("Could not create media dir: {e}")))?;
        }
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| QueryError::new(format!("Could not store image: {e}")))?;

        log::trace!("> Stored image {name}");
        Ok(name)
    }

    pub async fn remove(&self, name: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(name)).await {
            log::warn!("> Failed to remove image {name}: {e}");
        }
    }
}
