//! Core types for image generation.

use crate::error::{ImagenError, Result};
use crate::image::catalog::{ModelFamily, DEFAULT_MODEL, DEFAULT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A request to generate an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier, e.g. `qwen-image-plus`.
    pub model: String,
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Size in the API's `W*H` form.
    pub size: String,
    /// Things the image should avoid.
    pub negative_prompt: Option<String>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt, default model and size.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            prompt: prompt.into(),
            size: DEFAULT_SIZE.to_string(),
            negative_prompt: None,
        }
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the size (already resolved to `W*H`).
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// Sets the negative prompt. Empty strings are ignored.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        self.negative_prompt = (!negative.is_empty()).then_some(negative);
        self
    }

    /// Returns the family of the request's model.
    pub fn family(&self) -> Result<ModelFamily> {
        ModelFamily::of(&self.model)
            .ok_or_else(|| ImagenError::InvalidRequest(format!("unknown model '{}'", self.model)))
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Request id reported by the API.
    pub request_id: Option<String>,
    /// URL the image was downloaded from.
    pub source_url: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// API family that produced the image.
    pub family: ModelFamily,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, family: ModelFamily, metadata: GenerationMetadata) -> Self {
        Self {
            data,
            family,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image, creating parent directories as needed.
    ///
    /// Returns the size of the written file. Fails with
    /// [`ImagenError::SaveVerification`] if the file is missing or empty
    /// afterwards.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.data)?;

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            _ => Err(ImagenError::SaveVerification(path.to_path_buf())),
        }
    }
}

/// Formats a byte count with a binary unit, e.g. `12.3 KB`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = GenerationRequest::new("A cute cat");
        assert_eq!(req.model, DEFAULT_MODEL);
        assert_eq!(req.size, DEFAULT_SIZE);
        assert!(req.negative_prompt.is_none());
        assert_eq!(req.family().unwrap(), ModelFamily::Synthesis);
    }

    #[test]
    fn test_request_empty_negative_is_none() {
        let req = GenerationRequest::new("A cute cat").with_negative_prompt("");
        assert!(req.negative_prompt.is_none());

        let req = GenerationRequest::new("A cute cat").with_negative_prompt("blurry");
        assert_eq!(req.negative_prompt.as_deref(), Some("blurry"));
    }

    #[test]
    fn test_request_unknown_model_family() {
        let req = GenerationRequest::new("A cute cat").with_model("sdxl");
        assert!(matches!(req.family(), Err(ImagenError::InvalidRequest(_))));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0.0 B");
        assert_eq!(human_size(512), "512.0 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(1536 * 1024), "1.5 MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024 * 1024), "5.0 TB");
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/image.png");
        let image = GeneratedImage::new(
            vec![0x89, 0x50, 0x4E, 0x47],
            ModelFamily::Synthesis,
            GenerationMetadata::default(),
        );

        let written = image.save(&path).unwrap();
        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_save_empty_data_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let image = GeneratedImage::new(
            Vec::new(),
            ModelFamily::Generation,
            GenerationMetadata::default(),
        );

        assert!(matches!(
            image.save(&path),
            Err(ImagenError::SaveVerification(_))
        ));
    }
}
