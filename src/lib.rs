#![warn(missing_docs)]
//! Imagenty - text-to-image generation via Alibaba Cloud Bailian (DashScope).
//!
//! Qwen-Image and Wan models are served by two different upstream APIs. This
//! crate picks the right one from the model name, extracts the image URL from
//! the response, and downloads the image.
//!
//! # Quick Start
//!
//! ```no_run
//! use imagenty::{resolve_size, DashScopeProvider, GenerationRequest, ImageProvider};
//!
//! #[tokio::main]
//! async fn main() -> imagenty::Result<()> {
//!     let provider = DashScopeProvider::builder().build()?;
//!     let request = GenerationRequest::new("A cute cat")
//!         .with_model("wan2.6-t2i")
//!         .with_size(resolve_size(Some("16:9"), "wan2.6-t2i"));
//!     let image = provider.generate(&request).await?;
//!     image.save("cat.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `imagenty` command-line tool.

pub mod config;
mod error;
pub mod image;

#[cfg(feature = "cli")]
#[doc(hidden)]
pub mod cli;

// Re-export error types at crate root
pub use error::{ImagenError, Result};

pub use config::{resolve_api_base, Region, Settings};
pub use image::{
    human_size, resolve_model, resolve_size, DashScopeProvider, DashScopeProviderBuilder,
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageProvider, ModelFamily,
    ResolvedModel,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ImagenError, Result};
    pub use crate::image::{
        DashScopeProvider, GeneratedImage, GenerationRequest, ImageProvider, ModelFamily,
    };
}
