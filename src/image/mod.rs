//! Image generation module.

pub mod catalog;
mod provider;
pub mod providers;
mod types;

pub use catalog::{resolve_model, resolve_size, ModelFamily, ResolvedModel};
pub use provider::ImageProvider;
pub use providers::{DashScopeProvider, DashScopeProviderBuilder};
pub use types::{human_size, GeneratedImage, GenerationMetadata, GenerationRequest};
