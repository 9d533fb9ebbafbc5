//! Image generation providers.

mod dashscope;

pub use dashscope::{DashScopeProvider, DashScopeProviderBuilder};
