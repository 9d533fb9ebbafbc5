//! Credential, endpoint and model resolution from the environment.

use crate::error::{ImagenError, Result};
use crate::image::catalog::DEFAULT_MODEL;
use std::time::Duration;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";
/// Environment variable holding the default model.
pub const MODEL_ENV: &str = "DASHSCOPE_MODEL";
/// Environment variable holding a region code or a custom endpoint URL.
pub const API_BASE_ENV: &str = "DASHSCOPE_API_BASE";

/// Default timeout for the generation call (including task polling).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for downloading the generated image.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// DashScope service regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// China (Beijing).
    #[default]
    Cn,
    /// Singapore (international).
    Sg,
    /// US (Virginia).
    Us,
}

impl Region {
    /// All regions, in display order.
    pub const ALL: [Region; 3] = [Region::Cn, Region::Sg, Region::Us];

    /// Returns the short region code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cn => "cn",
            Self::Sg => "sg",
            Self::Us => "us",
        }
    }

    /// Returns the API base URL for this region.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Cn => "https://dashscope.aliyuncs.com/api/v1",
            Self::Sg => "https://dashscope-intl.aliyuncs.com/api/v1",
            Self::Us => "https://dashscope-us.aliyuncs.com/api/v1",
        }
    }

    /// Looks up a region by its short code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Resolves the API base: region code → region URL, anything else verbatim,
/// unset or empty → default region.
pub fn resolve_api_base(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Region::from_code(v)
            .map(|r| r.base_url().to_string())
            .unwrap_or_else(|| v.to_string()),
        None => Region::default().base_url().to_string(),
    }
}

/// Settings resolved for a single invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// DashScope API key.
    pub api_key: String,
    /// API base URL.
    pub api_base: String,
    /// Requested model name, not yet validated against the catalog.
    pub model: String,
}

impl Settings {
    /// Resolves settings from the process environment.
    pub fn from_env(model_flag: Option<&str>) -> Result<Self> {
        Self::resolve(model_flag, |key| std::env::var(key).ok())
    }

    /// Resolves settings using `lookup` to read variables.
    ///
    /// Model precedence is `model_flag`, then `DASHSCOPE_MODEL`, then the
    /// built-in default.
    pub fn resolve<F>(model_flag: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ImagenError::MissingCredential(format!("{API_KEY_ENV} environment variable not set"))
            })?;

        let api_base = resolve_api_base(lookup(API_BASE_ENV).as_deref());

        let model = model_flag
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| lookup(MODEL_ENV).filter(|m| !m.is_empty()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            api_base,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_api_base_region_code() {
        assert_eq!(
            resolve_api_base(Some("sg")),
            "https://dashscope-intl.aliyuncs.com/api/v1"
        );
        assert_eq!(
            resolve_api_base(Some("us")),
            "https://dashscope-us.aliyuncs.com/api/v1"
        );
    }

    #[test]
    fn test_resolve_api_base_custom_url() {
        assert_eq!(
            resolve_api_base(Some("http://localhost:8080/api/v1")),
            "http://localhost:8080/api/v1"
        );
    }

    #[test]
    fn test_resolve_api_base_default() {
        assert_eq!(
            resolve_api_base(None),
            "https://dashscope.aliyuncs.com/api/v1"
        );
        assert_eq!(
            resolve_api_base(Some("")),
            "https://dashscope.aliyuncs.com/api/v1"
        );
    }

    #[test]
    fn test_missing_api_key() {
        let result = Settings::resolve(None, env(&[]));
        assert!(matches!(result, Err(ImagenError::MissingCredential(_))));

        let result = Settings::resolve(None, env(&[(API_KEY_ENV, "")]));
        assert!(matches!(result, Err(ImagenError::MissingCredential(_))));
    }

    #[test]
    fn test_model_precedence() {
        let lookup = env(&[(API_KEY_ENV, "sk-test"), (MODEL_ENV, "wan2.2-t2i-flash")]);

        let settings = Settings::resolve(Some("wan2.6-t2i"), &lookup).unwrap();
        assert_eq!(settings.model, "wan2.6-t2i");

        let settings = Settings::resolve(None, &lookup).unwrap();
        assert_eq!(settings.model, "wan2.2-t2i-flash");

        let settings = Settings::resolve(None, env(&[(API_KEY_ENV, "sk-test")])).unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_settings_endpoint_from_env() {
        let settings =
            Settings::resolve(None, env(&[(API_KEY_ENV, "sk-test"), (API_BASE_ENV, "sg")]))
                .unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(
            settings.api_base,
            "https://dashscope-intl.aliyuncs.com/api/v1"
        );
    }

    #[test]
    fn test_region_from_code() {
        assert_eq!(Region::from_code("cn"), Some(Region::Cn));
        assert_eq!(Region::from_code("eu"), None);
        assert_eq!(Region::default(), Region::Cn);
    }
}
