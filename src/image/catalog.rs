//! Model catalog and size presets.

use serde::Serialize;

/// Model used when none is requested or the requested one is unknown.
pub const DEFAULT_MODEL: &str = "qwen-image-plus";

/// Size used when none is requested.
pub const DEFAULT_SIZE: &str = "1024*1024";

/// Models served by the ImageSynthesis (task-based, flat prompt) API.
pub const SYNTHESIS_MODELS: &[&str] = &["qwen-image-plus"];

/// Models served by the ImageGeneration (messages-based) API.
pub const GENERATION_MODELS: &[&str] = &[
    "wan2.6-t2i",
    "wan2.5-t2i-preview",
    "wan2.2-t2i-flash",
    "wan2.2-t2i-plus",
    "wanx2.1-t2i-turbo",
    "wanx2.1-t2i-plus",
    "wanx2.0-t2i-turbo",
];

const SYNTHESIS_SIZES: &[(&str, &str)] = &[
    ("16:9", "1664*928"),
    ("9:16", "928*1664"),
    ("1:1", "1024*1024"),
    ("4:3", "1216*912"),
    ("3:4", "912*1216"),
];

const GENERATION_SIZES: &[(&str, &str)] = &[
    ("1:1", "1024*1024"),
    ("1:1-large", "1280*1280"),
    ("16:9", "1280*720"),
    ("9:16", "720*1280"),
    ("4:3", "1200*900"),
    ("3:4", "900*1200"),
    ("2:1", "1440*720"),
];

/// The upstream API shape a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Qwen-Image: flat `prompt` input, results under `output.results`.
    Synthesis,
    /// Wan series: chat-style `messages` input, results under `output.choices`.
    Generation,
}

impl ModelFamily {
    /// Looks up the family of a known model.
    pub fn of(model: &str) -> Option<Self> {
        if SYNTHESIS_MODELS.contains(&model) {
            Some(Self::Synthesis)
        } else if GENERATION_MODELS.contains(&model) {
            Some(Self::Generation)
        } else {
            None
        }
    }

    /// Returns the vendor API name, for display.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Synthesis => "ImageSynthesis",
            Self::Generation => "ImageGeneration",
        }
    }

    /// Returns the human-readable series name.
    pub fn series(&self) -> &'static str {
        match self {
            Self::Synthesis => "Qwen-Image (text rendering)",
            Self::Generation => "Wan Series (photorealistic)",
        }
    }

    /// Returns the models belonging to this family.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Self::Synthesis => SYNTHESIS_MODELS,
            Self::Generation => GENERATION_MODELS,
        }
    }

    /// Returns the size presets as `(ratio, pixels)` pairs.
    pub fn size_presets(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Synthesis => SYNTHESIS_SIZES,
            Self::Generation => GENERATION_SIZES,
        }
    }

    /// Looks up a preset by its ratio token.
    pub fn preset(&self, token: &str) -> Option<&'static str> {
        self.size_presets()
            .iter()
            .find(|(key, _)| *key == token)
            .map(|(_, size)| *size)
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Returns true if `model` is in either family.
pub fn is_known_model(model: &str) -> bool {
    ModelFamily::of(model).is_some()
}

/// A model name checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Model that will be used.
    pub name: String,
    /// Its family.
    pub family: ModelFamily,
    /// The unknown name that was replaced by the default, if any.
    pub replaced: Option<String>,
}

/// Validates `model`, falling back to [`DEFAULT_MODEL`] when it is unknown.
pub fn resolve_model(model: &str) -> ResolvedModel {
    match ModelFamily::of(model) {
        Some(family) => ResolvedModel {
            name: model.to_string(),
            family,
            replaced: None,
        },
        None => ResolvedModel {
            name: DEFAULT_MODEL.to_string(),
            family: ModelFamily::Synthesis,
            replaced: Some(model.to_string()),
        },
    }
}

/// Maps a ratio token or explicit dimensions to the size string the API expects.
///
/// Unknown models use the Wan presets. Inputs that are neither a preset nor
/// `W*H`/`WxH` are passed through for the API to validate.
pub fn resolve_size(input: Option<&str>, model: &str) -> String {
    let input = match input {
        Some(s) if !s.is_empty() => s,
        _ => return DEFAULT_SIZE.to_string(),
    };

    let family = ModelFamily::of(model).unwrap_or(ModelFamily::Generation);
    if let Some(size) = family.preset(input) {
        return size.to_string();
    }

    if input.contains('*') || input.contains('x') {
        return input.replace('x', "*");
    }

    input.to_string()
}
