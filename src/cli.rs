//! Command-line front end: argument definitions and the generate/list flow.

use crate::config::{Region, Settings, API_BASE_ENV, API_KEY_ENV, MODEL_ENV};
use crate::error::ImagenError;
use crate::image::catalog::{ModelFamily, DEFAULT_MODEL, DEFAULT_SIZE};
use crate::image::{
    human_size, resolve_model, resolve_size, DashScopeProvider, GenerationRequest, ImageProvider,
};
use clap::{CommandFactory, Parser};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Output path used when none is given.
pub const DEFAULT_OUTPUT: &str = "./generated-image.png";

const EXAMPLES: &str = "\
Examples:
  imagenty \"A cute cat\"
  imagenty --model wan2.6-t2i \"Mountain landscape photo\" ./landscape.png
  imagenty --size 16:9 \"Widescreen wallpaper\" ./wallpaper.png
  imagenty --list-models

Environment:
  DASHSCOPE_API_KEY   API key (required)
  DASHSCOPE_MODEL     Default model
  DASHSCOPE_API_BASE  Region code (cn, sg, us) or endpoint URL";

#[derive(Debug, Parser)]
#[command(name = "imagenty")]
#[command(about = "Generate images using Alibaba Cloud Bailian (DashScope) API")]
#[command(version, after_help = EXAMPLES)]
pub struct Cli {
    /// Text description of the image
    pub prompt: Option<String>,

    /// Output file path
    #[arg(default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Model to use (default: qwen-image-plus)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Image size as ratio (e.g. 16:9) or pixels (e.g. 1024*1024)
    #[arg(short, long)]
    pub size: Option<String>,

    /// Negative prompt
    #[arg(short, long)]
    pub negative: Option<String>,

    /// List available models, size presets and endpoints
    #[arg(long)]
    pub list_models: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Timeout for the generation call, in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,
}

/// Runs the CLI and returns the process exit status.
///
/// `lookup` reads environment variables. Progress and results go to `out`,
/// warnings and errors to `err`.
pub async fn run<F, O, E>(cli: Cli, lookup: F, out: &mut O, err: &mut E) -> u8
where
    F: Fn(&str) -> Option<String>,
    O: Write,
    E: Write,
{
    if cli.list_models {
        return match list_models(cli.json, out) {
            Ok(()) => 0,
            Err(e) => {
                report_error(&e, err);
                1
            }
        };
    }

    if cli.prompt.as_deref().map_or(true, str::is_empty) {
        let _ = Cli::command().write_help(err);
        return 1;
    }

    match generate(&cli, &lookup, out, err).await {
        Ok(()) => 0,
        Err(e) => {
            report_error(&e, err);
            1
        }
    }
}

async fn generate<F, O, E>(
    cli: &Cli,
    lookup: &F,
    out: &mut O,
    err: &mut E,
) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
    O: Write,
    E: Write,
{
    let prompt = cli.prompt.as_deref().unwrap_or_default();
    let settings = Settings::resolve(cli.model.as_deref(), lookup)?;

    let model = resolve_model(&settings.model);
    if let Some(unknown) = &model.replaced {
        writeln!(err, "Warning: Unknown model '{unknown}'. Using {DEFAULT_MODEL}")?;
    }
    let size = resolve_size(cli.size.as_deref(), &model.name);

    let provider = DashScopeProvider::builder()
        .api_key(settings.api_key)
        .base_url(settings.api_base)
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;

    let mut request = GenerationRequest::new(prompt)
        .with_model(&model.name)
        .with_size(&size);
    if let Some(negative) = &cli.negative {
        request = request.with_negative_prompt(negative);
    }

    if !cli.json {
        writeln!(out, "Generating image...")?;
        writeln!(out, "Prompt: \"{prompt}\"")?;
        writeln!(out, "Model: {} ({})", model.name, model.family)?;
        writeln!(out, "Size: {size}")?;
        writeln!(out, "Endpoint: {}", provider.endpoint())?;
        writeln!(out, "Output: {}", cli.output.display())?;
        writeln!(out)?;
    }

    let image = provider.generate(&request).await?;
    let written = image.save(&cli.output)?;

    if cli.json {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": cli.output.display().to_string(),
            "size_bytes": written,
            "model": image.metadata.model,
            "family": image.family,
            "provider": provider.name(),
            "size": size,
            "endpoint": provider.endpoint(),
            "request_id": image.metadata.request_id,
            "duration_ms": image.metadata.duration_ms,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        writeln!(out, "Success! Image generated and saved.")?;
        writeln!(out, "File: {}", cli.output.display())?;
        writeln!(out, "Size: {}", human_size(written))?;
    }

    Ok(())
}

fn list_models<O: Write>(json_output: bool, out: &mut O) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct FamilyInfo {
        family: ModelFamily,
        api: &'static str,
        series: &'static str,
        models: &'static [&'static str],
        size_presets: Vec<SizePreset>,
    }

    #[derive(serde::Serialize)]
    struct SizePreset {
        ratio: &'static str,
        size: &'static str,
    }

    #[derive(serde::Serialize)]
    struct EndpointInfo {
        region: &'static str,
        url: &'static str,
        default: bool,
    }

    let families: Vec<FamilyInfo> = [ModelFamily::Synthesis, ModelFamily::Generation]
        .into_iter()
        .map(|family| FamilyInfo {
            family,
            api: family.api_name(),
            series: family.series(),
            models: family.models(),
            size_presets: family
                .size_presets()
                .iter()
                .map(|&(ratio, size)| SizePreset { ratio, size })
                .collect(),
        })
        .collect();

    let endpoints: Vec<EndpointInfo> = Region::ALL
        .into_iter()
        .map(|region| EndpointInfo {
            region: region.code(),
            url: region.base_url(),
            default: region == Region::default(),
        })
        .collect();

    if json_output {
        let catalog = serde_json::json!({
            "default_model": DEFAULT_MODEL,
            "default_size": DEFAULT_SIZE,
            "families": families,
            "endpoints": endpoints,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&catalog)?)?;
        return Ok(());
    }

    writeln!(out, "Available models:")?;
    for info in &families {
        writeln!(out, "\n{} [{} API]:", info.series, info.api)?;
        let mut models = info.models.to_vec();
        models.sort_unstable();
        for model in models {
            let marker = if model == DEFAULT_MODEL { " (default)" } else { "" };
            writeln!(out, "  - {model}{marker}")?;
        }
    }

    writeln!(out, "\nSize presets:")?;
    for info in &families {
        let keys: Vec<&str> = info.size_presets.iter().map(|p| p.ratio).collect();
        writeln!(out, "  {}: {}", info.series, keys.join(", "))?;
    }

    writeln!(out, "\nAPI endpoints:")?;
    for endpoint in &endpoints {
        let marker = if endpoint.default { " (default)" } else { "" };
        writeln!(out, "  - {}: {}{marker}", endpoint.region, endpoint.url)?;
    }

    Ok(())
}

fn report_error<E: Write>(e: &anyhow::Error, err: &mut E) {
    let _ = match e.downcast_ref::<ImagenError>() {
        Some(ImagenError::MissingCredential(_)) => writeln!(
            err,
            "Error: {API_KEY_ENV} environment variable not set\n\
             \n\
             To set it:\n\
             \x20 Windows (PowerShell): $env:{API_KEY_ENV} = 'your-key'\n\
             \x20 Windows (CMD): set {API_KEY_ENV}=your-key\n\
             \x20 macOS/Linux: export {API_KEY_ENV}='your-key'\n\
             \n\
             Optional: {MODEL_ENV} (default model), {API_BASE_ENV} (cn, sg, us or a URL)\n\
             \n\
             Get an API key at: https://bailian.console.aliyun.com/"
        ),
        Some(ImagenError::UpstreamStatus {
            status,
            code,
            message,
        }) => {
            let mut text = format!("Error: API returned {status}");
            if let Some(code) = code {
                text.push_str(&format!("\nCode: {code}"));
            }
            if let Some(message) = message {
                text.push_str(&format!("\nMessage: {message}"));
            }
            writeln!(err, "{text}")
        }
        Some(ImagenError::NoImageProduced { response }) => writeln!(
            err,
            "Error: No image URL in response\nResponse: {}",
            serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string())
        ),
        Some(other) => writeln!(err, "Error: {other}"),
        None => writeln!(err, "Error: {e:#}"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["imagenty", "A cute cat"]).unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("A cute cat"));
        assert_eq!(cli.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(cli.model.is_none());
        assert!(cli.size.is_none());
        assert!(cli.negative.is_none());
        assert!(!cli.list_models);
        assert_eq!(cli.timeout, 120);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "imagenty",
            "-m",
            "wan2.6-t2i",
            "-s",
            "16:9",
            "-n",
            "blurry",
            "Mountains",
            "out.png",
        ])
        .unwrap();
        assert_eq!(cli.model.as_deref(), Some("wan2.6-t2i"));
        assert_eq!(cli.size.as_deref(), Some("16:9"));
        assert_eq!(cli.negative.as_deref(), Some("blurry"));
        assert_eq!(cli.prompt.as_deref(), Some("Mountains"));
        assert_eq!(cli.output, PathBuf::from("out.png"));
    }

    #[test]
    fn test_list_models_text() {
        let mut out = Vec::new();
        list_models(false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("  - qwen-image-plus (default)"));
        assert!(text.contains("  - wan2.6-t2i"));
        assert!(text.contains("1:1-large"));
        assert!(text.contains("  - cn: https://dashscope.aliyuncs.com/api/v1 (default)"));
        assert!(text.contains("  - sg: https://dashscope-intl.aliyuncs.com/api/v1"));
    }

    #[test]
    fn test_list_models_json() {
        let mut out = Vec::new();
        list_models(true, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["default_model"], DEFAULT_MODEL);
        assert_eq!(value["families"][0]["family"], "synthesis");
        assert_eq!(value["families"][1]["api"], "ImageGeneration");
        assert_eq!(value["families"][1]["models"].as_array().unwrap().len(), 7);
        assert_eq!(value["endpoints"][0]["default"], true);
    }

    #[test]
    fn test_report_upstream_status() {
        let e = anyhow::Error::new(ImagenError::UpstreamStatus {
            status: "400".into(),
            code: Some("InvalidParameter".into()),
            message: Some("bad size".into()),
        });
        let mut err = Vec::new();
        report_error(&e, &mut err);
        let text = String::from_utf8(err).unwrap();

        assert_eq!(
            text,
            "Error: API returned 400\nCode: InvalidParameter\nMessage: bad size\n"
        );
    }
}
