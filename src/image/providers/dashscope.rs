//! Alibaba Cloud Bailian (DashScope) image generation provider.
//!
//! Qwen-Image models go through the task-based ImageSynthesis endpoint, Wan
//! models through the synchronous ImageGeneration endpoint. The request shape
//! and the location of the image URL in the response differ per family.

use crate::config::{
    resolve_api_base, API_BASE_ENV, API_KEY_ENV, DEFAULT_TIMEOUT, DOWNLOAD_TIMEOUT,
};
use crate::error::{ImagenError, Result};
use crate::image::catalog::ModelFamily;
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const SYNTHESIS_PATH: &str = "services/aigc/text2image/image-synthesis";
const GENERATION_PATH: &str = "services/aigc/multimodal-generation/generation";
const TASKS_PATH: &str = "tasks";

impl ModelFamily {
    fn endpoint_path(&self) -> &'static str {
        match self {
            Self::Synthesis => SYNTHESIS_PATH,
            Self::Generation => GENERATION_PATH,
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> Result<Value> {
        let body = match self {
            Self::Synthesis => serde_json::to_value(SynthesisRequest::from_request(request))?,
            Self::Generation => {
                serde_json::to_value(GenerationApiRequest::from_request(request))?
            }
        };
        Ok(body)
    }

    /// Finds the generated image URL in a raw response of this family.
    ///
    /// Returns `None` when any level of the expected nesting is absent.
    pub fn extract_image_url(&self, response: &Value) -> Option<String> {
        match self {
            Self::Synthesis => {
                let rsp = SynthesisResponse::deserialize(response).ok()?;
                rsp.output?.results?.into_iter().next()?.url
            }
            Self::Generation => {
                let rsp = GenerationResponse::deserialize(response).ok()?;
                let choice = rsp.output?.choices?.into_iter().next()?;
                let content = choice.message?.content?;
                content
                    .iter()
                    .find_map(|item| item.get("image"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }
        }
    }
}

/// Builder for DashScopeProvider.
#[derive(Debug, Clone)]
pub struct DashScopeProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
    download_timeout: Duration,
    poll_interval: Duration,
}

impl Default for DashScopeProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl DashScopeProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DASHSCOPE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base, as a region code (`cn`, `sg`, `us`) or a URL.
    /// Falls back to `DASHSCOPE_API_BASE`, then the China region.
    pub fn base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Sets the bound on the generation call, including task polling.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the bound on the image download.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Sets the polling interval for task-based generation.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builds the provider, resolving the API key and endpoint.
    pub fn build(self) -> Result<DashScopeProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ImagenError::MissingCredential(format!(
                    "{API_KEY_ENV} not set and no API key provided"
                ))
            })?;

        let base_url = match self.base_url {
            Some(base) => resolve_api_base(Some(&base)),
            None => resolve_api_base(std::env::var(API_BASE_ENV).ok().as_deref()),
        };

        Ok(DashScopeProvider {
            client: reqwest::Client::builder().timeout(self.timeout).build()?,
            download_client: reqwest::Client::builder()
                .timeout(self.download_timeout)
                .build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        })
    }
}

/// DashScope image generation provider.
pub struct DashScopeProvider {
    client: reqwest::Client,
    download_client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl DashScopeProvider {
    /// Creates a new `DashScopeProviderBuilder`.
    pub fn builder() -> DashScopeProviderBuilder {
        DashScopeProviderBuilder::new()
    }

    /// Sends the request to the endpoint of the model's family and returns
    /// the raw response. For task-based models this waits for the task.
    pub async fn dispatch(&self, request: &GenerationRequest) -> Result<Value> {
        let family = request.family()?;
        let deadline = Instant::now() + self.timeout;
        let url = format!("{}/{}", self.base_url, family.endpoint_path());
        let body = family.request_body(request)?;

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if family == ModelFamily::Synthesis {
            builder = builder.header("X-DashScope-Async", "enable");
        }

        tracing::debug!(
            model = %request.model,
            family = %family,
            url = %url,
            "submitting generation request"
        );
        let raw = read_json(builder.send().await?).await?;

        match family {
            ModelFamily::Synthesis => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::time::timeout(remaining, self.wait_for_task(raw))
                    .await
                    .map_err(|_| ImagenError::Timeout(self.timeout))?
            }
            ModelFamily::Generation => Ok(raw),
        }
    }

    /// Polls an ImageSynthesis task until it reaches a terminal status.
    ///
    /// Unbounded on its own; `dispatch` caps it at the generation timeout.
    async fn wait_for_task(&self, submitted: Value) -> Result<Value> {
        let output = TaskResponse::deserialize(&submitted)
            .ok()
            .and_then(|t| t.output);
        let task_id = match output {
            // Already finished (or not a task at all): let the extractor decide.
            Some(output) if output.results.is_some() => return Ok(submitted),
            Some(TaskOutput {
                task_id: Some(id), ..
            }) => id,
            _ => return Ok(submitted),
        };

        let url = format!("{}/{}/{}", self.base_url, TASKS_PATH, task_id);
        let start = Instant::now();

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let raw = read_json(response).await?;

            let output = TaskResponse::deserialize(&raw)
                .ok()
                .and_then(|t| t.output)
                .unwrap_or_default();
            let status = output.task_status.as_deref().unwrap_or("UNKNOWN");

            match status {
                "SUCCEEDED" => return Ok(raw),
                "PENDING" | "RUNNING" => {
                    tracing::debug!(
                        task_id = %task_id,
                        status = %status,
                        elapsed_secs = start.elapsed().as_secs(),
                        "polling image synthesis task"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(ImagenError::UpstreamStatus {
                        status: other.to_string(),
                        code: output.code,
                        message: output.message,
                    });
                }
            }
        }
    }

    /// Downloads the image at `url`. Single attempt, bounded by the download
    /// timeout.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| ImagenError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 403 || status.as_u16() == 410 {
                return Err(ImagenError::UrlExpired);
            }
            return Err(ImagenError::Download(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImagenError::Download(e.to_string()))?;
        tracing::debug!(url = %url, bytes = bytes.len(), "downloaded image");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageProvider for DashScopeProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let family = request.family()?;

        let raw = self.dispatch(request).await?;
        let request_id = raw
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(url) = family.extract_image_url(&raw) else {
            return Err(ImagenError::NoImageProduced { response: raw });
        };
        tracing::debug!(url = %url, "generation complete");

        let data = self.download(&url).await?;

        Ok(GeneratedImage::new(
            data,
            family,
            GenerationMetadata {
                model: Some(request.model.clone()),
                request_id,
                source_url: Some(url),
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        ))
    }

    fn name(&self) -> &str {
        "DashScope (Alibaba Cloud Bailian)"
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// Reads a JSON body, mapping non-success statuses to `UpstreamStatus`.
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(parse_error(status.as_u16(), &text));
    }
    Ok(serde_json::from_str(&text)?)
}

fn parse_error(status: u16, text: &str) -> ImagenError {
    let body = serde_json::from_str::<ApiErrorResponse>(text).unwrap_or_default();
    let message = body
        .message
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()));
    ImagenError::UpstreamStatus {
        status: status.to_string(),
        code: body.code,
        message,
    }
}

// Request types
#[derive(Debug, Serialize)]
struct Parameters {
    n: u32,
    size: String,
    prompt_extend: bool,
    watermark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
}

impl Parameters {
    fn new(size: &str) -> Self {
        Self {
            n: 1,
            size: size.to_string(),
            prompt_extend: true,
            watermark: false,
            negative_prompt: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest {
    model: String,
    input: SynthesisInput,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct SynthesisInput {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
}

impl SynthesisRequest {
    fn from_request(req: &GenerationRequest) -> Self {
        Self {
            model: req.model.clone(),
            input: SynthesisInput {
                prompt: req.prompt.clone(),
                negative_prompt: req.negative_prompt.clone(),
            },
            parameters: Parameters::new(&req.size),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationApiRequest {
    model: String,
    input: GenerationInput,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct GenerationInput {
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    text: String,
}

impl GenerationApiRequest {
    fn from_request(req: &GenerationRequest) -> Self {
        Self {
            model: req.model.clone(),
            input: GenerationInput {
                messages: vec![Message {
                    role: "user".to_string(),
                    content: vec![TextBlock {
                        text: req.prompt.clone(),
                    }],
                }],
            },
            parameters: Parameters {
                negative_prompt: req.negative_prompt.clone(),
                ..Parameters::new(&req.size)
            },
        }
    }
}

// Response types
#[derive(Debug, Default, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    #[serde(default)]
    output: Option<TaskOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    output: Option<SynthesisOutput>,
}

#[derive(Debug, Deserialize)]
struct SynthesisOutput {
    #[serde(default)]
    results: Option<Vec<SynthesisResult>>,
}

#[derive(Debug, Deserialize)]
struct SynthesisResult {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    output: Option<GenerationOutput>,
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Vec<Value>>,
}
