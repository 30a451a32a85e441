// ============================================================================
// EDIT SERVICE — multipart request to the image-edit endpoint
// ============================================================================
//
// One POST per submission: `image` and `mask` PNGs plus the prompt and
// sizing fields. The response lists candidates either as embedded base64
// PNGs or as URLs to fetch. No retries; callers decide what a failure means.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use reqwest::blocking::Client as HttpClient;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{EditError, Result};
use crate::io::{decode_image, load_image};
use crate::settings::EditorSettings;

/// Prompt used when the user leaves the prompt box empty.
pub const FILL_PROMPT: &str = "Fill in the image in the same style";

/// Suffix nudging the service to match the surrounding image.
pub const STYLE_SUFFIX: &str = " in the same style";

pub const RESPONSE_FORMAT: &str = "b64_json";

/// Turn the user's prompt into the text actually sent.
pub fn shape_prompt(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        FILL_PROMPT.to_string()
    } else {
        format!("{trimmed}{STYLE_SUFFIX}")
    }
}

/// Everything one submission sends.
#[derive(Clone, Debug)]
pub struct EditRequest {
    pub image_png: Vec<u8>,
    pub mask_png: Vec<u8>,
    pub prompt: String,
    /// e.g. `1024x1024`
    pub size: String,
    /// Requested candidate count.
    pub n: u32,
    pub response_format: String,
}

/// One candidate as listed in the response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditCandidate {
    /// Decoded base64 image bytes.
    Encoded(Vec<u8>),
    /// Image to download.
    Remote(String),
}

#[derive(Deserialize)]
struct EditResponse {
    data: Vec<EditDatum>,
}

#[derive(Deserialize)]
struct EditDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Parse a successful response body into candidates.
pub fn parse_edit_response(body: &str) -> Result<Vec<EditCandidate>> {
    let response: EditResponse = serde_json::from_str(body)
        .map_err(|e| EditError::MalformedResponse(e.to_string()))?;

    response
        .data
        .into_iter()
        .enumerate()
        .map(|(i, datum)| match (datum.b64_json, datum.url) {
            (Some(b64), _) => {
                // Tolerate data URIs as well as bare payloads
                let payload = match b64.split_once(";base64,") {
                    Some((_, rest)) => rest,
                    None => b64.as_str(),
                };
                Ok(EditCandidate::Encoded(BASE64.decode(payload.trim())?))
            }
            (None, Some(url)) => Ok(EditCandidate::Remote(url)),
            (None, None) => Err(EditError::MalformedResponse(format!(
                "result {i} has neither b64_json nor url"
            ))),
        })
        .collect()
}

/// Best-effort human message from an error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

/// Something that can turn an edit request into candidate images.
pub trait EditService: Send + Sync {
    fn request_edit(&self, request: &EditRequest) -> Result<Vec<RgbaImage>>;
}

// ============================================================================
// HTTP SERVICE
// ============================================================================

pub struct HttpEditService {
    client: HttpClient,
    endpoint: String,
    api_key: String,
}

impl HttpEditService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from settings, reading the bearer token from the configured
    /// environment variable.
    pub fn from_settings(settings: &EditorSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EditError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(
            settings.api_endpoint.clone(),
            api_key,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn fetch_candidate(&self, candidate: EditCandidate) -> Result<RgbaImage> {
        match candidate {
            EditCandidate::Encoded(bytes) => decode_image(&bytes),
            EditCandidate::Remote(url) => {
                let bytes = self.client.get(&url).send()?.error_for_status()?.bytes()?;
                decode_image(&bytes)
            }
        }
    }
}

impl EditService for HttpEditService {
    fn request_edit(&self, request: &EditRequest) -> Result<Vec<RgbaImage>> {
        let form = Form::new()
            .part(
                "image",
                Part::bytes(request.image_png.clone())
                    .file_name("image.png")
                    .mime_str("image/png")?,
            )
            .part(
                "mask",
                Part::bytes(request.mask_png.clone())
                    .file_name("mask.png")
                    .mime_str("image/png")?,
            )
            .text("prompt", request.prompt.clone())
            .text("size", request.size.clone())
            .text("n", request.n.to_string())
            .text("response_format", request.response_format.clone());

        log_info!(
            "POST {} (n={}, size={}, prompt={:?})",
            self.endpoint,
            request.n,
            request.size,
            request.prompt
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(EditError::Service {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_edit_response(&body)?
            .into_iter()
            .map(|c| self.fetch_candidate(c))
            .collect()
    }
}

// ============================================================================
// MOCK SERVICE — canned candidates, no network
// ============================================================================

/// Returns the same fixture images for every request.
pub struct MockEditService {
    fixtures: Vec<RgbaImage>,
    calls: AtomicUsize,
}

impl MockEditService {
    pub fn new(fixtures: Vec<RgbaImage>) -> Self {
        Self {
            fixtures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Load every image in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut fixtures = Vec::new();
        for path in paths {
            match load_image(&path) {
                Ok(img) => fixtures.push(img),
                Err(e) => log_warn!("Skipping mock fixture {}: {}", path.display(), e),
            }
        }
        Ok(Self::new(fixtures))
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EditService for MockEditService {
    fn request_edit(&self, _request: &EditRequest) -> Result<Vec<RgbaImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fixtures.clone())
    }
}
