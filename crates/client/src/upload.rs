//! Photo upload to the storage webhook.
//!
//! Files are validated, downscaled and re-encoded, then posted as
//! multipart. The reply normally carries the public URL. For frontal
//! photos the webhook may answer with only a job id, in which case the
//! URL is polled for with `GET ?id=<id>`.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::config::{Endpoint, UploadConfig};
use crate::decode::error_field;
use crate::error::UploadError;
use crate::transport::{FilePart, MultipartForm, Progress, Request};

const SUPPORTED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Which photo is being uploaded; sent as the `type` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Frontal,
    Eye,
}

impl UploadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frontal => "extracao-frontal",
            Self::Eye => "extracao-olho",
        }
    }

    /// Only the frontal webhook answers asynchronously.
    fn may_defer_url(self) -> bool {
        matches!(self, Self::Frontal)
    }
}

/// An in-memory file ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read `path`, deriving the content type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_from_extension)
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "jpg",
        }
    }
}

pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Outcome of one upload. Batch uploads record failures here instead of
/// aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    fn failed(err: &UploadError) -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            success: false,
            message: Some(err.to_string()),
        }
    }
}

/// Per-file progress for batches: `(file_index, file_percent, total_percent)`.
pub type BatchProgress = Arc<dyn Fn(usize, u8, u8) + Send + Sync>;

/// Reject non-images, oversize files and formats outside the allow-list,
/// in that order.
pub fn validate_file(file: &UploadFile, config: &UploadConfig) -> Result<(), UploadError> {
    if !file.content_type.starts_with("image/") {
        return Err(UploadError::NotAnImage);
    }
    if file.size() > config.max_file_size {
        return Err(UploadError::TooLarge);
    }
    if !SUPPORTED_TYPES.contains(&file.content_type.as_str()) {
        return Err(UploadError::UnsupportedFormat);
    }
    Ok(())
}

/// Downscale so the longer edge is at most `max_dimension` and re-encode in
/// the original format. JPEG uses `quality`; PNG and WebP are lossless.
/// Any decode or encode failure yields the original file.
pub fn compress_image(file: &UploadFile, max_dimension: u32, quality: u8) -> UploadFile {
    match try_compress(file, max_dimension, quality) {
        Ok(bytes) => UploadFile {
            bytes,
            ..file.clone()
        },
        Err(e) => {
            tracing::warn!(file = %file.file_name, error = %e, "Compression failed, uploading original");
            file.clone()
        }
    }
}

fn try_compress(file: &UploadFile, max_dimension: u32, quality: u8) -> image::ImageResult<Vec<u8>> {
    let format = match ImageFormat::from_mime_type(&file.content_type) {
        Some(format) => format,
        None => image::guess_format(&file.bytes)?,
    };
    let mut img = image::load_from_memory_with_format(&file.bytes, format)?;

    if img.width().max(img.height()) > max_dimension {
        img = img.resize(max_dimension, max_dimension, FilterType::Triangle);
    }

    encode(&img, format, quality)
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(&img.to_rgb8())?;
        }
        other => img.write_to(&mut out, other)?,
    }
    Ok(out.into_inner())
}

/// `coloracao-<unix ms>-<13 random chars>.<ext>`.
pub fn generate_file_name(extension: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let random: String = uuid::Uuid::new_v4().simple().to_string().chars().take(13).collect();
    format!("coloracao-{timestamp}-{random}.{extension}")
}

/// The public URL in an upload reply: `image_url`, then `url`, then
/// `fileUrl`.
pub fn extract_upload_url(value: &Value) -> Option<String> {
    ["image_url", "url", "fileUrl"]
        .iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct UploadService {
    api: ApiClient,
}

impl UploadService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn config(&self) -> &UploadConfig {
        &self.api.config().upload
    }

    pub fn validate_file(&self, file: &UploadFile) -> Result<(), UploadError> {
        validate_file(file, self.config())
    }

    /// Upload one photo and return its public URL.
    pub async fn upload_file(
        &self,
        file: &UploadFile,
        kind: UploadKind,
        progress: Option<Progress>,
        cancel: &CancellationToken,
    ) -> Result<UploadResponse, UploadError> {
        let url = self.api.url(Endpoint::Upload)?;
        self.validate_file(file)?;

        let config = self.config();
        let compressed = compress_image(file, config.max_dimension, config.quality);
        let file_name = generate_file_name(compressed.extension());
        tracing::info!(
            kind = kind.as_str(),
            original_bytes = file.size(),
            compressed_bytes = compressed.size(),
            file_name = %file_name,
            "Uploading file",
        );

        let form = MultipartForm {
            file: FilePart {
                field: "file".to_string(),
                file_name: compressed.file_name.clone(),
                content_type: compressed.content_type.clone(),
                bytes: compressed.bytes,
            },
            text: vec![
                ("fileName".to_string(), file_name.clone()),
                ("type".to_string(), kind.as_str().to_string()),
            ],
        };
        let request = Request::post(url.as_str())
            .multipart(form)
            .auth(self.api.basic_auth())
            .timeout(config.request_timeout)
            .on_progress(progress.clone());

        let value = self.api.send(request, cancel).await?.into_json()?;

        let public_url = match extract_upload_url(&value) {
            Some(u) => u,
            None => match value.get("id").and_then(id_string) {
                Some(id) if kind.may_defer_url() => self.wait_for_url(&url, &id, cancel).await?,
                _ => {
                    tracing::warn!(body = %value, "Upload reply carried no URL");
                    return Err(UploadError::InvalidResponse);
                }
            },
        };

        if let Some(p) = &progress {
            p.report(100);
        }
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .unwrap_or(file_name);

        Ok(UploadResponse {
            url: public_url,
            key,
            success: true,
            message: Some("Upload realizado com sucesso".to_string()),
        })
    }

    /// Poll `GET <upload url>?id=<id>` until the reply carries `image_url`.
    async fn wait_for_url(
        &self,
        url: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let config = self.config();
        tracing::info!(job_id = id, "Upload accepted asynchronously, waiting for URL");

        for attempt in 1..=config.url_poll_max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = self.api.sleeper().sleep(config.url_poll_interval) => {}
            }

            let request = Request::get(url)
                .query("id", id)
                .auth(self.api.basic_auth())
                .timeout(config.request_timeout);
            let value = self.api.send(request, cancel).await?.into_json()?;

            if let Some(message) = error_field(&value) {
                return Err(UploadError::Network(message));
            }
            if let Some(found) = value
                .get("image_url")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            {
                tracing::info!(job_id = id, attempt, "Upload URL ready");
                return Ok(found.to_string());
            }
            tracing::debug!(job_id = id, attempt, "Upload URL not ready");
        }

        Err(UploadError::UrlNotReady)
    }

    /// Upload `files` one after another. A failed file yields an
    /// unsuccessful [`UploadResponse`] and the batch continues.
    pub async fn upload_files(
        &self,
        files: &[UploadFile],
        kind: UploadKind,
        on_progress: Option<BatchProgress>,
        cancel: &CancellationToken,
    ) -> Vec<UploadResponse> {
        let count = files.len();
        let mut results = Vec::with_capacity(count);

        for (index, file) in files.iter().enumerate() {
            let progress = on_progress.clone().map(|cb| {
                Progress::new(move |p: u8| {
                    let total = ((index as f64 + p as f64 / 100.0) / count as f64 * 100.0).round() as u8;
                    cb(index, p, total);
                })
            });

            match self.upload_file(file, kind, progress, cancel).await {
                Ok(response) => results.push(response),
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "Upload failed");
                    results.push(UploadResponse::failed(&e));
                }
            }
        }

        results
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
