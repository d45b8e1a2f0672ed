//! lectern-upload: the client-side upload pipeline.
//!
//! Flow per [`Uploader::submit`] call: validate kind and size, transcode
//! images when a resize target or quality is given, POST the bytes as a
//! `multipart/form-data` `file` field, and return the `url` from the JSON
//! response envelope. Each call is an independent future; concurrent
//! uploads do not affect each other, and dropping the future aborts the
//! in-flight request - that is the whole cancellation story.

pub mod error;
pub mod transcode;

use bytes::Bytes;
use mime_sniffer::MimeTypeSniffer;
use serde::Deserialize;
use tracing::{debug, warn};

pub use error::UploadError;
pub use transcode::{DEFAULT_JPEG_QUALITY, fit_within, transcode_image};

/// Default byte ceiling: 10 MiB.
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Upload endpoint configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Endpoint accepting `POST` with a multipart `file` field.
    pub endpoint: String,
    /// Byte ceiling checked before any network call.
    pub max_bytes: usize,
}

impl UploadConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Fit the image inside this box before uploading.
    pub resize_to: Option<(u32, u32)>,
    /// JPEG quality for re-encoding (default 80).
    pub quality: Option<u8>,
}

/// A file selected by the user.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub bytes: Bytes,
    /// Declared MIME type; sniffed from magic bytes when absent.
    pub mime: Option<String>,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Effective MIME type: declared, else sniffed, else octet-stream.
    pub fn mime(&self) -> String {
        if let Some(mime) = &self.mime {
            return mime.clone();
        }
        self.bytes
            .as_ref()
            .sniff_mime_type()
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

/// Transient preview for a pending upload.
///
/// Shown by the host while the upload is in flight; never persisted into
/// the document.
pub fn preview_data_url(bytes: &[u8], mime: &str) -> String {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Success envelope returned by the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

/// The upload client.
pub struct Uploader {
    client: reqwest::Client,
    config: UploadConfig,
}

impl Uploader {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Use a preconfigured client (proxies, custom timeouts, test stubs).
    pub fn with_client(client: reqwest::Client, config: UploadConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload one file and return the committed URL.
    ///
    /// Validation happens before any network traffic. Transport failures
    /// are never retried here; the caller decides whether to re-trigger.
    pub async fn submit(
        &self,
        payload: FilePayload,
        options: &UploadOptions,
    ) -> Result<String, UploadError> {
        let mime = payload.mime();
        let family = mime.split('/').next().unwrap_or("");
        if family != "image" && family != "video" {
            warn!(%mime, "rejecting upload: unsupported kind");
            return Err(UploadError::InvalidFileKind { mime });
        }
        if payload.bytes.len() > self.config.max_bytes {
            warn!(
                size = payload.bytes.len(),
                max = self.config.max_bytes,
                "rejecting upload: over byte ceiling"
            );
            return Err(UploadError::FileTooLarge {
                size: payload.bytes.len(),
                max: self.config.max_bytes,
            });
        }

        let transcode_wanted =
            family == "image" && (options.resize_to.is_some() || options.quality.is_some());
        let (body, mime, file_name) = if transcode_wanted {
            let quality = options.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            let encoded =
                transcode::transcode_image(&payload.bytes, &mime, options.resize_to, quality)?;
            (encoded, "image/jpeg".to_string(), jpeg_name(&payload.name))
        } else {
            (payload.bytes.to_vec(), mime, payload.name.clone())
        };

        debug!(
            endpoint = %self.config.endpoint,
            size = body.len(),
            %mime,
            "posting upload"
        );
        let part = reqwest::multipart::Part::bytes(body)
            .file_name(file_name)
            .mime_str(&mime)
            .map_err(|err| UploadError::transport_from("invalid mime type", err))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| UploadError::transport_from("request failed", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::transport(format!("server returned {status}")));
        }

        let envelope: UploadResponse = response
            .json()
            .await
            .map_err(|err| UploadError::transport_from("unreadable response body", err))?;
        match envelope.url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(UploadError::transport("response missing url")),
        }
    }
}

/// The upload name after JPEG re-encode.
fn jpeg_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{name}.jpg"),
    }
}
