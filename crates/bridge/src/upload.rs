//! Upload client for a temporary file host.
//!
//! The trainer needs a public URL for the training archive. The archive is
//! sent as a multipart `file` field; the host answers with a page URL
//! (tmpfiles.org shape: `{"status": "success", "data": {"url": ...}}`),
//! which is rewritten into its direct-download form.

use std::path::Path;

use serde::Deserialize;

use crate::error::BridgeError;

pub const DEFAULT_UPLOAD_URL: &str = "https://tmpfiles.org/api/v1/upload";

const PROVIDER: &str = "Upload host";

/// HTTP client for the temporary file host.
pub struct TempFileHost {
    client: reqwest::Client,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    data: Option<UploadData>,
    /// Hosts that answer with a flat `{"link": ...}`.
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

impl TempFileHost {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), upload_url)
    }

    pub fn with_client(client: reqwest::Client, upload_url: impl Into<String>) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
        }
    }

    /// Upload the file at `path` and return a URL it can be downloaded from.
    pub async fn upload(&self, path: &Path) -> Result<String, BridgeError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.zip".to_string());
        let size = bytes.len();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response(PROVIDER, response).await);
        }

        let body: UploadResponse = response.json().await?;
        let page_url = body
            .data
            .map(|d| d.url)
            .or(body.link)
            .ok_or_else(|| BridgeError::MalformedResponse {
                provider: PROVIDER,
                detail: "No download URL in upload response".to_string(),
            })?;

        let url = direct_download_url(&page_url);
        tracing::info!(size, %url, "Uploaded training archive");
        Ok(url)
    }
}

/// Turn a tmpfiles.org page URL into its direct-download URL.
///
/// `http://tmpfiles.org/123/a.zip` becomes `https://tmpfiles.org/dl/123/a.zip`.
/// Only the `tmpfiles.org` host is rewritten; every other URL, and anything
/// that does not parse, is returned unchanged.
pub fn direct_download_url(page_url: &str) -> String {
    const HOST: &str = "tmpfiles.org";

    let Ok(mut url) = reqwest::Url::parse(page_url) else {
        return page_url.to_string();
    };
    if url.host_str() != Some(HOST) {
        return page_url.to_string();
    }

    if url.scheme() == "http" && url.set_scheme("https").is_err() {
        return page_url.to_string();
    }
    if !url.path().starts_with("/dl/") {
        let path = format!("/dl{}", url.path());
        url.set_path(&path);
    }
    url.to_string()
}
