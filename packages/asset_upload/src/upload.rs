//! Multipart upload of build assets to the content service.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::UploadConfig;

/// A build artifact the uploader knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    IndexHtml,
    ScriptJs,
}

impl Asset {
    /// Upload order when no single asset is selected.
    pub const ALL: [Asset; 2] = [Asset::IndexHtml, Asset::ScriptJs];

    pub fn file_name(&self) -> &'static str {
        match self {
            Asset::IndexHtml => "index.html",
            Asset::ScriptJs => "script.js",
        }
    }

    /// Value of the `contentTags` query parameter.
    pub fn content_tag(&self) -> &'static str {
        match self {
            Asset::IndexHtml => "html",
            Asset::ScriptJs => "js",
        }
    }

    /// `js` or `html` selects one asset; anything else selects all of them.
    pub fn select(arg: Option<&str>) -> Vec<Asset> {
        match arg {
            Some(tag) => match Self::ALL.into_iter().find(|a| a.content_tag() == tag) {
                Some(asset) => vec![asset],
                None => Self::ALL.to_vec(),
            },
            None => Self::ALL.to_vec(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Failure talking to the content service.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP {} - {}", .0.as_u16(), .0.canonical_reason().unwrap_or_default())]
    Status(StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no upload token configured (set ASSET_UPLOAD_TOKEN or CDN_TOKEN)")]
    MissingToken,

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] TransferError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Path of the asset on the CDN, relative to the CDN base.
    pub cdn_url: String,
}

pub struct Uploader {
    client: reqwest::Client,
    api_url: String,
    file_path: String,
    token: Option<String>,
}

impl Uploader {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            file_path: config.file_path.clone(),
            token: config.token().map(str::to_string),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Upload `asset` read from `dir`.
    pub async fn upload(&self, asset: Asset, dir: &Path) -> Result<UploadResponse, UploadError> {
        let token = self.token.as_deref().ok_or(UploadError::MissingToken)?;
        let path = dir.join(asset.file_name());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.clone(),
                source,
            })?;
        debug!(file = %asset, size = bytes.len(), "uploading");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(asset.file_name()));
        Ok(self.send(token, asset, form).await?)
    }

    async fn send(
        &self,
        token: &str,
        asset: Asset,
        form: Form,
    ) -> Result<UploadResponse, TransferError> {
        let resp = self
            .client
            .post(&self.api_url)
            .query(&[
                ("filePath", self.file_path.as_str()),
                ("contentTags", asset.content_tag()),
            ])
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TransferError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}
