use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// =============================================================================
// Upload config (figment-deserialized from defaults / TOML file / env vars)
// =============================================================================
//
//   asset-upload.toml:  file_path = "MAC"
//   env var:            ASSET_UPLOAD_TOKEN=...   (CDN_TOKEN is also honored)
//
// CLI flags override all of these.

pub const DEFAULT_API_URL: &str =
    "https://ig.gov-cloud.ai/mobius-content-service/v1.0/content/upload";
pub const DEFAULT_CDN_BASE: &str = "https://cdn.gov-cloud.ai";
pub const DEFAULT_FILE_PATH: &str = "MAC";
pub const DEFAULT_LOG_FILE: &str = "log.txt";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bearer token. Uploads fail per file when it is absent.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Prefix joined with the `cdnUrl` returned by the API.
    #[serde(default = "default_cdn_base")]
    pub cdn_base: String,
    /// Remote folder passed as the `filePath` query parameter.
    #[serde(default = "default_file_path")]
    pub file_path: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Directory the assets are read from.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            cdn_base: default_cdn_base(),
            file_path: default_file_path(),
            log_file: default_log_file(),
            asset_dir: default_asset_dir(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_cdn_base() -> String {
    DEFAULT_CDN_BASE.to_string()
}
fn default_file_path() -> String {
    DEFAULT_FILE_PATH.to_string()
}
fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}
fn default_asset_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Build a figment that layers: defaults → TOML file → `CDN_TOKEN` →
/// `ASSET_UPLOAD_*` env vars.
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(UploadConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Env::raw().only(&["CDN_TOKEN"]).map(|_| "token".into()))
        .merge(Env::prefixed("ASSET_UPLOAD_").split("__"))
}

impl UploadConfig {
    /// Token, if set and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Public URL for an uploaded asset.
    pub fn public_url(&self, cdn_url: &str) -> String {
        format!("{}{}", self.cdn_base, cdn_url)
    }
}
