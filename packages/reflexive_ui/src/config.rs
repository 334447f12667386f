use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stream::DEFAULT_RETRY;

// =============================================================================
// Client config (figment-deserialized from defaults / TOML file / env vars)
// =============================================================================
//
//   reflexive.toml:  env = "staging"
//   env var:         REFLEXIVE_ENV=staging
//
// CLI flags override both.

/// Base URL for the `dev` environment.
pub const DEV_BASE_URL: &str = "http://localhost:8080";
/// Base URL for the `staging` environment.
pub const STAGING_BASE_URL: &str = "https://ui-framework-node-api.gov-cloud.ai";
/// Subscription path appended to the base URL.
pub const SSE_PATH: &str = "/api/reflexiveUI/sse";

/// Runtime environment selecting the push server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    /// Anything else, including no value: subscribe relative to the page origin.
    Other(String),
}

impl Environment {
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("dev") => Self::Dev,
            Some("staging") => Self::Staging,
            other => Self::Other(other.unwrap_or_default().to_string()),
        }
    }

    /// Fixed base URL, or `None` when the page origin applies.
    pub fn base_url(&self) -> Option<&'static str> {
        match self {
            Self::Dev => Some(DEV_BASE_URL),
            Self::Staging => Some(STAGING_BASE_URL),
            Self::Other(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Other(name) => name,
        }
    }
}

/// Tunables as they appear in the TOML file and environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default)]
    pub env: Option<String>,
    /// Page origin used when the environment has no fixed host.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default = "default_sse_path")]
    pub sse_path: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            env: None,
            origin: None,
            sse_path: default_sse_path(),
            channel_capacity: default_channel_capacity(),
            retry_ms: default_retry_ms(),
        }
    }
}

fn default_sse_path() -> String {
    SSE_PATH.to_string()
}
fn default_channel_capacity() -> usize {
    256
}
fn default_retry_ms() -> u64 {
    DEFAULT_RETRY.as_millis() as u64
}

/// Build a figment that layers: defaults → TOML file → `REFLEXIVE_*` env vars.
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(ClientFileConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("REFLEXIVE_").split("__"))
}

/// Resolved client configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub environment: Environment,
    pub origin: Option<String>,
    pub sse_path: String,
    pub channel_capacity: usize,
    pub retry: Duration,
}

impl ClientConfig {
    pub fn from_file(fc: &ClientFileConfig) -> Self {
        Self {
            environment: Environment::from_name(fc.env.as_deref()),
            origin: fc.origin.clone().filter(|o| !o.is_empty()),
            sse_path: fc.sse_path.clone(),
            channel_capacity: fc.channel_capacity.max(1),
            retry: Duration::from_millis(fc.retry_ms),
        }
    }

    /// Extract and resolve in one step.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let fc: ClientFileConfig = load_config(config_file).extract()?;
        Ok(Self::from_file(&fc))
    }

    /// Base URL the subscription path is appended to.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        if let Some(base) = self.environment.base_url() {
            return Ok(base.to_string());
        }
        match &self.origin {
            Some(origin) => Ok(origin.trim_end_matches('/').to_string()),
            None => Err(ConfigError::MissingOrigin {
                env: self.environment.name().to_string(),
            }),
        }
    }

    /// `{base}{sse_path}`.
    pub fn subscription_url(&self) -> Result<String, ConfigError> {
        Ok(format!("{}{}", self.base_url()?, self.sse_path))
    }
}
