use crate::protocol::Channel;

/// Why a single event could not be applied. Never fatal to the subscription.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed {channel} payload: {source}")]
    MalformedPayload {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed nested JSON in {render} payload: {source}")]
    MalformedNested {
        render: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{render} payload is missing `{field}`")]
    MissingField { render: String, field: &'static str },

    #[error("invalid `{field}` in {render} payload: {reason}")]
    InvalidField {
        render: String,
        field: &'static str,
        reason: String,
    },

    #[error("no action registered under {0:?}")]
    UnknownAction(String),
}

/// Failure of the push subscription itself.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("subscription rejected: HTTP {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("subscription rejected: unexpected content type {0:?}")]
    BadContentType(String),

    #[error("stream task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl StreamError {
    /// Whether the subscription must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::BadStatus(_) | Self::BadContentType(_) | Self::Task(_) => true,
            Self::Http(e) => e.is_builder(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "environment {env:?} has no fixed host; set an origin (--origin or REFLEXIVE_ORIGIN)"
    )]
    MissingOrigin { env: String },

    #[error("invalid configuration: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}
