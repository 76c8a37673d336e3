use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Process-level errors. Only startup and the CLI return these.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures of a single proxied request.
///
/// Each one is reported to the request that caused it and nowhere else.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unable to decode channel '{0}'")]
    BadChannelReference(String),

    #[error("Unable to find channel '{0}'")]
    UnknownChannel(String),

    #[error("Channel '{0}' does not have a stream URL assigned")]
    ChannelUnavailable(String),

    #[error("Upstream request to {url} failed: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream responded with {0}")]
    UpstreamError(StatusCode),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamError(status) => *status,
            _ => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ProxyError::UpstreamError(_) => "Upstream error".to_string(),
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
