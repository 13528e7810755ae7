//! Error types for the Vemetric SDK.

/// Errors that can occur when using the Vemetric SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// `init` ran outside a Tokio runtime, so background sends have nowhere to go.
    #[error("No Tokio runtime: {0}")]
    Runtime(String),

    /// A tracking call was made before `init` succeeded.
    #[error("Vemetric is not initialized yet")]
    NotInitialized,

    /// Client has been shutdown.
    #[error("Client has been shutdown")]
    Shutdown,

    /// The collector answered with a non-2xx status, or no response arrived at all.
    #[error("Transport error ({}): {status_text}", status_label(.status))]
    Transport {
        /// HTTP status, absent on network-level failures.
        status: Option<u16>,
        /// Reason phrase or network error description.
        status_text: String,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status carried by a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether this error came from the network layer of a confirmable send.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no response".into(),
    }
}
