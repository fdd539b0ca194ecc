//! Error types for rgc.
//!
//! This module provides error handling for all rgc operations. All errors
//! implement the standard Error trait and carry enough context to decide
//! whether an operation is retryable and which exit code it maps to.

use thiserror::Error;


/// Main error type for rgc operations
#[derive(Error, Debug)]
pub enum RgcError {
    /// Network-level failures (connection, timeout, DNS)
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The object store responded with a non-2xx status
    #[error("Store error (status: {status_code}): {message}")]
    Store { message: String, status_code: u16 },

    /// Missing credentials or signing preconditions
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Malformed JSON or XML in a registry or store response
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Graph inconsistencies (missing nodes, cycles)
    #[error("Graph error: {message}")]
    Graph { message: String },

    /// Configuration errors (invalid config file, missing settings)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Graph or sweep-state file unreadable or unwritable
    #[error("State error: {message}")]
    State {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for rgc operations
pub type Result<T> = std::result::Result<T, RgcError>;

impl RgcError {
    /// Creates a new transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source error.
    pub fn transport_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new store error from a server response.
    pub fn store<S: Into<String>>(message: S, status_code: u16) -> Self {
        Self::Store {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new authentication error.
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new parse error with a source error.
    pub fn parse_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new graph error.
    pub fn graph<S: Into<String>>(message: S) -> Self {
        Self::Graph {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S, path: Option<S>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, E>(message: S, path: Option<S>, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new state error.
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new state error with a source error.
    pub fn state_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::State {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether a failed store operation may be retried.
    ///
    /// Transport faults and server-side failures (5xx, 429) are transient;
    /// every other 4xx is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Store { status_code, .. } => *status_code >= 500 || *status_code == 429,
            _ => false,
        }
    }
}
