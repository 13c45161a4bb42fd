use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Report error: {message}")]
    Report { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AppError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON error with the file it came from.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AppError::Json {
            path: path.into(),
            source,
        }
    }
}

/// LLM backend errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("No valid response after {attempts} attempts: {message}")]
    ExhaustedRetries { attempts: u32, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    /// Whether the failure is worth retrying (rate limit, connection, read timeout).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Connection { .. } | LlmError::Timeout { .. }
        )
    }
}

/// Tree store errors
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Node not found: {identifier}")]
    NodeNotFound { identifier: String },

    #[error("Duplicate node identifier: {identifier}")]
    DuplicateIdentifier { identifier: String },

    #[error("Tree already has a root: {identifier}")]
    RootExists { identifier: String },

    #[error("Tree has no root")]
    NoRoot,

    #[error("Invalid tree document: {message}")]
    InvalidDocument { message: String },
}

/// Shape errors raised while reducing LLM output to canonical records
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("No description key among {keys:?}")]
    MissingDescription { keys: Vec<String> },

    #[error("No title key among {keys:?}")]
    MissingTitle { keys: Vec<String> },

    #[error("Unsupported shape: {found}")]
    UnsupportedShape { found: String },
}

/// Resource list errors
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("No key '{key}' found among {keys:?}")]
    MissingKey { key: String, keys: Vec<String> },

    #[error("Nested lookup of '{key}' exceeded depth {depth}")]
    DepthExceeded { key: String, depth: usize },

    #[error("Resource not found: {id}")]
    NotFound { id: u64 },

    #[error("Duplicate chain loops back to resource {id}")]
    DupCycle { id: u64 },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Result type alias for normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Result type alias for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;
