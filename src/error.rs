use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config parse error: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A single source descriptor is unusable. Callers skip it and carry on.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("wiki query failed: {0}")]
    BackendQuery(String),

    #[error("wiki login failed: {0}")]
    Login(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;
