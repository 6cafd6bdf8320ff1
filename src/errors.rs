use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Install error: {0}")]
    Install(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Interrupted by user")]
    Interrupted,
}

impl AppError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AppError::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
