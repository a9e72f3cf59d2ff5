use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown {kind}: {name}")]
    UnknownReference { kind: String, name: String },

    #[error("Request for {resource} failed with status {status}: {body}")]
    Transport {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("Invalid {resource} record: {message}")]
    InvalidRecord { resource: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl SyncError {
    pub fn unknown(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownReference {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
