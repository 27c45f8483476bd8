//! Errors raised while loading launcher settings.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid aiota.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render aiota.toml: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("unsupported store scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid store URI: {0}")]
    InvalidUri(String),

    #[error("invalid duration {value:?} for {field}")]
    InvalidDuration { field: &'static str, value: String },
}
