//! Error types for cataract-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<opencv::Error> for ScanError {
    fn from(err: opencv::Error) -> Self {
        ScanError::OpenCv(err.message)
    }
}
