use std::path::PathBuf;
use thiserror::Error;

use crate::uberizer::UberizePhase;

#[derive(Error, Debug)]
pub enum UberizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON configuration error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Archive error in {}: {source}", archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Invalid class file {path}: {reason}")]
    InvalidClass { path: String, reason: String },
    #[error("XML error in {path}: {reason}")]
    Xml { path: String, reason: String },
    #[error("Manifest error: {0}")]
    Manifest(String),
    #[error("Bad output file name resolution: {0}")]
    UnsafePath(String),
    #[error("Assembly failed while {phase}: {source}")]
    AssemblyFailed {
        phase: UberizePhase,
        #[source]
        source: Box<UberizeError>,
    },
}

impl UberizeError {
    pub fn config(message: impl Into<String>) -> Self {
        UberizeError::Config(message.into())
    }

    /// True for errors raised before any archive was touched.
    pub fn is_config(&self) -> bool {
        matches!(self, UberizeError::Config(_) | UberizeError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, UberizeError>;
