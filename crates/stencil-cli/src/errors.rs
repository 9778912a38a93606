//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;

use stencil::StencilError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to read options file {path}: {source}")]
    ReadOptions { path: PathBuf, source: io::Error },
    #[error("invalid options file {path}: {source}")]
    ParseOptions {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("constraint '{0}' must have the form NAME=CONSTRAINT")]
    InvalidConstraint(String),
    #[error("cannot detect the language of {path}; pass --language")]
    UndetectedLanguage { path: PathBuf },
    #[error(transparent)]
    Compile(#[from] StencilError),
    #[error("failed to read {path}: {source}")]
    ReadSource { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteSource { path: PathBuf, source: io::Error },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
