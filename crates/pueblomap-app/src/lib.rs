//! PuebloMap Application
//!
//! Command-line shell around the editor core: loads configuration and
//! elements, replays recorded input and reports what was saved.

pub mod replay;
pub mod session;
mod shortcuts;

pub use replay::{ReplayReport, run_session};
pub use session::{Command, Session, Step, Surface};
pub use shortcuts::{Shortcut, ShortcutRegistry};

use pueblomap_core::{ConfigError, GatewayError, LayerError, SourceError};
use std::path::PathBuf;
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed file {path}: {source}")]
    Session {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Failed to load elements: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}
