use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Thread already running")]
    AlreadyRunning,
    #[error("Render plan refused: {0}")]
    InvalidPlan(String),
    #[error("Nothing to send")]
    NothingToSend,
    #[error("Unable to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid json in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("No config directory on this system")]
    NoConfigDir,
    #[error(transparent)]
    DeltaGen(#[from] deltagen::DeltaGenError),
}
