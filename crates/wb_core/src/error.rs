use thiserror::Error;

/// Errors from the fallible edges of the core (setup parsing, role codes).
///
/// Stepping itself never fails; see `MotionEngine::step`.
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown role code: {0}")]
    UnknownRole(String),

    #[error("Play setup has no roles")]
    EmptyRoster,
}

pub type Result<T> = std::result::Result<T, PlayError>;
