use thiserror::Error;

/// Errors surfaced by the spectrogram pipeline.
///
/// `InvalidInput` is the only variant raised before a pipeline starts; every
/// other variant is produced while a pipeline runs and ends up as the message
/// of a task in the `error` state.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Enhancement failed: {0}")]
    Enhancement(String),

    #[error("Accelerated device failure: {0}")]
    Accelerator(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No async runtime: {0}")]
    Runtime(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpectrogramError>;
