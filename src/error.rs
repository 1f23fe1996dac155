use thiserror::Error;

/// Failures a single cleaning stage can report. The pipeline records them
/// against the stage and carries on; none of them aborts a run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("column '{0}' not present")]
    MissingColumn(String),
    #[error("{0}")]
    Computation(String),
    #[error("no table loaded")]
    NoTable,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StageError {
    /// Human-readable reason including the full context chain for I/O errors.
    pub fn reason(&self) -> String {
        match self {
            StageError::Io(err) => format!("{err:#}"),
            other => other.to_string(),
        }
    }
}
