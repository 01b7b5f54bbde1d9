use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

impl AnalysisError {
    /// Errors caused by the caller rather than by a provider or the model.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AnalysisError::InvalidInput(_))
    }
}
