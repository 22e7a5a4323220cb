/// Structural problems found while turning a raw job payload into a
/// [`Job`](crate::job::Job).
///
/// Each variant names the first problem encountered; validation stops
/// there.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Please provide input")]
    MissingInput,

    #[error("Missing '{0}' parameter")]
    Missing(&'static str),

    #[error("Invalid JSON format in input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Shape(String),
}
