#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("unrecognized layer type: {0}")]
    UnrecognizedLayerType(String),
    #[error("layer at index {index} has no type")]
    MissingLayerType { index: usize },
    #[error("invalid map context: {0}")]
    Json(#[from] serde_json::Error),
}
