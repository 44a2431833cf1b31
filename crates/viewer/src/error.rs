/// Viewer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to apply configuration '{key}': {message}")]
    ConfigApply { key: String, message: String },

    #[error("Server error: {0}")]
    Server(String),

    #[error("Failed to parse: {0}")]
    Parse(String),
}

impl From<shared::bcf::ViewpointParseError> for ViewerError {
    fn from(e: shared::bcf::ViewpointParseError) -> Self {
        ViewerError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(e: serde_json::Error) -> Self {
        ViewerError::Parse(e.to_string())
    }
}
