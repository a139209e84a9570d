use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// The engine rejected the diagram content, including the retry with
    /// cleaned content.
    #[error("diagram import failed: {0}")]
    Import(String),
}
