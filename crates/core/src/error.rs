#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown output kind: '{0}'")]
    UnknownOutputKind(String),

    #[error("Unknown job status: '{0}'")]
    UnknownStatus(String),
}
