#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("document {0} contains no text")]
    EmptyDocument(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),
}
