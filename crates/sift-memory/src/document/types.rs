use std::path::Path;

/// Raw uploaded content plus its identity. Decoding to text happens at ingest time.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Build a document whose content type is inferred from the extension of `source`.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>, bytes: Vec<u8>) -> Self {
        let source = source.into();
        let content_type = content_type_for(&source).to_owned();
        Self {
            id: id.into(),
            source,
            content_type,
            bytes,
        }
    }

    /// Plain-text document, mostly useful for programmatic ingestion and tests.
    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source: id.clone(),
            id,
            content_type: "text/plain".to_owned(),
            bytes: text.into().into_bytes(),
        }
    }

    /// Lowercase file extension of the source, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.source)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

fn content_type_for(source: &str) -> &'static str {
    let ext = Path::new(source)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Stable chunk identifier derived from the owning document and the chunk position.
#[must_use]
pub fn chunk_id(document_id: &str, ordinal: usize) -> String {
    format!("{document_id}#{ordinal}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: usize,
    pub text: String,
    pub source: String,
}
