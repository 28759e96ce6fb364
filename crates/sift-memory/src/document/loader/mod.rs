#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError};

pub trait DocumentLoader: Send + Sync {
    /// Decode the raw bytes of `document` into text.
    fn extract<'a>(
        &'a self,
        document: &'a Document,
    ) -> Pin<Box<dyn Future<Output = Result<String, DocumentError>> + Send + 'a>>;

    fn supported_extensions(&self) -> &[&str];
}

fn loaders() -> Vec<Box<dyn DocumentLoader>> {
    let mut loaders: Vec<Box<dyn DocumentLoader>> = Vec::with_capacity(2);
    loaders.push(Box::new(TextLoader));
    #[cfg(feature = "pdf")]
    loaders.push(Box::new(PdfLoader));
    loaders
}

/// Read a file into a [`Document`], using the file name as the ID unless `id` is given.
///
/// # Errors
///
/// Returns [`DocumentError::FileTooLarge`] above `max_file_size` (defaults to
/// [`DEFAULT_MAX_FILE_SIZE`]) or an IO error if the file cannot be read.
pub async fn read_document(
    path: &Path,
    id: Option<String>,
    max_file_size: Option<u64>,
) -> Result<Document, DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE) {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }

    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let bytes = tokio::fs::read(&path).await?;

    Ok(Document::new(id.unwrap_or(file_name), path.display().to_string(), bytes))
}

/// Decode a document to text with the loader registered for its extension.
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedFormat`] when no loader handles the extension
/// or decoding fails, and [`DocumentError::EmptyDocument`] when the text is blank.
pub async fn extract_text(document: &Document) -> Result<String, DocumentError> {
    let ext = document.extension().unwrap_or_else(|| {
        if document.content_type.starts_with("text/") {
            "txt".to_owned()
        } else {
            String::new()
        }
    });

    let loaders = loaders();
    let loader = loaders
        .iter()
        .find(|l| l.supported_extensions().contains(&ext.as_str()))
        .ok_or_else(|| {
            DocumentError::UnsupportedFormat(format!(
                "{}: no loader for extension {ext:?}",
                document.source
            ))
        })?;

    let text = loader.extract(document).await?;
    if text.trim().is_empty() {
        return Err(DocumentError::EmptyDocument(document.id.clone()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_document_defaults_id_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.txt");
        std::fs::write(&file, "Returns within 30 days.").unwrap();

        let doc = read_document(&file, None, None).await.unwrap();
        assert_eq!(doc.id, "policy.txt");
        assert_eq!(doc.content_type, "text/plain");
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(doc.source, canonical.display().to_string());
    }

    #[tokio::test]
    async fn read_document_honors_explicit_id() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "# A").unwrap();
        let doc = read_document(&file, Some("handbook".into()), None)
            .await
            .unwrap();
        assert_eq!(doc.id, "handbook");
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "xx").unwrap();
        let result = read_document(&file, None, Some(1)).await;
        assert!(matches!(result, Err(DocumentError::FileTooLarge(2))));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let result = read_document(Path::new("/nonexistent/file.txt"), None, None).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported() {
        let doc = Document::new("x", "sheet.xlsx", b"PK\x03\x04".to_vec());
        assert!(matches!(
            extract_text(&doc).await,
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn whitespace_only_is_empty_document() {
        let doc = Document::new("blank.txt", "blank.txt", b"  \n\t ".to_vec());
        assert!(matches!(
            extract_text(&doc).await,
            Err(DocumentError::EmptyDocument(id)) if id == "blank.txt"
        ));
    }

    #[tokio::test]
    async fn text_without_extension_uses_text_loader() {
        let doc = Document::text("faq", "Shipping takes 3 days.");
        assert_eq!(extract_text(&doc).await.unwrap(), "Shipping takes 3 days.");
    }

    #[cfg(not(feature = "pdf"))]
    #[tokio::test]
    async fn pdf_without_feature_is_unsupported() {
        let doc = Document::new("r.pdf", "r.pdf", b"%PDF-1.4".to_vec());
        assert!(matches!(
            extract_text(&doc).await,
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }
}
