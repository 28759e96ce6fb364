use std::future::Future;
use std::pin::Pin;

use super::DocumentLoader;
use crate::document::{Document, DocumentError};

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn extract<'a>(
        &'a self,
        document: &'a Document,
    ) -> Pin<Box<dyn Future<Output = Result<String, DocumentError>> + Send + 'a>> {
        Box::pin(async move {
            let bytes = document.bytes.clone();
            let source = document.source.clone();
            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
                    DocumentError::UnsupportedFormat(format!("{source}: unreadable PDF: {e}"))
                })
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))?
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
