use std::future::Future;
use std::pin::Pin;

use super::DocumentLoader;
use crate::document::{Document, DocumentError};

/// UTF-8 text and Markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn extract<'a>(
        &'a self,
        document: &'a Document,
    ) -> Pin<Box<dyn Future<Output = Result<String, DocumentError>> + Send + 'a>> {
        Box::pin(async move {
            let text = std::str::from_utf8(&document.bytes).map_err(|e| {
                DocumentError::UnsupportedFormat(format!(
                    "{} is not valid UTF-8: {e}",
                    document.source
                ))
            })?;
            Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_owned())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_utf8_and_strips_bom() {
        let doc = Document::new("a.txt", "a.txt", "\u{feff}héllo".as_bytes().to_vec());
        assert_eq!(TextLoader.extract(&doc).await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn invalid_utf8_is_unsupported() {
        let doc = Document::new("a.txt", "a.txt", vec![0xff, 0xfe, 0x00]);
        assert!(matches!(
            TextLoader.extract(&doc).await,
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn supported_extensions_list() {
        let exts = TextLoader.supported_extensions();
        assert!(exts.contains(&"txt"));
        assert!(exts.contains(&"md"));
        assert!(exts.contains(&"markdown"));
    }
}
