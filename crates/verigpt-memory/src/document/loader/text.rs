use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata};
use super::CorpusEntry;

/// Reads a corpus file as UTF-8 text. Invalid UTF-8 surfaces as an I/O error
/// of kind `InvalidData`.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load<'a>(
        &'a self,
        entry: &'a CorpusEntry,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, DocumentError>> + Send + 'a>>
    {
        let max_size = self.max_file_size;
        Box::pin(async move {
            let meta = tokio::fs::metadata(&entry.abs_path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let content = tokio::fs::read_to_string(&entry.abs_path).await?;

            Ok(Document {
                metadata: DocumentMetadata {
                    path: entry.path.clone(),
                    extension: entry.extension.clone(),
                    size: content.len() as u64,
                },
                content,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn entry_for(dir: &Path, name: &str) -> CorpusEntry {
        let abs_path = dir.join(name);
        let size = std::fs::metadata(&abs_path).map(|m| m.len()).unwrap_or(0);
        CorpusEntry {
            path: name.to_owned(),
            abs_path,
            extension: "sv".into(),
            size,
        }
    }

    #[tokio::test]
    async fn load_sv_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alu.sv"), "module alu; endmodule\n").unwrap();

        let doc = TextLoader::default()
            .load(&entry_for(dir.path(), "alu.sv"))
            .await
            .unwrap();
        assert_eq!(doc.content, "module alu; endmodule\n");
        assert_eq!(doc.metadata.path, "alu.sv");
        assert_eq!(doc.metadata.extension, "sv");
        assert_eq!(doc.metadata.size, 22);
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.sv"), "x".repeat(64)).unwrap();

        let loader = TextLoader { max_file_size: 10 };
        let err = loader
            .load(&entry_for(dir.path(), "big.sv"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::FileTooLarge(64)));
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.sv"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = TextLoader::default()
            .load(&entry_for(dir.path(), "bad.sv"))
            .await
            .unwrap_err();
        let DocumentError::Io(io) = err else {
            panic!("expected io error, got {err:?}");
        };
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TextLoader::default()
            .load(&entry_for(dir.path(), "gone.sv"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }
}
