//! Document types and the uploadable file-name pattern derived from them.

use std::sync::Arc;

use regex::Regex;

use crate::api::validation::require_name;
use crate::error::{AppError, Result};
use crate::models::document_type::{CreateDocumentTypeRequest, DocumentType};
use crate::store::{DocumentTypeStore, Store};

/// Pattern fragment for one extension.
///
/// `/.../` holds a raw regex; anything else is a literal extension.
fn extension_fragment(ext: &str) -> String {
    match ext
        .strip_prefix('/')
        .and_then(|inner| inner.strip_suffix('/'))
    {
        Some(raw) if !raw.is_empty() => format!("({})", raw),
        _ => format!(r"\.{}$", regex::escape(ext)),
    }
}

/// Case-insensitive alternation of every extension, or `None` when empty.
pub fn build_pattern<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let fragments: Vec<String> = extensions.into_iter().map(extension_fragment).collect();
    if fragments.is_empty() {
        return None;
    }
    Some(format!("(?i)({})", fragments.join("|")))
}

pub struct DocumentTypeService {
    store: Arc<dyn Store>,
}

impl DocumentTypeService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, mut input: CreateDocumentTypeRequest) -> Result<DocumentType> {
        input.name = require_name(&input.name, "Name")?;
        input.ext = input.ext.trim().to_string();
        if input.ext.is_empty() {
            return Err(AppError::Validation("Extension is required".to_string()));
        }
        Regex::new(&extension_fragment(&input.ext)).map_err(|e| {
            AppError::Validation(format!("Invalid extension pattern '{}': {}", input.ext, e))
        })?;
        self.store.insert_document_type(&input).await
    }

    pub async fn list(&self) -> Result<Vec<DocumentType>> {
        self.store.list_document_types().await
    }

    pub async fn delete_all(&self) -> Result<u64> {
        let deleted = self.store.delete_all_document_types().await?;
        tracing::info!("Deleted {} document type(s)", deleted);
        Ok(deleted)
    }

    pub async fn uploadable_file_pattern(&self) -> Result<Option<String>> {
        let types = self.store.list_document_types().await?;
        Ok(build_pattern(
            types
                .iter()
                .filter(|t| t.is_uploadable)
                .map(|t| t.ext.as_str()),
        ))
    }

    pub async fn is_uploadable(&self, filename: &str) -> Result<bool> {
        let Some(pattern) = self.uploadable_file_pattern().await? else {
            return Ok(false);
        };
        let regex = Regex::new(&pattern)
            .map_err(|e| AppError::Internal(format!("Invalid upload pattern: {}", e)))?;
        Ok(regex.is_match(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn doc_type(name: &str, ext: &str, is_uploadable: bool) -> CreateDocumentTypeRequest {
        CreateDocumentTypeRequest {
            name: name.to_string(),
            ext: ext.to_string(),
            is_uploadable,
        }
    }

    async fn seeded() -> DocumentTypeService {
        let service = DocumentTypeService::new(Arc::new(MemoryStore::new()));
        service
            .create(doc_type("JPEG", r"/\.jpe?g$/", true))
            .await
            .unwrap();
        service.create(doc_type("Word", "doc", true)).await.unwrap();
        service.create(doc_type("XML", "xml", true)).await.unwrap();
        service
            .create(doc_type("Tarball", "tar.gz", true))
            .await
            .unwrap();
        service
            .create(doc_type("Executable", "exe", false))
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_uploadable_file_pattern() {
        let service = seeded().await;
        assert_eq!(
            service.uploadable_file_pattern().await.unwrap().as_deref(),
            Some(r"(?i)((\.jpe?g$)|\.doc$|\.xml$|\.tar\.gz$)")
        );
    }

    #[tokio::test]
    async fn test_is_uploadable() {
        let service = seeded().await;
        assert!(service.is_uploadable("photo.JPG").await.unwrap());
        assert!(service.is_uploadable("photo.jpeg").await.unwrap());
        assert!(service.is_uploadable("backup.tar.gz").await.unwrap());
        assert!(!service.is_uploadable("backup.tarxgz").await.unwrap());
        assert!(!service.is_uploadable("setup.exe").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_types_means_nothing_uploadable() {
        let service = seeded().await;
        assert_eq!(service.delete_all().await.unwrap(), 5);
        assert_eq!(service.uploadable_file_pattern().await.unwrap(), None);
        assert!(!service.is_uploadable("doc.doc").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_raw_pattern_rejected() {
        let service = DocumentTypeService::new(Arc::new(MemoryStore::new()));
        let err = service
            .create(doc_type("Broken", "/(unclosed/", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
