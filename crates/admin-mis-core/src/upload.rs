//! Uploaded files.

/// A file received in a `multipart/form-data` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The original filename as provided by the client.
    pub name: String,
    /// The MIME content type of the file.
    pub content_type: String,
    /// The raw file content.
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// The lowercased extension of the filename, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_and_size() {
        let file = UploadedFile::new("Report.PDF", "application/pdf", vec![1, 2, 3]);
        assert_eq!(file.extension().as_deref(), Some("pdf"));
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn test_no_extension() {
        let file = UploadedFile::new("README", "text/plain", Vec::new());
        assert_eq!(file.extension(), None);
    }
}
