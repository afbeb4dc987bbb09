use crate::error::{BundleError, Result};
use crate::json;
use crate::xml;
use crate::zip_bundle::{self, BundleInfo};
use apimigrate_core::{FileType, ProxyFile, UploadLimits};
use tracing::{info, warn};

/// A validated proxy upload, ready to be stored.
#[derive(Debug, Clone)]
pub enum ProxyUpload {
    Text { file_type: FileType, content: String },
    Bundle(Box<BundleInfo>),
}

pub fn classify(filename: &str) -> Option<FileType> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        Some(FileType::Zip)
    } else if lower.ends_with(".xml") {
        Some(FileType::Xml)
    } else if lower.ends_with(".json") {
        Some(FileType::Json)
    } else {
        None
    }
}

fn limit_mb(bytes: usize) -> usize {
    bytes / (1024 * 1024)
}

impl ProxyUpload {
    /// Size is checked before the file name so oversized uploads always
    /// report 413.
    pub fn parse(filename: &str, bytes: &[u8], limits: &UploadLimits) -> Result<Self> {
        if bytes.len() > limits.max_proxy_bytes {
            return Err(BundleError::TooLarge {
                limit_mb: limit_mb(limits.max_proxy_bytes),
            });
        }

        let file_type = classify(filename).ok_or(BundleError::UnsupportedFormat)?;
        match file_type {
            FileType::Zip => {
                let bundle = zip_bundle::extract_bundle(bytes, limits.max_bundle_uncompressed_bytes)?;
                if bundle.main_config.is_none() {
                    return Err(BundleError::MissingApiProxy);
                }
                if bundle.policies.is_empty() && bundle.extracted_policies.is_empty() {
                    warn!("ZIP bundle does not contain policies directory - this may be a simple proxy");
                }
                info!(
                    "Extracted bundle {} with {} files",
                    filename,
                    bundle.bundle_structure.len()
                );
                Ok(ProxyUpload::Bundle(Box::new(bundle)))
            }
            FileType::Xml | FileType::Json => {
                let content =
                    String::from_utf8(bytes.to_vec()).map_err(|_| BundleError::InvalidEncoding)?;
                if file_type == FileType::Xml {
                    xml::validate_xml(&content)?;
                } else {
                    json::validate_json(&content)?;
                }
                Ok(ProxyUpload::Text { file_type, content })
            }
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            ProxyUpload::Text { file_type, .. } => *file_type,
            ProxyUpload::Bundle(_) => FileType::Zip,
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            ProxyUpload::Text { .. } => "Proxy file uploaded successfully",
            ProxyUpload::Bundle(_) => "ZIP proxy bundle uploaded and extracted successfully",
        }
    }

    pub fn into_proxy_file(self, filename: impl Into<String>) -> ProxyFile {
        let file_type = self.file_type();
        let content = match self {
            ProxyUpload::Text { content, .. } => content,
            ProxyUpload::Bundle(bundle) => bundle.to_stored(),
        };
        ProxyFile::new(filename, content, file_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> UploadLimits {
        UploadLimits {
            max_proxy_bytes: 64,
            ..UploadLimits::default()
        }
    }

    #[test]
    fn classification_ignores_case() {
        assert_eq!(classify("Proxy.ZIP"), Some(FileType::Zip));
        assert_eq!(classify("a.Xml"), Some(FileType::Xml));
        assert_eq!(classify("b.json"), Some(FileType::Json));
        assert_eq!(classify("c.yaml"), None);
    }

    #[test]
    fn oversized_upload_wins_over_bad_suffix() {
        let err = ProxyUpload::parse("notes.txt", &[b'x'; 65], &limits()).unwrap_err();
        assert_eq!(err, BundleError::TooLarge { limit_mb: 0 });
        assert_eq!(
            ProxyUpload::parse("notes.txt", b"x", &limits()).unwrap_err(),
            BundleError::UnsupportedFormat
        );
    }

    #[test]
    fn text_uploads_are_validated() {
        assert_eq!(
            ProxyUpload::parse("p.xml", &[0xff, 0xfe], &limits()).unwrap_err(),
            BundleError::InvalidEncoding
        );
        assert!(matches!(
            ProxyUpload::parse("p.xml", b"<APIProxy>", &limits()),
            Err(BundleError::InvalidXml(_))
        ));
        assert!(matches!(
            ProxyUpload::parse("p.json", b"{nope", &limits()),
            Err(BundleError::InvalidJson(_))
        ));

        let upload = ProxyUpload::parse("p.xml", b"<APIProxy name=\"a\"/>", &limits()).unwrap();
        assert_eq!(upload.success_message(), "Proxy file uploaded successfully");
        let file = upload.into_proxy_file("p.xml");
        assert_eq!(file.file_type, FileType::Xml);
        assert_eq!(file.content, "<APIProxy name=\"a\"/>");
    }
}
