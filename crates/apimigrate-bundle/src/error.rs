use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("Unsupported file format. Please upload XML, JSON, or ZIP files only.")]
    UnsupportedFormat,

    #[error("File size exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: usize },

    #[error("File must be valid UTF-8 encoded text")]
    InvalidEncoding,

    #[error("Invalid XML format")]
    InvalidXml(String),

    #[error("Invalid JSON format")]
    InvalidJson(String),

    #[error("Invalid ZIP bundle: {0}")]
    InvalidZip(String),

    #[error("ZIP bundle must contain apiproxy.xml file")]
    MissingApiProxy,

    #[error("Only JSON and YAML files are supported")]
    UnsupportedSpecFormat,

    #[error("Invalid JSON/YAML format")]
    InvalidSpec(String),

    #[error("Not a valid Swagger/OpenAPI specification")]
    NotOpenApi,

    #[error("Stored proxy content is corrupt: {0}")]
    CorruptStoredBundle(String),
}

impl BundleError {
    pub fn is_too_large(&self) -> bool {
        matches!(self, BundleError::TooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, BundleError>;
