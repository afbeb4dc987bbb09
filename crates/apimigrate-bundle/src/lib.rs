pub mod error;
pub mod json;
pub mod source;
pub mod swagger;
pub mod upload;
pub mod xml;
pub mod zip_bundle;

pub use error::{BundleError, Result};
pub use source::ProxySource;
pub use swagger::{fallback_conversion, parse_spec, ParsedSpec};
pub use upload::ProxyUpload;
pub use xml::{extract_policies_from_xml, extract_proxy_info, Endpoints, ProxyInfo, ResourceRef};
pub use zip_bundle::{extract_bundle, BundleInfo};
