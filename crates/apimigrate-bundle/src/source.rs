use crate::error::Result;
use crate::json;
use crate::xml::{self, ProxyInfo};
use crate::zip_bundle::BundleInfo;
use apimigrate_core::{FileType, ProxyFile};

/// A stored proxy file reopened for analysis.
#[derive(Debug, Clone)]
pub struct ProxySource {
    pub info: ProxyInfo,
    pub policies: Vec<String>,
    /// Text handed to the AI advisor and the bundle converter.
    pub analysis_content: String,
    bundle: Option<BundleInfo>,
    raw: String,
    file_type: FileType,
}

impl ProxySource {
    pub fn from_proxy_file(file: &ProxyFile) -> Result<Self> {
        match file.file_type {
            FileType::Zip => {
                let bundle = BundleInfo::from_stored(&file.content)?;
                Ok(Self {
                    info: bundle.proxy_info(),
                    policies: bundle.all_policies(),
                    analysis_content: bundle.analysis_content(),
                    bundle: Some(bundle),
                    raw: String::new(),
                    file_type: FileType::Zip,
                })
            }
            FileType::Json => {
                let doc = json::validate_json(&file.content)?;
                Ok(Self {
                    info: json::extract_proxy_info_from_json(&doc),
                    policies: json::extract_policies_from_json(&doc),
                    analysis_content: file.content.clone(),
                    bundle: None,
                    raw: file.content.clone(),
                    file_type: FileType::Json,
                })
            }
            FileType::Xml => Ok(Self {
                info: xml::extract_proxy_info(&file.content),
                policies: xml::extract_policies_from_xml(&file.content),
                analysis_content: file.content.clone(),
                bundle: None,
                raw: file.content.clone(),
                file_type: FileType::Xml,
            }),
        }
    }

    /// Edge source for one policy. Bundles carry a file per policy; a single
    /// XML descriptor is returned whole when it references the policy.
    pub fn policy_source(&self, policy: &str) -> Option<String> {
        match (&self.bundle, self.file_type) {
            (Some(bundle), _) => bundle.policy_source(policy).map(str::to_string),
            (None, FileType::Xml) if self.policies.iter().any(|p| p == policy) => {
                Some(self.raw.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_source_exposes_policies_and_dependencies() {
        let file = ProxyFile::new(
            "p.xml",
            r#"<APIProxy name="pets"><Policies><Policy>Quota</Policy></Policies><TargetEndpoint name="backend"/></APIProxy>"#
                .to_string(),
            FileType::Xml,
        );
        let source = ProxySource::from_proxy_file(&file).unwrap();
        assert_eq!(source.info.name, "pets");
        assert_eq!(source.policies, vec!["Quota"]);
        assert_eq!(source.info.target_servers, vec!["backend"]);
        assert!(source.policy_source("Quota").is_some());
        assert!(source.policy_source("SpikeArrest").is_none());
    }

    #[test]
    fn corrupt_bundle_record_is_an_error() {
        let file = ProxyFile::new("p.zip", "{}".to_string(), FileType::Zip);
        assert!(ProxySource::from_proxy_file(&file).is_err());
    }
}
