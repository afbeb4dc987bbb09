//! Policy and endpoint discovery in Apigee Edge XML descriptors.

use crate::error::{BundleError, Result};
use roxmltree::{Document, Node, ParsingOptions};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

pub const UNKNOWN_PROXY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResourceRef {
    pub path: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
pub struct Endpoints {
    pub proxies: Vec<String>,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProxyInfo {
    pub name: String,
    pub base_paths: Vec<String>,
    pub virtual_hosts: Vec<String>,
    pub target_servers: Vec<String>,
    pub resources: Vec<ResourceRef>,
    pub endpoints: Endpoints,
}

impl Default for ProxyInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN_PROXY.to_string(),
            base_paths: Vec::new(),
            virtual_hosts: Vec::new(),
            target_servers: Vec::new(),
            resources: Vec::new(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Edge exports may carry a `<!DOCTYPE>`.
fn parse(xml: &str) -> std::result::Result<Document<'_>, roxmltree::Error> {
    Document::parse_with_options(
        xml,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )
}

pub fn validate_xml(xml: &str) -> Result<()> {
    parse(xml)
        .map(|_| ())
        .map_err(|e| BundleError::InvalidXml(e.to_string()))
}

/// Tag of the document element, i.e. the policy type of a policy file.
pub fn root_tag(xml: &str) -> Option<String> {
    parse(xml)
        .ok()
        .map(|doc| doc.root_element().tag_name().name().to_string())
}

fn named<'a, 'input>(node: Node<'a, 'input>, tag: &'static str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

fn trimmed_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub(crate) fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// Policy names referenced by a proxy descriptor: the `<Policies>` manifest
/// under the root plus every `<Step><Name>` in any flow. Malformed XML
/// yields no policies.
pub fn extract_policies_from_xml(xml: &str) -> Vec<String> {
    let doc = match parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("XML parsing error: {}", e);
            return Vec::new();
        }
    };
    let root = doc.root_element();
    let mut policies = Vec::new();

    for manifest in named(root, "Policies") {
        for policy in named(manifest, "Policy") {
            if let Some(name) = trimmed_text(policy) {
                push_unique(&mut policies, name);
            }
        }
    }

    for step in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Step")
    {
        for name in named(step, "Name") {
            if let Some(name) = trimmed_text(name) {
                push_unique(&mut policies, name);
            }
        }
    }

    policies
}

pub fn extract_proxy_info(xml: &str) -> ProxyInfo {
    let doc = match parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("XML parsing error: {}", e);
            return ProxyInfo::default();
        }
    };
    let root = doc.root_element();
    let mut info = ProxyInfo {
        name: root
            .attribute("name")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(UNKNOWN_PROXY)
            .to_string(),
        ..ProxyInfo::default()
    };

    for node in root.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "VirtualHost" => {
                if let Some(v) = trimmed_text(node) {
                    push_unique(&mut info.virtual_hosts, v);
                }
            }
            "BasePath" => {
                if let Some(v) = trimmed_text(node) {
                    push_unique(&mut info.base_paths, v);
                }
            }
            // <TargetEndpoint name="x"> in endpoint files, <TargetEndpoint>x</TargetEndpoint>
            // in the apiproxy.xml manifest
            "TargetEndpoint" => {
                let name = node
                    .attribute("name")
                    .map(str::to_string)
                    .or_else(|| trimmed_text(node));
                if let Some(name) = name {
                    push_unique(&mut info.target_servers, name);
                }
            }
            _ => {}
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<APIProxy name="weather-api" revision="3">
  <BasePaths>/v1/weather</BasePaths>
  <Policies>
    <Policy>Verify-API-Key</Policy>
    <Policy>Quota</Policy>
  </Policies>
  <ProxyEndpoint name="default">
    <PreFlow name="PreFlow">
      <Request>
        <Step><Name>Verify-API-Key</Name></Step>
        <Step><Name> SpikeArrest </Name></Step>
      </Request>
    </PreFlow>
    <Flows>
      <Flow name="forecast">
        <Request><Step><Name>JavaScript</Name></Step></Request>
      </Flow>
    </Flows>
    <PostFlow><Response><Step><Name></Name></Step></Response></PostFlow>
    <HTTPProxyConnection>
      <BasePath>/v1/weather</BasePath>
      <VirtualHost>default</VirtualHost>
      <VirtualHost>secure</VirtualHost>
    </HTTPProxyConnection>
  </ProxyEndpoint>
  <TargetEndpoint name="backend"/>
</APIProxy>"#;

    #[test]
    fn collects_manifest_and_step_policies_once() {
        let policies = extract_policies_from_xml(PROXY);
        assert_eq!(
            policies,
            vec!["Verify-API-Key", "Quota", "SpikeArrest", "JavaScript"]
        );
    }

    #[test]
    fn malformed_xml_has_no_policies() {
        assert!(extract_policies_from_xml("<APIProxy><Policies>").is_empty());
        assert_eq!(extract_proxy_info("not xml").name, UNKNOWN_PROXY);
    }

    #[test]
    fn proxy_info_reads_name_hosts_and_targets() {
        let info = extract_proxy_info(PROXY);
        assert_eq!(info.name, "weather-api");
        assert_eq!(info.virtual_hosts, vec!["default", "secure"]);
        assert_eq!(info.base_paths, vec!["/v1/weather"]);
        assert_eq!(info.target_servers, vec!["backend"]);
    }

    #[test]
    fn manifest_target_endpoint_text_is_a_target() {
        let xml = "<APIProxy><TargetEndpoints><TargetEndpoint>default</TargetEndpoint></TargetEndpoints></APIProxy>";
        let info = extract_proxy_info(xml);
        assert_eq!(info.name, UNKNOWN_PROXY);
        assert_eq!(info.target_servers, vec!["default"]);
    }

    #[test]
    fn root_tag_is_policy_type() {
        assert_eq!(
            root_tag(r#"<Quota async="false" name="Q-1"><Allow count="10"/></Quota>"#).as_deref(),
            Some("Quota")
        );
        assert_eq!(root_tag("<<"), None);
    }

    #[test]
    fn doctype_declarations_are_accepted() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE APIProxy [
  <!ENTITY org "acme">
]>
<APIProxy name="legacy-&org;">
  <Policies><Policy>Quota</Policy></Policies>
</APIProxy>"#;
        assert!(validate_xml(xml).is_ok());
        assert_eq!(extract_policies_from_xml(xml), vec!["Quota"]);
        assert_eq!(extract_proxy_info(xml).name, "legacy-acme");
        assert_eq!(root_tag(xml).as_deref(), Some("APIProxy"));
    }
}
