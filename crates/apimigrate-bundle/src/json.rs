//! JSON proxy descriptors as exported by the Edge management API
//! (`{"name": .., "policies": [..], "proxyEndpoints": [..], "targetEndpoints": [..]}`).

use crate::error::{BundleError, Result};
use crate::xml::{push_unique, ProxyInfo, UNKNOWN_PROXY};
use serde_json::Value;

pub fn validate_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| BundleError::InvalidJson(e.to_string()))
}

fn names(value: Option<&Value>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(Value::Array(items)) = value {
        for item in items {
            let name = match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("name").and_then(Value::as_str),
                _ => None,
            };
            if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
                push_unique(&mut out, name.to_string());
            }
        }
    }
    out
}

pub fn extract_policies_from_json(doc: &Value) -> Vec<String> {
    names(doc.get("policies"))
}

pub fn extract_proxy_info_from_json(doc: &Value) -> ProxyInfo {
    let targets = names(doc.get("targetEndpoints"));
    ProxyInfo {
        name: doc
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(UNKNOWN_PROXY)
            .to_string(),
        base_paths: names(doc.get("basepaths")),
        target_servers: targets.clone(),
        endpoints: crate::xml::Endpoints {
            proxies: names(doc.get("proxyEndpoints")),
            targets,
        },
        ..ProxyInfo::default()
    }
}
