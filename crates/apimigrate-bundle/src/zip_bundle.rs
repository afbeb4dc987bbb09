//! In-memory extraction of zipped `apiproxy/` bundles.

use crate::error::{BundleError, Result};
use crate::xml::{self, push_unique, ProxyInfo, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

pub const BINARY_PLACEHOLDER: &str = "[Binary File]";

const MAIN_CONFIG: &str = "apiproxy/apiproxy.xml";
const POLICIES_DIR: &str = "apiproxy/policies";
const PROXIES_DIR: &str = "apiproxy/proxies";
const TARGETS_DIR: &str = "apiproxy/targets";
const RESOURCE_DIRS: [&str; 3] = [
    "apiproxy/resources/jsc/",
    "apiproxy/resources/py/",
    "apiproxy/resources/java/",
];

/// Extracted contents of a proxy bundle. Stored verbatim (as JSON tagged
/// `"type": "zip_bundle"`) in the proxy file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename = "zip_bundle")]
pub struct BundleInfo {
    pub main_config: Option<String>,
    #[serde(default)]
    pub policies: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    #[serde(default)]
    pub proxies: BTreeMap<String, String>,
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
    #[serde(default)]
    pub bundle_structure: Vec<String>,
    #[serde(default)]
    pub extracted_policies: Vec<String>,
}

struct Entry {
    path: String,
    data: Vec<u8>,
}

impl Entry {
    fn text(&self) -> Option<String> {
        String::from_utf8(self.data.clone()).ok()
    }

    fn lossy_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    fn parent(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

fn xml_stem(entry: &Entry) -> Option<&str> {
    entry.file_name().strip_suffix(".xml")
}

fn read_entries(bytes: &[u8], max_uncompressed: u64) -> Result<Vec<Entry>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| BundleError::InvalidZip(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut total: u64 = 0;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| BundleError::InvalidZip(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let Some(path) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("Skipping ZIP entry with unsafe path: {}", file.name());
            continue;
        };
        let path = path.to_string_lossy().replace('\\', "/");

        let remaining = max_uncompressed.saturating_sub(total);
        let mut data = Vec::new();
        (&mut file)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| BundleError::InvalidZip(e.to_string()))?;
        total = total.saturating_add(data.len() as u64);
        if total > max_uncompressed {
            return Err(BundleError::InvalidZip(format!(
                "uncompressed contents exceed {} bytes",
                max_uncompressed
            )));
        }
        entries.push(Entry { path, data });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Files directly inside `dir` (no recursion) with an `.xml` suffix.
fn xml_files_in<'a>(entries: &'a [Entry], dir: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
    entries
        .iter()
        .filter(move |e| e.parent() == dir && xml_stem(e).is_some())
}

/// Unpacks a bundle. Layout follows the Edge export format, with fallbacks
/// for archives that nest `apiproxy/` under an extra directory.
pub fn extract_bundle(bytes: &[u8], max_uncompressed: u64) -> Result<BundleInfo> {
    let entries = read_entries(bytes, max_uncompressed)?;
    let mut bundle = BundleInfo {
        bundle_structure: entries.iter().map(|e| e.path.clone()).collect(),
        ..BundleInfo::default()
    };

    bundle.main_config = entries
        .iter()
        .find(|e| e.path == MAIN_CONFIG)
        .or_else(|| entries.iter().find(|e| e.file_name() == "apiproxy.xml"))
        .map(Entry::lossy_text);

    let policies_dir = if entries.iter().any(|e| e.parent() == POLICIES_DIR) {
        Some(POLICIES_DIR.to_string())
    } else {
        entries
            .iter()
            .map(Entry::parent)
            .find(|dir| *dir == "policies" || dir.ends_with("/policies"))
            .map(str::to_string)
    };

    if let Some(dir) = policies_dir.as_deref() {
        for entry in xml_files_in(&entries, dir) {
            let Some(stem) = xml_stem(entry) else { continue };
            let content = entry.lossy_text();
            let policy_type = xml::root_tag(&content).unwrap_or_else(|| stem.to_string());
            bundle.extracted_policies.push(policy_type);
            bundle.policies.insert(stem.to_string(), content);
        }
    }

    for entry in entries
        .iter()
        .filter(|e| RESOURCE_DIRS.iter().any(|d| e.path.starts_with(d)))
    {
        let content = entry
            .text()
            .unwrap_or_else(|| BINARY_PLACEHOLDER.to_string());
        bundle.resources.insert(entry.path.clone(), content);
    }

    for entry in xml_files_in(&entries, PROXIES_DIR) {
        if let Some(stem) = xml_stem(entry) {
            bundle.proxies.insert(stem.to_string(), entry.lossy_text());
        }
    }
    for entry in xml_files_in(&entries, TARGETS_DIR) {
        if let Some(stem) = xml_stem(entry) {
            bundle.targets.insert(stem.to_string(), entry.lossy_text());
        }
    }

    debug!(
        files = bundle.bundle_structure.len(),
        policies = bundle.policies.len(),
        resources = bundle.resources.len(),
        "Extracted proxy bundle"
    );
    Ok(bundle)
}

pub fn classify_resource(path: &str) -> &'static str {
    if path.contains(".js") {
        "javascript"
    } else if path.contains(".py") {
        "python"
    } else if path.contains(".java") {
        "java"
    } else if path.contains(".wsdl") || path.contains(".xsd") {
        "schema"
    } else {
        "unknown"
    }
}

impl BundleInfo {
    pub fn from_stored(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| BundleError::CorruptStoredBundle(e.to_string()))
    }

    pub fn to_stored(&self) -> String {
        // A struct of strings and maps always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Every policy referenced anywhere in the bundle.
    pub fn all_policies(&self) -> Vec<String> {
        let mut policies = Vec::new();
        let descriptors = self
            .main_config
            .iter()
            .chain(self.proxies.values())
            .chain(self.targets.values());
        for xml in descriptors {
            for p in xml::extract_policies_from_xml(xml) {
                push_unique(&mut policies, p);
            }
        }
        for p in &self.extracted_policies {
            push_unique(&mut policies, p.clone());
        }
        policies
    }

    pub fn proxy_info(&self) -> ProxyInfo {
        let mut info = self
            .main_config
            .as_deref()
            .map(xml::extract_proxy_info)
            .unwrap_or_default();
        for xml in self.proxies.values().chain(self.targets.values()) {
            let endpoint = xml::extract_proxy_info(xml);
            for p in endpoint.base_paths {
                push_unique(&mut info.base_paths, p);
            }
            for v in endpoint.virtual_hosts {
                push_unique(&mut info.virtual_hosts, v);
            }
        }
        if info.target_servers.is_empty() {
            info.target_servers = self.targets.keys().cloned().collect();
        }
        info.endpoints.proxies = self.proxies.keys().cloned().collect();
        info.endpoints.targets = self.targets.keys().cloned().collect();
        info.resources = self
            .resources
            .keys()
            .map(|path| ResourceRef {
                path: path.clone(),
                resource_type: classify_resource(path).to_string(),
            })
            .collect();
        info
    }

    /// Descriptor handed to the AI: the manifest, else the first proxy endpoint.
    pub fn analysis_content(&self) -> String {
        self.main_config
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.proxies.values().next().cloned())
            .unwrap_or_default()
    }

    /// Source XML for a policy given either its file name or its policy type.
    pub fn policy_source(&self, policy: &str) -> Option<&str> {
        self.policies.get(policy).map(String::as_str).or_else(|| {
            self.policies
                .values()
                .find(|xml| xml::root_tag(xml).as_deref() == Some(policy))
                .map(String::as_str)
        })
    }
}
