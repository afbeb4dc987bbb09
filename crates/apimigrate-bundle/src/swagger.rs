//! Swagger / OpenAPI documents: upload parsing and the rule-based
//! conversion used whenever the AI conversion is unavailable.

use crate::error::{BundleError, Result};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecFormat {
    Json,
    Yaml,
}

fn spec_format(filename: &str) -> Option<SpecFormat> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".json") {
        Some(SpecFormat::Json)
    } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        Some(SpecFormat::Yaml)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpec {
    pub document: Value,
    pub spec_version: String,
}

pub fn parse_spec(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<ParsedSpec> {
    if bytes.len() > max_bytes {
        return Err(BundleError::TooLarge {
            limit_mb: max_bytes / (1024 * 1024),
        });
    }
    let format = spec_format(filename).ok_or(BundleError::UnsupportedSpecFormat)?;
    let text = std::str::from_utf8(bytes).map_err(|e| BundleError::InvalidSpec(e.to_string()))?;

    let document: Value = match format {
        SpecFormat::Json => {
            serde_json::from_str(text).map_err(|e| BundleError::InvalidSpec(e.to_string()))?
        }
        SpecFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| BundleError::InvalidSpec(e.to_string()))?
        }
    };

    let version = document
        .get("swagger")
        .or_else(|| document.get("openapi"))
        .ok_or(BundleError::NotOpenApi)?;
    let spec_version = match version {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(ParsedSpec {
        document,
        spec_version,
    })
}

pub fn is_swagger2(spec: &Value) -> bool {
    spec.get("swagger").is_some()
}

fn field_or(spec: &Value, key: &str, default: Value) -> Value {
    spec.get(key).cloned().unwrap_or(default)
}

fn server_url(spec: &Value) -> String {
    let host = spec
        .get("host")
        .and_then(Value::as_str)
        .unwrap_or("api.example.com");
    let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("");
    format!("{}{}", host, base_path)
}

fn upgrade_swagger2(spec: &Value) -> Value {
    json!({
        "openapi": "3.0.0",
        "info": field_or(spec, "info", json!({})),
        "servers": [{ "url": server_url(spec) }],
        "paths": field_or(spec, "paths", json!({})),
        "components": {
            "schemas": field_or(spec, "definitions", json!({})),
            "securitySchemes": {
                "ApiKeyAuth": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "X-API-Key"
                },
                "OAuth2": {
                    "type": "oauth2",
                    "flows": {
                        "clientCredentials": {
                            "tokenUrl": "https://oauth.example.com/token",
                            "scopes": {}
                        }
                    }
                }
            }
        },
        "security": [
            { "ApiKeyAuth": [] },
            { "OAuth2": [] }
        ]
    })
}

fn google_management() -> Value {
    json!({
        "metrics": [
            { "name": "request_count", "valueType": "INT64", "metricKind": "DELTA" }
        ],
        "quota": {
            "limits": [
                {
                    "name": "ApiCalls",
                    "metric": "request_count",
                    "unit": "1/min",
                    "values": { "STANDARD": 1000 }
                }
            ]
        }
    })
}

/// Swagger 2.0 is upgraded to an OpenAPI 3.0.0 skeleton; every document
/// gains the `x-google-management` quota block.
pub fn fallback_conversion(spec: &Value) -> Value {
    let mut converted = if is_swagger2(spec) {
        upgrade_swagger2(spec)
    } else {
        spec.clone()
    };
    match converted.as_object_mut() {
        Some(map) => {
            map.insert("x-google-management".to_string(), google_management());
        }
        None => {
            let mut map = Map::new();
            map.insert("x-google-management".to_string(), google_management());
            converted = Value::Object(map);
        }
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 10 * 1024 * 1024;

    #[test]
    fn yaml_swagger_version_is_stringified() {
        let yaml = b"swagger: 2.0\ninfo:\n  title: Pets\npaths: {}\n";
        let parsed = parse_spec("pets.YML", yaml, LIMIT).unwrap();
        assert_eq!(parsed.spec_version, "2.0");
        assert_eq!(parsed.document["info"]["title"], "Pets");
    }

    #[test]
    fn rejects_unsupported_and_non_openapi_documents() {
        assert_eq!(
            parse_spec("pets.txt", b"{}", LIMIT).unwrap_err(),
            BundleError::UnsupportedSpecFormat
        );
        assert!(matches!(
            parse_spec("pets.json", b"{", LIMIT),
            Err(BundleError::InvalidSpec(_))
        ));
        assert_eq!(
            parse_spec("pets.json", br#"{"info": {}}"#, LIMIT).unwrap_err(),
            BundleError::NotOpenApi
        );
        assert!(parse_spec("pets.json", &[b' '; 32], 16).unwrap_err().is_too_large());
    }

    #[test]
    fn swagger2_is_upgraded() {
        let spec = json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1"},
            "host": "pets.example.com",
            "basePath": "/v1",
            "paths": {"/pets": {"get": {}}},
            "definitions": {"Pet": {"type": "object"}}
        });
        let converted = fallback_conversion(&spec);
        assert_eq!(converted["openapi"], "3.0.0");
        assert!(converted.get("swagger").is_none());
        assert_eq!(converted["servers"][0]["url"], "pets.example.com/v1");
        assert_eq!(converted["components"]["schemas"]["Pet"]["type"], "object");
        assert_eq!(
            converted["components"]["securitySchemes"]["ApiKeyAuth"]["name"],
            "X-API-Key"
        );
        assert_eq!(converted["security"].as_array().unwrap().len(), 2);
        assert_eq!(
            converted["x-google-management"]["quota"]["limits"][0]["values"]["STANDARD"],
            1000
        );
    }

    #[test]
    fn openapi3_keeps_its_shape() {
        let spec = json!({"openapi": "3.0.1", "paths": {}});
        let converted = fallback_conversion(&spec);
        assert_eq!(converted["openapi"], "3.0.1");
        assert_eq!(converted["servers"], Value::Null);
        assert_eq!(
            converted["x-google-management"]["metrics"][0]["name"],
            "request_count"
        );
    }
}
