use apimigrate_bundle::{BundleError, ProxySource, ProxyUpload};
use apimigrate_core::{FileType, UploadLimits};
use std::io::{Cursor, Write};
use zip::write::FileOptions;

fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        zip.start_file(*name, opts).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn weather_bundle() -> Vec<u8> {
    zip_of(&[
        (
            "apiproxy/apiproxy.xml",
            r#"<APIProxy name="weather"><Policies><Policy>Verify-Key</Policy><Policy>JS-Transform</Policy></Policies></APIProxy>"#,
        ),
        (
            "apiproxy/policies/Verify-Key.xml",
            r#"<VerifyAPIKey name="Verify-Key"><APIKey ref="request.header.x-api-key"/></VerifyAPIKey>"#,
        ),
        (
            "apiproxy/policies/JS-Transform.xml",
            r#"<Javascript name="JS-Transform"><ResourceURL>jsc://t.js</ResourceURL></Javascript>"#,
        ),
        (
            "apiproxy/proxies/default.xml",
            r#"<ProxyEndpoint name="default"><PreFlow><Request><Step><Name>Verify-Key</Name></Step></Request></PreFlow><HTTPProxyConnection><BasePath>/weather</BasePath><VirtualHost>secure</VirtualHost></HTTPProxyConnection></ProxyEndpoint>"#,
        ),
        (
            "apiproxy/targets/backend.xml",
            r#"<TargetEndpoint name="backend"><HTTPTargetConnection><URL>https://example.com</URL></HTTPTargetConnection></TargetEndpoint>"#,
        ),
        ("apiproxy/resources/jsc/t.js", "context.setVariable('a', 1);"),
    ])
}

#[test]
fn zip_upload_round_trips_through_storage() {
    let upload = ProxyUpload::parse("Weather.zip", &weather_bundle(), &UploadLimits::default())
        .expect("bundle should parse");
    assert_eq!(
        upload.success_message(),
        "ZIP proxy bundle uploaded and extracted successfully"
    );

    let file = upload.into_proxy_file("Weather.zip");
    assert_eq!(file.file_type, FileType::Zip);
    assert!(file.content.contains("\"type\":\"zip_bundle\""));

    let source = ProxySource::from_proxy_file(&file).unwrap();
    assert_eq!(source.info.name, "weather");
    assert_eq!(source.info.base_paths, vec!["/weather"]);
    assert_eq!(source.info.virtual_hosts, vec!["secure"]);
    assert_eq!(source.info.endpoints.targets, vec!["backend"]);
    assert_eq!(source.info.resources[0].resource_type, "javascript");
    assert_eq!(
        source.policies,
        vec!["Verify-Key", "JS-Transform", "Javascript", "VerifyAPIKey"]
    );
    assert!(source.analysis_content.contains("<APIProxy name=\"weather\">"));
    assert!(source
        .policy_source("Verify-Key")
        .unwrap()
        .contains("request.header.x-api-key"));
}

#[test]
fn zip_without_manifest_is_rejected() {
    let bytes = zip_of(&[("apiproxy/policies/Q.xml", "<Quota/>")]);
    let err = ProxyUpload::parse("q.zip", &bytes, &UploadLimits::default()).unwrap_err();
    assert_eq!(err, BundleError::MissingApiProxy);
    assert_eq!(err.to_string(), "ZIP bundle must contain apiproxy.xml file");
}

#[test]
fn corrupt_zip_reports_invalid_bundle() {
    let err = ProxyUpload::parse("q.zip", b"PK\x03\x04garbage", &UploadLimits::default())
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid ZIP bundle: "));
}

#[test]
fn json_descriptor_source() {
    let body = br#"{"name":"orders","policies":["Quota","Custom-Thing"],"targetEndpoints":["default"]}"#;
    let file = ProxyUpload::parse("orders.json", body, &UploadLimits::default())
        .unwrap()
        .into_proxy_file("orders.json");
    let source = ProxySource::from_proxy_file(&file).unwrap();
    assert_eq!(source.info.name, "orders");
    assert_eq!(source.policies, vec!["Quota", "Custom-Thing"]);
    assert_eq!(source.info.target_servers, vec!["default"]);
    assert!(source.policy_source("Quota").is_none());
}

#[test]
fn xml_upload_with_doctype_is_accepted() {
    let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE APIProxy>
<APIProxy name="legacy"><Policies><Policy>Spike-Arrest</Policy></Policies></APIProxy>"#;
    let file = ProxyUpload::parse("legacy.xml", body, &UploadLimits::default())
        .expect("doctype should not be rejected")
        .into_proxy_file("legacy.xml");
    assert_eq!(file.file_type, FileType::Xml);

    let source = ProxySource::from_proxy_file(&file).unwrap();
    assert_eq!(source.info.name, "legacy");
    assert_eq!(source.policies, vec!["Spike-Arrest"]);
}
