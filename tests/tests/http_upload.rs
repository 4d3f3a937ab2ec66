//! Full upload through the HTTP client against a mock repository.

use std::sync::Arc;

use linkweave_client::HttpCreationClient;
use linkweave_core::{IriResolver, TracingEventHandler, UploadService};
use linkweave_state::{write_id2iri_mapping, InMemoryStatePersistence};
use linkweave_test_utils::builders::ring;
use linkweave_test_utils::RecordBuilder;
use linkweave_tests::fast_config;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers a creation with an IRI derived from the record label
struct IriFromLabel;

impl Respond for IriFromLabel {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let label = body["rdfs:label"].as_str().unwrap_or_default();
        let id = label.rsplit(' ').next().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "@id": format!("http://rdfh.ch/0001/{}", id) }))
    }
}

#[tokio::test]
async fn test_cycle_upload_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/resources"))
        .respond_with(IriFromLabel)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/values"))
        .and(body_partial_json(json!({
            "@id": "http://rdfh.ch/0001/a",
            "value": {"id": "a-v0", "kind": {"target": "http://rdfh.ch/0001/b"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCreationClient::with_url_and_timeout(server.uri(), 5)?;
    let service = UploadService::new(
        Arc::new(client),
        Arc::new(InMemoryStatePersistence::new()),
        Arc::new(TracingEventHandler::new()),
        fast_config(1),
    );

    let report = service.run(&ring(&["a", "b"])).await?;
    assert!(report.is_success());

    let requests = server.received_requests().await.unwrap_or_default();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body)?;
    assert_eq!(second["rdfs:label"], "Record b");
    assert_eq!(second["values"][0]["kind"]["target"], "http://rdfh.ch/0001/a");

    let dir = tempdir()?;
    let mut resolver = IriResolver::new();
    for (id, iri) in report.created {
        resolver.insert(id, iri);
    }
    let mapping = write_id2iri_mapping(dir.path(), &report.batch_key, &resolver).await?;
    let written: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(mapping).await?)?;
    assert_eq!(written, json!({"a": "http://rdfh.ch/0001/a", "b": "http://rdfh.ch/0001/b"}));
    Ok(())
}

#[tokio::test]
async fn test_rejected_record_is_reported_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/resources"))
        .and(body_partial_json(json!({"rdfs:label": "Broken"})))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid cardinality"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/resources"))
        .respond_with(IriFromLabel)
        .mount(&server)
        .await;

    let records = vec![
        RecordBuilder::new("good").build(),
        RecordBuilder::new("bad").label("Broken").build(),
    ];
    let service = UploadService::new(
        Arc::new(HttpCreationClient::with_url_and_timeout(server.uri(), 5)?),
        Arc::new(InMemoryStatePersistence::new()),
        Arc::new(TracingEventHandler::new()),
        fast_config(3),
    );

    let report = service.run(&records).await?;

    assert!(!report.is_success());
    assert!(report.created.contains_key(&"good".into()));
    let error = report.failed.get(&"bad".into()).cloned().unwrap_or_default();
    assert!(error.contains("invalid cardinality"), "unexpected error: {}", error);
    Ok(())
}
