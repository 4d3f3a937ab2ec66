//! End-to-end scheduling and upload scenarios against a scripted repository.

use linkweave_core::{
    schedule, schedule_ontology, BatchPhase, ClientError, ClientErrorKind, CoreError, LocalId, OntologyItem, Record,
    StashReason, StatePersistence, UnresolvedReason, ValueKind,
};
use linkweave_test_utils::builders::{chain, ring};
use linkweave_test_utils::{
    assert_created_before, assert_no_value_lost, assert_valid_order, RecordBuilder, ScriptedCreationClient,
};
use linkweave_tests::{fast_config, Harness};
use pretty_assertions::assert_eq;

fn iri(id: &str) -> String {
    ScriptedCreationClient::iri_for(id).0
}

#[tokio::test]
async fn test_three_cycle_stashes_one_link_and_patches_it() -> anyhow::Result<()> {
    let records = ring(&["a", "b", "c"]);

    let scheduled = schedule(records.clone())?;
    assert_eq!(scheduled.stash.len(), 1);
    assert_valid_order(&scheduled.ordered);
    assert_no_value_lost(&records, &scheduled);

    let harness = Harness::new(ScriptedCreationClient::new());
    let report = harness.service(fast_config(1)).run(&records).await?;

    assert!(report.is_success());
    assert_eq!(report.created.len(), 3);
    assert_eq!(harness.client.patched_value_ids(), vec!["a-v0"]);

    let (patched_on, value) = &harness.client.patched()[0];
    assert_eq!(patched_on.as_str(), iri("a"));
    assert_eq!(value.kind, ValueKind::DirectReference { target: iri("b") });

    assert!(harness.persistence.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_creation_requests_carry_resolved_iris() -> anyhow::Result<()> {
    let records = ring(&["a", "b", "c"]);
    let harness = Harness::new(ScriptedCreationClient::new());

    harness.service(fast_config(1)).run(&records).await?;

    assert_created_before(&harness.client.created_ids(), "a", "c");
    assert_created_before(&harness.client.created_ids(), "c", "b");
    for sent in harness.client.created() {
        for value in &sent.values {
            assert!(value.referenced_ids().is_empty(), "unresolved reference sent: {:?}", value);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_embedded_reference_is_stashed_before_direct_links() -> anyhow::Result<()> {
    let records = vec![
        RecordBuilder::new("a").mentions("t", &["b", "c"]).link("l", "b").build(),
        RecordBuilder::new("b").link("bl", "a").build(),
        RecordBuilder::new("c").build(),
    ];

    let scheduled = schedule(records.clone())?;
    let stashed: Vec<&str> = scheduled.stash.iter().map(|i| i.value.id.as_str()).collect();
    assert!(stashed.contains(&"t"));
    assert!(!stashed.contains(&"bl"));
    assert!(scheduled.stash.iter().all(|i| i.reason == StashReason::Cycle));
    assert_valid_order(&scheduled.ordered);
    assert_no_value_lost(&records, &scheduled);

    let harness = Harness::new(ScriptedCreationClient::new());
    let report = harness.service(fast_config(1)).run(&records).await?;
    assert!(report.is_success());

    let patched = harness.client.patched();
    let (_, text) = patched
        .iter()
        .find(|(_, v)| v.id.as_str() == "t")
        .ok_or_else(|| anyhow::anyhow!("text value never patched"))?;
    let ValueKind::EmbeddedReference { text } = &text.kind else {
        anyhow::bail!("text value changed kind");
    };
    assert!(text.contains(&format!("IRI:{}:IRI", iri("b"))));
    assert!(text.contains(&format!("IRI:{}:IRI", iri("c"))));
    Ok(())
}

#[test]
fn test_ontology_cycle_is_fatal() {
    let classes = vec![OntologyItem::new("X", ["Y"]), OntologyItem::new("Y", ["X"])];

    let err = schedule_ontology(classes, Vec::new()).unwrap_err();

    assert_eq!(
        err,
        CoreError::CircularOntologyDependency {
            involved: vec!["X".to_string(), "Y".to_string()]
        }
    );
}

#[test]
fn test_ontology_supers_come_first() {
    let classes = vec![
        OntologyItem::new("Book", ["Document"]),
        OntologyItem::new("Document", ["knora-api:Resource"]),
    ];
    let properties = vec![
        OntologyItem::new("hasAuthor", ["hasContributor"]),
        OntologyItem::new("hasContributor", Vec::<String>::new()),
    ];

    let ordered = schedule_ontology(classes, properties).unwrap();

    let classes: Vec<&str> = ordered.classes.iter().map(|c| c.id.as_str()).collect();
    let properties: Vec<&str> = ordered.properties.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(classes, vec!["Document", "Book"]);
    assert_eq!(properties, vec!["hasContributor", "hasAuthor"]);
}

#[tokio::test]
async fn test_dangling_reference_fails_before_any_request() -> anyhow::Result<()> {
    let records = vec![
        RecordBuilder::new("b").build(),
        RecordBuilder::new("a").link("v", "z").build(),
    ];
    let harness = Harness::new(ScriptedCreationClient::new());

    let err = harness.service(fast_config(1)).run(&records).await.unwrap_err();

    assert_eq!(
        err,
        CoreError::DanglingReference {
            source_id: "a".to_string(),
            target_id: "z".to_string(),
            value_id: "v".to_string(),
        }
    );
    assert_eq!(harness.client.request_count(), 0);
    assert!(harness.persistence.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_local_id_fails_before_any_request() {
    let records = vec![RecordBuilder::new("a").build(), RecordBuilder::new("a").build()];
    let harness = Harness::new(ScriptedCreationClient::new());

    let err = harness.service(fast_config(1)).run(&records).await.unwrap_err();

    assert!(matches!(err, CoreError::DuplicateLocalId(_)));
    assert_eq!(harness.client.request_count(), 0);
}

#[tokio::test]
async fn test_reused_value_id_fails_before_any_request() -> anyhow::Result<()> {
    let records = vec![
        RecordBuilder::new("a").link("v", "b").mentions("v", &["b"]).build(),
        RecordBuilder::new("b").build(),
    ];
    let harness = Harness::new(ScriptedCreationClient::new());

    let err = harness.service(fast_config(1)).run(&records).await.unwrap_err();

    assert_eq!(
        err,
        CoreError::DuplicateValueId {
            record_id: "a".to_string(),
            value_id: "v".to_string(),
        }
    );
    assert!(err.is_input_error());
    assert_eq!(harness.client.request_count(), 0);
    assert!(harness.persistence.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_target_leaves_stash_entry_unresolved() -> anyhow::Result<()> {
    let mut records = ring(&["a", "b"]);
    records.push(RecordBuilder::new("c").links_to("d").build());
    records.push(RecordBuilder::new("d").build());

    let harness = Harness::new(
        ScriptedCreationClient::new().fail_create("b", ClientError::new(ClientErrorKind::BadRequest, "invalid")),
    );
    let report = harness.service(fast_config(3)).run(&records).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert!(!report.is_success());
    assert_eq!(report.failed.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(
        report.created.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
        vec!["a", "c", "d"]
    );

    assert_eq!(report.unresolved_stash.len(), 1);
    let entry = &report.unresolved_stash[0];
    assert_eq!(entry.item.source.as_str(), "a");
    assert_eq!(entry.value_id().as_str(), "a-v0");
    assert_eq!(
        entry.reason,
        UnresolvedReason::MissingTargets {
            targets: vec!["b".into()]
        }
    );

    // Non-retryable: exactly one attempt
    let attempts_for_b = harness
        .client
        .create_attempts()
        .iter()
        .filter(|id| id.as_str() == "b")
        .count();
    assert_eq!(attempts_for_b, 1);

    let saved = harness.persistence.load().await?.expect("state kept for a follow-up run");
    assert_eq!(saved.phase, BatchPhase::DoneWithFailures);
    Ok(())
}

#[tokio::test]
async fn test_failed_cycle_member_leaves_its_stashed_value_unresolved() -> anyhow::Result<()> {
    let mut records = ring(&["a", "b"]);
    records.push(RecordBuilder::new("c").build());

    let harness = Harness::new(
        ScriptedCreationClient::new().fail_create("a", ClientError::new(ClientErrorKind::BadRequest, "invalid")),
    );
    let report = harness.service(fast_config(3)).run(&records).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert_eq!(report.failed.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(report.created.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    assert_eq!(harness.client.created_ids(), vec!["b", "c"]);
    assert!(harness.client.created()[0].values.is_empty());
    assert!(harness.client.patched().is_empty());

    // a-v0 was stashed to break the cycle but a never got an IRI; b-v0 still points at a
    let unresolved: Vec<(&str, &str, StashReason, UnresolvedReason)> = report
        .unresolved_stash
        .iter()
        .map(|e| (e.item.source.as_str(), e.value_id().as_str(), e.item.reason, e.reason.clone()))
        .collect();
    assert_eq!(
        unresolved,
        vec![
            ("a", "a-v0", StashReason::Cycle, UnresolvedReason::SourceNotCreated),
            (
                "b",
                "b-v0",
                StashReason::FailedTarget,
                UnresolvedReason::MissingTargets {
                    targets: vec!["a".into()]
                }
            ),
        ]
    );
    assert_eq!(harness.events.count("upload.stash_unresolved"), 2);

    let saved = harness.persistence.load().await?.expect("state kept for a follow-up run");
    assert_eq!(saved.phase, BatchPhase::DoneWithFailures);
    assert!(saved.failed.contains_key(&LocalId::from("a")));
    assert_eq!(saved.unresolved_stash, report.unresolved_stash);
    Ok(())
}

#[tokio::test]
async fn test_rejected_patch_is_reported_unresolved() -> anyhow::Result<()> {
    let harness = Harness::new(ScriptedCreationClient::new().fail_patch(
        "a-v0",
        ClientError::new(ClientErrorKind::BadRequest, "cardinality exceeded"),
    ));
    let report = harness.service(fast_config(3)).run(&ring(&["a", "b"])).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert!(!report.is_success());
    assert!(report.failed.is_empty());
    assert_eq!(report.created.len(), 2);
    assert!(harness.client.patched().is_empty());

    // Non-retryable: two creations and a single patch attempt
    assert_eq!(harness.client.request_count(), 3);
    assert_eq!(harness.events.count("upload.retry_scheduled"), 0);

    assert_eq!(report.unresolved_value_ids(), vec!["a-v0".into()]);
    assert_eq!(
        report.unresolved_stash[0].reason,
        UnresolvedReason::PatchFailed {
            message: "BadRequest: cardinality exceeded".to_string()
        }
    );

    let saved = harness.persistence.load().await?.expect("state kept for a follow-up run");
    assert_eq!(saved.phase, BatchPhase::DoneWithFailures);
    assert_eq!(saved.unresolved_stash, report.unresolved_stash);
    Ok(())
}

#[tokio::test]
async fn test_patch_gives_up_after_retries() -> anyhow::Result<()> {
    let harness = Harness::new(ScriptedCreationClient::new().fail_patch(
        "a-v0",
        ClientError::new(ClientErrorKind::ServerError, "unavailable").with_status(503),
    ));
    let report = harness.service(fast_config(2)).run(&ring(&["a", "b"])).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert!(report.failed.is_empty());
    assert_eq!(harness.client.request_count(), 4);
    assert_eq!(harness.events.count("upload.retry_scheduled"), 1);
    assert_eq!(
        report.unresolved_stash[0].reason,
        UnresolvedReason::PatchFailed {
            message: "ServerError (503): unavailable".to_string()
        }
    );
    assert!(harness.persistence.load().await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_retryable_errors_are_retried() -> anyhow::Result<()> {
    let records = chain(&["a", "b"]);
    let harness = Harness::new(ScriptedCreationClient::new().fail_create_times(
        "b",
        vec![
            ClientError::new(ClientErrorKind::Timeout, "timed out"),
            ClientError::new(ClientErrorKind::ServerError, "unavailable").with_status(503),
        ],
    ));

    let report = harness.service(fast_config(3)).run(&records).await?;

    assert!(report.is_success());
    assert_eq!(harness.events.count("upload.retry_scheduled"), 2);
    assert_eq!(harness.client.created_ids(), vec!["b", "a"]);
    Ok(())
}

#[tokio::test]
async fn test_acyclic_batch_gets_distinct_iris() -> anyhow::Result<()> {
    let records: Vec<Record> = vec![
        RecordBuilder::new("doc").mentions("d-text", &["p1", "p2"]).links_to("p1").build(),
        RecordBuilder::new("p1").links_to("org").build(),
        RecordBuilder::new("p2").links_to("org").build(),
        RecordBuilder::new("org").plain("founded", serde_json::json!(1901)).build(),
        RecordBuilder::new("loose").links_to("http://rdfh.ch/0001/external").build(),
    ];

    let scheduled = schedule(records.clone())?;
    assert!(scheduled.stash.is_empty());

    let harness = Harness::new(ScriptedCreationClient::new());
    let report = harness.service(fast_config(1)).run(&records).await?;

    assert!(report.is_success());
    assert_eq!(report.created.len(), 5);
    let distinct: std::collections::HashSet<_> = report.created.values().collect();
    assert_eq!(distinct.len(), 5);
    assert!(harness.client.patched().is_empty());

    let ordered: Vec<Record> = harness.client.created();
    let ids: Vec<String> = ordered.iter().map(|r| r.local_id.0.clone()).collect();
    assert_created_before(&ids, "org", "p1");
    assert_created_before(&ids, "p2", "doc");
    Ok(())
}

#[tokio::test]
async fn test_events_follow_the_batch() -> anyhow::Result<()> {
    let harness = Harness::new(ScriptedCreationClient::new());
    harness.service(fast_config(1)).run(&ring(&["a", "b"])).await?;

    let types = harness.events.event_types();
    assert_eq!(types.first(), Some(&"upload.scheduled"));
    assert_eq!(types.last(), Some(&"upload.finished"));
    assert_eq!(harness.events.count("upload.record_created"), 2);
    assert_eq!(harness.events.count("upload.stash_patched"), 1);
    assert_eq!(harness.events.count("upload.phase_changed"), 3);
    Ok(())
}
