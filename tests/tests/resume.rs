//! Interrupted and partially failed uploads resumed from persisted state.

use std::sync::Arc;

use linkweave_core::{
    BatchPhase, CancellationToken, ClientError, ClientErrorKind, Record, RecordStatus, StashReason,
    StatePersistence, UploadConfig,
};
use linkweave_state::FileStatePersistence;
use linkweave_test_utils::builders::chain;
use linkweave_test_utils::ScriptedCreationClient;
use linkweave_tests::{fast_config, Harness};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn no_records() -> Vec<Record> {
    Vec::new()
}

#[tokio::test]
async fn test_cancelled_run_resumes_without_recreating() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let records = chain(&["a", "b", "c", "d", "e"]);
    let token = CancellationToken::new();

    let first = Harness::with_persistence(
        ScriptedCreationClient::new().cancel_after(2, token.clone()),
        Arc::new(FileStatePersistence::new(dir.path(), "scenario")),
    );
    let report = first
        .service(fast_config(1))
        .with_cancellation(token)
        .run(&records)
        .await?;

    assert!(report.interrupted);
    assert_eq!(report.phase, BatchPhase::Uploading);
    assert_eq!(first.client.created_ids(), vec!["e", "d"]);
    assert_eq!(first.events.count("upload.cancelled"), 1);

    // A new process: fresh persistence handle on the same directory, fresh client
    let persistence = Arc::new(FileStatePersistence::new(dir.path(), "scenario"));
    let saved = persistence.load().await?.expect("interrupted run is saved");
    assert_eq!(saved.pending.len(), 3);
    assert_eq!(saved.status(&"d".into()), Some(RecordStatus::Created));

    let second = Harness::with_persistence(ScriptedCreationClient::new(), persistence.clone());
    let report = second.service(fast_config(1)).run(&no_records()).await?;

    assert!(report.is_success());
    assert_eq!(second.client.created_ids(), vec!["c", "b", "a"]);
    assert_eq!(report.created.len(), 5);
    assert_eq!(second.events.count("upload.resumed"), 1);

    // The resumed records point at IRIs handed out by the first run
    let b = &second.client.created()[1];
    assert_eq!(b.values[0].referenced_ids().len(), 0);
    assert!(serde_json::to_string(&b.values[0])?.contains(&ScriptedCreationClient::iri_for("c").0));
    let c = &second.client.created()[0];
    assert!(serde_json::to_string(&c.values[0])?.contains(&ScriptedCreationClient::iri_for("d").0));

    assert!(persistence.load().await?.is_none());
    assert!(!persistence.path().exists());
    Ok(())
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() -> anyhow::Result<()> {
    let harness = Harness::new(ScriptedCreationClient::new());
    let service = harness.service(fast_config(1));
    service.cancellation_token().cancel();

    let report = service.run(&chain(&["a", "b"])).await?;

    assert!(report.interrupted);
    assert_eq!(harness.client.request_count(), 0);
    let saved = harness.persistence.load().await?.expect("state saved on interrupt");
    assert_eq!(saved.pending.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_target_is_retried_on_resume() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let records = chain(&["x", "y"]);

    let first = Harness::with_persistence(
        ScriptedCreationClient::new().fail_create("y", ClientError::new(ClientErrorKind::BadRequest, "invalid")),
        Arc::new(FileStatePersistence::new(dir.path(), "scenario")),
    );
    let report = first.service(fast_config(1)).run(&records).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert_eq!(first.client.created_ids(), vec!["x"]);
    assert!(first.client.created()[0].values.is_empty());
    assert_eq!(report.unresolved_value_ids(), vec!["x-v0".into()]);
    assert_eq!(report.unresolved_stash[0].item.reason, StashReason::FailedTarget);
    assert_eq!(first.events.count("upload.value_deferred"), 1);

    let second = Harness::with_persistence(
        ScriptedCreationClient::new(),
        Arc::new(FileStatePersistence::new(dir.path(), "scenario")),
    );
    let report = second.service(fast_config(1)).run(&no_records()).await?;

    assert!(report.is_success());
    assert!(report.failed.is_empty());
    assert!(report.unresolved_stash.is_empty());
    assert_eq!(second.client.created_ids(), vec!["y"]);
    assert_eq!(second.client.patched_value_ids(), vec!["x-v0"]);

    let (on, _) = &second.client.patched()[0];
    assert_eq!(on, &ScriptedCreationClient::iri_for("x"));
    Ok(())
}

#[tokio::test]
async fn test_resume_without_retrying_failures() -> anyhow::Result<()> {
    let records = chain(&["x", "y"]);
    let config = UploadConfig {
        retry_failed_on_resume: false,
        ..fast_config(1)
    };

    let harness = Harness::new(
        ScriptedCreationClient::new().fail_create("y", ClientError::new(ClientErrorKind::BadRequest, "invalid")),
    );
    harness.service(config.clone()).run(&records).await?;
    harness.client.heal();

    let report = harness.service(config).run(&no_records()).await?;

    assert_eq!(report.phase, BatchPhase::DoneWithFailures);
    assert_eq!(report.failed.len(), 1);
    let attempts_for_y = harness
        .client
        .create_attempts()
        .iter()
        .filter(|id| id.as_str() == "y")
        .count();
    assert_eq!(attempts_for_y, 1);
    Ok(())
}

#[tokio::test]
async fn test_saved_state_survives_reload_unchanged() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let token = CancellationToken::new();
    let persistence = Arc::new(FileStatePersistence::new(dir.path(), "scenario"));

    let harness = Harness::with_persistence(
        ScriptedCreationClient::new().cancel_after(1, token.clone()),
        persistence.clone(),
    );
    harness
        .service(fast_config(1))
        .with_cancellation(token)
        .run(&chain(&["a", "b", "c"]))
        .await?;

    let once = persistence.load().await?.expect("saved");
    persistence.save(&once).await?;
    let twice = persistence.load().await?.expect("saved");

    assert_eq!(once, twice);
    assert_eq!(twice.pending.front().map(|r| r.local_id.as_str()), Some("b"));
    assert_eq!(harness.client.created_ids(), vec!["c"]);
    Ok(())
}
