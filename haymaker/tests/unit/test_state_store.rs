//! File state store tests

use haymaker::errors::HaymakerError;
use haymaker::workloads::lifecycle::DeploymentEvent;
use haymaker::workloads::{DeploymentState, DeploymentStatus, FilePlatform, Platform};
use serde_json::json;

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = DeploymentState::new("dep-persist", "m365").with_phase("provisioning");
    state.metadata.insert("region".to_string(), json!("westus"));
    state.apply(DeploymentEvent::Start).unwrap();

    {
        let platform = FilePlatform::open(dir.path()).await.unwrap();
        platform.save_deployment_state(&state).await.unwrap();
    }

    let reopened = FilePlatform::open(dir.path()).await.unwrap();
    let loaded = reopened
        .load_deployment_state("dep-persist")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, state);
    assert!(dir.path().join("dep-persist.json").exists());
}

#[tokio::test]
async fn test_traversal_ids_touch_nothing() {
    let outer = tempfile::tempdir().unwrap();
    let state_dir = outer.path().join("state");
    let platform = FilePlatform::open(&state_dir).await.unwrap();

    for id in ["../escape", "a/b", "a\\b", "", ".hidden", "x..y"] {
        let err = platform
            .save_deployment_state(&DeploymentState::new(id, "w"))
            .await
            .unwrap_err();
        assert!(matches!(err, HaymakerError::ValidationError(_)), "{:?}", id);
        assert!(platform.load_deployment_state(id).await.is_err());
        assert!(platform.delete_deployment_state(id).await.is_err());
    }
    assert!(!outer.path().join("escape.json").exists());
    assert_eq!(std::fs::read_dir(&state_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_filters_by_workload_and_skips_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let platform = FilePlatform::open(dir.path()).await.unwrap();
    for (id, workload) in [("dep-1", "a"), ("dep-2", "b"), ("dep-3", "a")] {
        platform
            .save_deployment_state(&DeploymentState::new(id, workload))
            .await
            .unwrap();
    }
    std::fs::write(dir.path().join("corrupt.json"), "{ not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut ids: Vec<String> = platform
        .list_deployments("a")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.deployment_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["dep-1", "dep-3"]);

    // Loading the corrupt record directly is an error, not a silent miss
    assert!(matches!(
        platform.load_deployment_state("corrupt").await,
        Err(HaymakerError::StorageError(_))
    ));
}

#[tokio::test]
async fn test_failed_state_requires_error_message() {
    let dir = tempfile::tempdir().unwrap();
    let platform = FilePlatform::open(dir.path()).await.unwrap();

    let mut state = DeploymentState::new("dep-bad", "w");
    state.status = DeploymentStatus::Failed;
    assert!(platform.save_deployment_state(&state).await.is_err());

    state.apply(DeploymentEvent::Cleanup).unwrap();
    state
        .apply(DeploymentEvent::Fail("teardown failed".to_string()))
        .unwrap();
    platform.save_deployment_state(&state).await.unwrap();
    let loaded = platform.load_deployment_state("dep-bad").await.unwrap().unwrap();
    assert_eq!(loaded.error.as_deref(), Some("teardown failed"));
}
