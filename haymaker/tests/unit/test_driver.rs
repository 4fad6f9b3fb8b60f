//! Lifecycle command tests over a file-backed platform

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use haymaker::driver::{self, CleanupOutcome, ListFilter};
use haymaker::errors::HaymakerError;
use haymaker::workloads::{
    DeploymentConfig, DeploymentLocator, DeploymentStatus, FilePlatform, WorkloadRegistry,
};

use crate::common::sim_registry;

async fn setup(dir: &std::path::Path) -> (WorkloadRegistry, DeploymentLocator) {
    let platform = Arc::new(FilePlatform::open(dir.join("state")).await.unwrap());
    let counter = Arc::new(AtomicUsize::new(0));
    (
        sim_registry(platform, &["alpha", "beta"], &counter),
        DeploymentLocator::new(),
    )
}

#[tokio::test]
async fn test_deploy_status_stop_start_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, locator) = setup(dir.path()).await;

    let id = driver::deploy(&registry, &DeploymentConfig::new("beta"))
        .await
        .unwrap();
    let state = driver::status(&registry, &locator, &id).await.unwrap();
    assert_eq!(state.status, DeploymentStatus::Running);
    assert_eq!(state.workload_name, "beta");
    assert!(state.started_at.is_some());

    assert!(driver::stop(&registry, &locator, &id).await.unwrap());
    let state = driver::status(&registry, &locator, &id).await.unwrap();
    assert_eq!(state.status, DeploymentStatus::Stopped);
    assert!(state.stopped_at >= state.started_at);

    // Stopping again is refused before the workload is asked
    let err = driver::stop(&registry, &locator, &id).await.unwrap_err();
    assert!(matches!(err, HaymakerError::InvalidTransition(_)));

    assert!(driver::start(&registry, &locator, &id).await.unwrap());
    assert!(driver::start(&registry, &locator, &id).await.unwrap());
    let state = driver::status(&registry, &locator, &id).await.unwrap();
    assert_eq!(state.status, DeploymentStatus::Running);

    let lines: Vec<String> = driver::logs(&registry, &locator, &id, false, 2)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(lines, vec![format!("{} line 2", id), format!("{} line 3", id)]);

    match driver::cleanup(&registry, &locator, &id, true).await.unwrap() {
        CleanupOutcome::DryRun(state) => assert_eq!(state.deployment_id, id),
        other => panic!("expected a dry run, got {:?}", other),
    }
    assert_ok!(driver::status(&registry, &locator, &id).await);

    match driver::cleanup(&registry, &locator, &id, false).await.unwrap() {
        CleanupOutcome::Done(report) => {
            assert_eq!(report.resources_deleted, 1);
            assert!(report.is_clean());
        }
        other => panic!("expected a cleanup report, got {:?}", other),
    }
    assert!(locator.is_empty());
    let err = assert_err!(driver::status(&registry, &locator, &id).await);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_deploy_validation() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _) = setup(dir.path()).await;

    let err = driver::deploy(&registry, &DeploymentConfig::new("missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let mut config = DeploymentConfig::new("alpha");
    config.duration_hours = Some(0);
    config.workload_config.insert("reject".to_string(), json!(true));
    match driver::deploy(&registry, &config).await.unwrap_err() {
        HaymakerError::ValidationError(msg) => {
            assert!(msg.contains("duration_hours"));
            assert!(msg.contains("rejected"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(driver::list(&registry, &ListFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_filters_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, locator) = setup(dir.path()).await;

    let mut ids = Vec::new();
    for workload in ["alpha", "alpha", "beta"] {
        ids.push(
            driver::deploy(&registry, &DeploymentConfig::new(workload))
                .await
                .unwrap(),
        );
    }
    driver::stop(&registry, &locator, &ids[0]).await.unwrap();
    std::fs::write(dir.path().join("state/garbage.json"), "[").unwrap();

    let all = driver::list(&registry, &ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let alpha = ListFilter {
        workload: Some("alpha".to_string()),
        ..Default::default()
    };
    assert_eq!(driver::list(&registry, &alpha).await.unwrap().len(), 2);

    let running = ListFilter {
        status: Some(DeploymentStatus::Running),
        ..Default::default()
    };
    let states = driver::list(&registry, &running).await.unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|s| s.status == DeploymentStatus::Running));

    let limited = ListFilter {
        limit: 1,
        ..Default::default()
    };
    assert_eq!(driver::list(&registry, &limited).await.unwrap().len(), 1);

    let unknown = ListFilter {
        workload: Some("nope".to_string()),
        ..Default::default()
    };
    assert!(driver::list(&registry, &unknown).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unsafe_ids_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, locator) = setup(dir.path()).await;
    for id in ["../etc/passwd", "", "a/b"] {
        let err = driver::status(&registry, &locator, id).await.unwrap_err();
        assert!(matches!(err, HaymakerError::ValidationError(_)), "{:?}", id);
    }
}
