//! Deployment locator tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use haymaker::workloads::{
    DeploymentConfig, DeploymentLocator, DeploymentState, MemoryPlatform, Platform,
};

use crate::common::sim_registry;

#[tokio::test]
async fn test_second_resolve_uses_cache() {
    let platform = Arc::new(MemoryPlatform::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(platform.clone(), &["alpha", "beta", "gamma"], &counter);

    let owner = registry.get("gamma").await.unwrap();
    let id = owner.deploy(&DeploymentConfig::new("gamma")).await.unwrap();

    let locator = DeploymentLocator::new();
    let (workload, state) = locator.resolve(&registry, &id).await.unwrap();
    assert_eq!(workload.name(), "gamma");
    assert_eq!(state.deployment_id, id);
    // Full scan in registry order: alpha, beta, gamma
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(locator.len(), 1);

    counter.store(0, Ordering::SeqCst);
    let (workload, _) = locator.resolve(&registry, &id).await.unwrap();
    assert_eq!(workload.name(), "gamma");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stale_entry_is_evicted() {
    let platform = Arc::new(MemoryPlatform::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(platform.clone(), &["alpha", "beta"], &counter);

    let id = registry
        .get("beta")
        .await
        .unwrap()
        .deploy(&DeploymentConfig::new("beta"))
        .await
        .unwrap();

    let locator = DeploymentLocator::new();
    assert_eq!(locator.resolve(&registry, &id).await.unwrap().0.name(), "beta");

    // The record moves to another workload behind the locator's back
    platform.delete_deployment_state(&id).await.unwrap();
    platform
        .save_deployment_state(&DeploymentState::new(id.clone(), "alpha"))
        .await
        .unwrap();

    let (workload, state) = locator.resolve(&registry, &id).await.unwrap();
    assert_eq!(workload.name(), "alpha");
    assert_eq!(state.workload_name, "alpha");
    assert_eq!(locator.len(), 1);
}

#[tokio::test]
async fn test_unknown_deployment_is_not_found() {
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(Arc::new(MemoryPlatform::new()), &["alpha", "beta"], &counter);
    let locator = DeploymentLocator::new();

    let err = match locator.resolve(&registry, "dep-missing").await {
        Ok((workload, _)) => panic!("resolved to {}", workload.name()),
        Err(e) => e,
    };
    assert!(err.is_not_found());
    assert!(locator.is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deleted_deployment_is_evicted_and_not_found() {
    let platform = Arc::new(MemoryPlatform::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(platform.clone(), &["alpha", "beta"], &counter);
    let id = registry
        .get("alpha")
        .await
        .unwrap()
        .deploy(&DeploymentConfig::new("alpha"))
        .await
        .unwrap();

    let locator = DeploymentLocator::new();
    locator.resolve(&registry, &id).await.unwrap();
    assert_eq!(locator.len(), 1);

    platform.delete_deployment_state(&id).await.unwrap();
    counter.store(0, Ordering::SeqCst);

    let err = locator.resolve(&registry, &id).await.err().unwrap();
    assert!(err.is_not_found());
    assert!(locator.is_empty());
    // One call to the cached owner, then a scan over alpha and beta
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_forget_drops_entry() {
    let platform = Arc::new(MemoryPlatform::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(platform.clone(), &["alpha"], &counter);
    let id = registry
        .get("alpha")
        .await
        .unwrap()
        .deploy(&DeploymentConfig::new("alpha"))
        .await
        .unwrap();

    let locator = DeploymentLocator::new();
    locator.resolve(&registry, &id).await.unwrap();
    assert_eq!(locator.len(), 1);
    locator.forget(&id);
    assert!(locator.is_empty());
}
