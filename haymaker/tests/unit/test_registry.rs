//! Registry unit tests

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use haymaker::workloads::registry::StaticWorkloads;
use haymaker::workloads::{
    DeploymentConfig, MemoryPlatform, Platform, Workload, WorkloadRegistry,
};

use crate::common::{sim_registry, SimWorkload};

#[tokio::test]
async fn test_registered_workload_gets_platform_injected() {
    let platform = Arc::new(MemoryPlatform::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(platform.clone(), &["m365"], &counter);

    let workload = registry.get("m365").await.unwrap();
    assert_eq!(workload.name(), "m365");
    assert!(workload.context().platform().is_some());

    // State written through the workload lands in the shared platform
    let id = workload.deploy(&DeploymentConfig::new("m365")).await.unwrap();
    assert!(platform.load_deployment_state(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unknown_name_is_none() {
    let registry = WorkloadRegistry::empty(None);
    assert!(registry.get("nope").await.is_none());
    assert!(registry.list().await.is_empty());
}

#[tokio::test]
async fn test_each_get_builds_a_fresh_instance() {
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(Arc::new(MemoryPlatform::new()), &["a"], &counter);
    let first = registry.get("a").await.unwrap();
    let second = registry.get("a").await.unwrap();
    assert!(!std::ptr::eq(first.context(), second.context()));
}

#[tokio::test]
async fn test_register_overwrites_and_lists_sorted() {
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = sim_registry(Arc::new(MemoryPlatform::new()), &["zeta", "alpha"], &counter);
    let calls = counter.clone();
    registry
        .register("alpha", move |ctx| {
            Ok(Box::new(SimWorkload::new(ctx, calls.clone())) as Box<dyn Workload>)
        })
        .unwrap();
    assert_eq!(registry.list().await, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn test_discovery_merges_sources() {
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let registry = WorkloadRegistry::empty(Some(Arc::new(MemoryPlatform::new())))
        .with_source(StaticWorkloads::new().with("from-source", move |ctx| {
            Ok(Box::new(SimWorkload::new(ctx, calls.clone())) as Box<dyn Workload>)
        }));

    assert_eq!(registry.discover().await, 1);
    assert_eq!(registry.list().await, vec!["from-source"]);
    assert!(registry.get("from-source").await.is_some());
}
