//! Install pipeline tests with scripted clone and install steps

use std::sync::Arc;

use haymaker::errors::HaymakerError;
use haymaker::install::process::ExitOutcome;
use haymaker::workloads::WorkloadRegistry;

use crate::common::{manifest, RecordingInstaller, ScriptedFetcher};

fn registry(
    fetcher: Arc<ScriptedFetcher>,
    installer: Arc<RecordingInstaller>,
) -> WorkloadRegistry {
    WorkloadRegistry::empty(None)
        .with_fetcher(fetcher)
        .with_installer(installer)
}

#[tokio::test]
async fn test_unsafe_package_sources_never_reach_installer() {
    for source in ["../evil", "/etc", "https://x/y", "ftp://x/y"] {
        let fetcher = Arc::new(ScriptedFetcher::with_manifest(manifest("wl", Some(source))));
        let installer = Arc::new(RecordingInstaller::new());
        let registry = registry(fetcher.clone(), installer.clone());

        let err = registry
            .install_from_source_url("https://example.com/wl.git")
            .await
            .unwrap_err();
        assert!(matches!(err, HaymakerError::InstallError(_)), "{}: {}", source, err);
        assert_eq!(installer.call_count(), 0, "{}", source);

        // The clone does not outlive the attempt
        let dest = fetcher.last_destination().unwrap();
        assert!(!dest.exists(), "{}", source);
    }
}

#[tokio::test]
async fn test_local_package_sources_install_once() {
    for (source, suffix) in [(".", ""), ("pkg", "pkg"), ("./pkg/inner", "pkg/inner")] {
        let fetcher = Arc::new(ScriptedFetcher::with_manifest(manifest("wl", Some(source))));
        let installer = Arc::new(RecordingInstaller::new());
        let registry = registry(fetcher.clone(), installer.clone());

        let name = registry
            .install_from_source_url("https://example.com/wl.git")
            .await
            .unwrap();
        assert_eq!(name, "wl");
        assert_eq!(installer.call_count(), 1, "{}", source);

        let installed = installer.calls.lock().unwrap()[0].clone();
        let dest = fetcher.last_destination().unwrap();
        assert!(installed.ends_with(suffix));
        assert!(installed.to_string_lossy().contains("repo"));
        assert!(!dest.exists());
    }
}

#[tokio::test]
async fn test_manifest_without_package_installs_nothing() {
    let fetcher = Arc::new(ScriptedFetcher::with_manifest(manifest("bare", None)));
    let installer = Arc::new(RecordingInstaller::new());
    let name = registry(fetcher, installer.clone())
        .install_from_source_url("git@example.com:org/bare.git")
        .await
        .unwrap();
    assert_eq!(name, "bare");
    assert_eq!(installer.call_count(), 0);
}

#[tokio::test]
async fn test_clone_failures_are_install_errors() {
    for exit in [ExitOutcome::TimedOut, ExitOutcome::Exited(Some(128))] {
        let fetcher = Arc::new(ScriptedFetcher::failing(exit));
        let installer = Arc::new(RecordingInstaller::new());
        let err = registry(fetcher, installer.clone())
            .install_from_source_url("https://example.com/wl.git")
            .await
            .unwrap_err();
        assert!(matches!(err, HaymakerError::InstallError(_)));
        assert_eq!(installer.call_count(), 0);
    }
}

#[tokio::test]
async fn test_installer_failures_are_install_errors() {
    for exit in [ExitOutcome::TimedOut, ExitOutcome::Exited(Some(101))] {
        let fetcher = Arc::new(ScriptedFetcher::with_manifest(manifest("wl", Some("."))));
        let installer = Arc::new(RecordingInstaller::exiting(exit));
        let err = registry(fetcher, installer.clone())
            .install_from_source_url("https://example.com/wl.git")
            .await
            .unwrap_err();
        assert!(matches!(err, HaymakerError::InstallError(_)));
        assert_eq!(installer.call_count(), 1);
    }
}

#[tokio::test]
async fn test_invalid_manifest_is_install_error() {
    let fetcher = Arc::new(ScriptedFetcher::with_manifest(
        "name: base\nversion: 1\ntype: runtime\n",
    ));
    let installer = Arc::new(RecordingInstaller::new());
    let err = registry(fetcher, installer.clone())
        .install_from_source_url("https://example.com/wl.git")
        .await
        .unwrap_err();
    assert!(matches!(err, HaymakerError::InstallError(_)));
    assert_eq!(installer.call_count(), 0);
}

#[tokio::test]
async fn test_install_from_path_runs_installer_on_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("workload.yaml"), manifest("local-wl", Some("."))).unwrap();

    let installer = Arc::new(RecordingInstaller::new());
    let registry = WorkloadRegistry::empty(None).with_installer(installer.clone());
    let name = registry.install_from_path(dir.path()).await.unwrap();
    assert_eq!(name, "local-wl");
    assert_eq!(installer.calls.lock().unwrap().as_slice(), &[dir.path().to_path_buf()]);
}
