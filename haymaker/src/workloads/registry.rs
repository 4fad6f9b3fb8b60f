//! Workload registry
//!
//! Maps workload names to factories. Names are learned from discovery
//! sources (statically linked workloads, installed workload executables,
//! explicit lists) and from direct registration. Every `get` builds a fresh
//! instance with the registry's platform injected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::HaymakerError;
use crate::filesys::dir::Dir;
use crate::install::git::{GitFetcher, SourceFetcher};
use crate::install::package::{CommandInstaller, PackageInstaller};
use crate::install::process::CommandOutcome;
use crate::install::source::resolve_package_source;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workloads::base::{Workload, WorkloadContext};
use crate::workloads::external::ExternalWorkload;
use crate::workloads::ids::validate_workload_name;
use crate::workloads::manifest::load_manifest;
use crate::workloads::platform::Platform;

/// File name prefix of workload executables
pub const EXECUTABLE_PREFIX: &str = "haymaker-workload-";

/// Builds a workload instance from its context
pub type WorkloadFactory =
    Arc<dyn Fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError> + Send + Sync>;

/// A named factory found by a discovery source
#[derive(Clone)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub factory: WorkloadFactory,
}

impl WorkloadDescriptor {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for WorkloadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Somewhere workloads can be discovered from.
///
/// A source reports each candidate separately so one broken candidate does
/// not hide the others.
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(
        &self,
    ) -> Result<Vec<Result<WorkloadDescriptor, HaymakerError>>, HaymakerError>;
}

/// Workload compiled into the binary, collected with `inventory`:
///
/// ```ignore
/// inventory::submit! {
///     WorkloadPlugin::new("m365-knowledge-worker", |ctx| Ok(Box::new(M365::new(ctx))))
/// }
/// ```
pub struct WorkloadPlugin {
    pub name: &'static str,
    pub factory: fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError>,
}

impl WorkloadPlugin {
    pub const fn new(
        name: &'static str,
        factory: fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError>,
    ) -> Self {
        Self { name, factory }
    }
}

inventory::collect!(WorkloadPlugin);

/// Workloads submitted with `inventory::submit!`
#[derive(Debug, Default)]
pub struct LinkedWorkloads;

#[async_trait]
impl WorkloadSource for LinkedWorkloads {
    fn name(&self) -> &str {
        "linked"
    }

    async fn discover(
        &self,
    ) -> Result<Vec<Result<WorkloadDescriptor, HaymakerError>>, HaymakerError> {
        Ok(inventory::iter::<WorkloadPlugin>()
            .map(|plugin| -> Result<WorkloadDescriptor, HaymakerError> {
                validate_workload_name(plugin.name)?;
                let factory = plugin.factory;
                Ok(WorkloadDescriptor::new(plugin.name, factory))
            })
            .collect())
    }
}

/// Installed `haymaker-workload-<name>` executables in a bin directory
#[derive(Debug, Clone)]
pub struct ExecutableWorkloads {
    bin_dir: PathBuf,
    command_timeout: Duration,
}

impl ExecutableWorkloads {
    pub fn new(bin_dir: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            command_timeout,
        }
    }

    fn candidate_name(path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        let name = file_name.strip_prefix(EXECUTABLE_PREFIX)?;
        let name = name
            .strip_suffix(std::env::consts::EXE_SUFFIX)
            .unwrap_or(name);
        Some(name.to_string())
    }

    async fn is_executable(path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path).await else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}

#[async_trait]
impl WorkloadSource for ExecutableWorkloads {
    fn name(&self) -> &str {
        "executables"
    }

    async fn discover(
        &self,
    ) -> Result<Vec<Result<WorkloadDescriptor, HaymakerError>>, HaymakerError> {
        let dir = Dir::new(&self.bin_dir);
        if !dir.exists().await {
            debug!("Workload bin directory {} does not exist", self.bin_dir.display());
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for path in dir.list_entries().await? {
            let Some(name) = Self::candidate_name(&path) else {
                continue;
            };
            if !Self::is_executable(&path).await {
                debug!("Skipping non-executable {}", path.display());
                continue;
            }
            if let Err(e) = validate_workload_name(&name) {
                found.push(Err(HaymakerError::PluginError(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
                continue;
            }

            let timeout = self.command_timeout;
            found.push(Ok(WorkloadDescriptor::new(name, move |ctx| {
                Ok(Box::new(ExternalWorkload::new(ctx, path.clone(), timeout)) as Box<dyn Workload>)
            })));
        }
        Ok(found)
    }
}

/// A fixed list of descriptors
#[derive(Debug, Default, Clone)]
pub struct StaticWorkloads {
    descriptors: Vec<WorkloadDescriptor>,
}

impl StaticWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError> + Send + Sync + 'static,
    {
        self.descriptors.push(WorkloadDescriptor::new(name, factory));
        self
    }
}

#[async_trait]
impl WorkloadSource for StaticWorkloads {
    fn name(&self) -> &str {
        "static"
    }

    async fn discover(
        &self,
    ) -> Result<Vec<Result<WorkloadDescriptor, HaymakerError>>, HaymakerError> {
        Ok(self
            .descriptors
            .iter()
            .map(|d| -> Result<WorkloadDescriptor, HaymakerError> {
                validate_workload_name(&d.name)?;
                Ok(d.clone())
            })
            .collect())
    }
}

/// Time limits for the install pipeline
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub clone_timeout: Duration,
    pub install_timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            clone_timeout: Duration::from_secs(120),
            install_timeout: Duration::from_secs(300),
        }
    }
}

/// Name to factory map fed by discovery sources
pub struct WorkloadRegistry {
    platform: Option<Arc<dyn Platform>>,
    sources: Vec<Box<dyn WorkloadSource>>,
    fetcher: Arc<dyn SourceFetcher>,
    installer: Arc<dyn PackageInstaller>,
    options: InstallOptions,
    workloads: RwLock<BTreeMap<String, WorkloadFactory>>,
}

impl WorkloadRegistry {
    /// Registry over linked workloads, installing with `git` and `cargo`
    pub fn new(platform: Option<Arc<dyn Platform>>) -> Self {
        let layout = StorageLayout::default();
        Self {
            platform,
            sources: vec![Box::new(LinkedWorkloads)],
            fetcher: Arc::new(GitFetcher::default()),
            installer: Arc::new(CommandInstaller::cargo(layout.base_dir)),
            options: InstallOptions::default(),
            workloads: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry wired from settings: linked workloads plus executables in
    /// `<install_root>/bin`, the directory packages are installed into
    pub fn from_settings(
        layout: &StorageLayout,
        settings: &Settings,
        platform: Option<Arc<dyn Platform>>,
    ) -> Self {
        let bin_dir = settings.bin_dir(layout);
        let install_root = settings.install_root(layout);

        let install = &settings.install;
        Self::new(platform)
            .with_source(ExecutableWorkloads::new(
                bin_dir,
                Duration::from_secs(settings.plugin_timeout_secs),
            ))
            .with_fetcher(Arc::new(GitFetcher::new(&install.git_program)))
            .with_installer(Arc::new(CommandInstaller::new(
                &install.installer_program,
                install.installer_args.clone(),
                install_root,
            )))
            .with_options(InstallOptions {
                clone_timeout: Duration::from_secs(install.clone_timeout_secs),
                install_timeout: Duration::from_secs(install.install_timeout_secs),
            })
    }

    /// Registry with no discovery sources
    pub fn empty(platform: Option<Arc<dyn Platform>>) -> Self {
        let mut registry = Self::new(platform);
        registry.sources.clear();
        registry
    }

    pub fn with_source(mut self, source: impl WorkloadSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.installer = installer;
        self
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn platform(&self) -> Option<&Arc<dyn Platform>> {
        self.platform.as_ref()
    }

    /// Run every source and record what they find. Returns the number of
    /// workloads recorded in this pass.
    pub async fn discover(&self) -> usize {
        let mut found = Vec::new();
        for source in &self.sources {
            match source.discover().await {
                Ok(candidates) => {
                    for candidate in candidates {
                        match candidate {
                            Ok(descriptor) => found.push(descriptor),
                            Err(e) => warn!(
                                "Skipping workload from source {}: {}",
                                source.name(),
                                e
                            ),
                        }
                    }
                }
                Err(e) => warn!("Workload source {} failed: {}", source.name(), e),
            }
        }

        let count = found.len();
        let mut workloads = self.workloads.write().unwrap_or_else(|e| e.into_inner());
        for descriptor in found {
            debug!("Discovered workload {}", descriptor.name);
            workloads.insert(descriptor.name, descriptor.factory);
        }
        count
    }

    async fn ensure_discovered(&self) {
        let empty = self
            .workloads
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty();
        if empty {
            self.discover().await;
        }
    }

    /// New instance of a workload, or `None` if unknown or it fails to build
    pub async fn get(&self, name: &str) -> Option<Box<dyn Workload>> {
        self.ensure_discovered().await;

        let factory = self
            .workloads
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()?;

        let ctx = match WorkloadContext::new(name, self.platform.clone()) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("Cannot build context for workload {}: {}", name, e);
                return None;
            }
        };

        match factory(ctx) {
            Ok(workload) => Some(workload),
            Err(e) => {
                warn!("Failed to instantiate workload {}: {}", name, e);
                None
            }
        }
    }

    /// Registered names, sorted
    pub async fn list(&self) -> Vec<String> {
        self.ensure_discovered().await;
        self.workloads
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Register a factory directly, replacing any previous one for `name`
    pub fn register<F>(&self, name: &str, factory: F) -> Result<(), HaymakerError>
    where
        F: Fn(WorkloadContext) -> Result<Box<dyn Workload>, HaymakerError> + Send + Sync + 'static,
    {
        validate_workload_name(name)?;
        self.workloads
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::new(factory));
        debug!("Registered workload {}", name);
        Ok(())
    }

    /// Install a workload package from a local directory; returns its name
    pub async fn install_from_path(&self, path: &Path) -> Result<String, HaymakerError> {
        let is_dir = fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(HaymakerError::InstallError(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let manifest = load_manifest(path).await?;
        info!(
            "Installing workload {} {} from {}",
            manifest.name,
            manifest.version,
            path.display()
        );
        self.run_installer(path).await?;

        self.discover().await;
        Ok(manifest.name)
    }

    /// Clone a workload repository and install the package its manifest
    /// points at; returns the workload name
    pub async fn install_from_source_url(&self, url: &str) -> Result<String, HaymakerError> {
        let url = url.trim();
        if url.is_empty() || url.starts_with('-') {
            return Err(HaymakerError::InstallError(format!(
                "invalid repository url: {:?}",
                url
            )));
        }

        let tmp = tempfile::Builder::new()
            .prefix("haymaker-install-")
            .tempdir()?;
        let clone_dir = tmp.path().join("repo");

        let outcome = self
            .fetcher
            .fetch(url, &clone_dir, self.options.clone_timeout)
            .await?;
        if outcome.timed_out() {
            return Err(HaymakerError::InstallError(format!(
                "clone of {} timed out after {}s",
                url,
                self.options.clone_timeout.as_secs()
            )));
        }
        if !outcome.success() {
            debug!("Clone stderr: {}", outcome.stderr);
            return Err(HaymakerError::InstallError(format!(
                "failed to clone {}: {}",
                url,
                exit_description(&outcome)
            )));
        }

        let manifest = load_manifest(&clone_dir).await?;
        match &manifest.package {
            Some(package) => {
                let package_dir = resolve_package_source(&clone_dir, &package.source)?;
                info!(
                    "Installing workload {} {} from {}",
                    manifest.name, manifest.version, url
                );
                self.run_installer(&package_dir).await?;
            }
            None => warn!(
                "Manifest for {} declares no package; nothing installed",
                manifest.name
            ),
        }

        if let Err(e) = tmp.close() {
            warn!("Failed to remove clone directory: {}", e);
        }

        self.discover().await;
        Ok(manifest.name)
    }

    async fn run_installer(&self, path: &Path) -> Result<(), HaymakerError> {
        let limit = self.options.install_timeout;
        let outcome = self.installer.install(path, limit).await?;
        if outcome.timed_out() {
            return Err(HaymakerError::InstallError(format!(
                "package installation timed out after {}s",
                limit.as_secs()
            )));
        }
        if !outcome.success() {
            debug!("Installer stderr: {}", outcome.stderr);
            return Err(HaymakerError::InstallError(format!(
                "package installation failed: {}",
                exit_description(&outcome)
            )));
        }
        Ok(())
    }
}

fn exit_description(outcome: &CommandOutcome) -> String {
    match outcome.code() {
        Some(code) => format!("{} exited with code {}", outcome.program, code),
        None => format!("{} was terminated", outcome.program),
    }
}
