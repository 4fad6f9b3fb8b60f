//! Workload contract, registry and deployment state storage

pub mod base;
pub mod external;
pub mod file_platform;
pub mod ids;
pub mod lifecycle;
pub mod locator;
pub mod manifest;
pub mod memory_platform;
pub mod models;
pub mod platform;
pub mod registry;
pub mod stream;

pub use base::{Workload, WorkloadContext};
pub use file_platform::FilePlatform;
pub use locator::DeploymentLocator;
pub use memory_platform::MemoryPlatform;
pub use models::{CleanupReport, DeploymentConfig, DeploymentState, DeploymentStatus};
pub use platform::Platform;
pub use registry::{WorkloadPlugin, WorkloadRegistry};
