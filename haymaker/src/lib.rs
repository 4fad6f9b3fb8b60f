//! Haymaker Library
//!
//! Workload lifecycle core: the workload contract, a registry that discovers
//! and installs workloads, file-backed deployment state, and the deployment
//! locator used by the command line.

pub mod driver;
pub mod errors;
pub mod filesys;
pub mod install;
pub mod logs;
pub mod storage;
pub mod utils;
pub mod workloads;
