//! Workload package installation plumbing

pub mod git;
pub mod package;
pub mod process;
pub mod source;
