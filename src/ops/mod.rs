//! High-level operations.
//!
//! This module contains the implementation of jetbuild commands.

pub mod apt;
pub mod install_cuda;
pub mod install_opencv;
pub mod ledger;
pub mod versions;

pub use install_cuda::{install_cuda, verify_cuda, CudaReport};
pub use install_opencv::{install_opencv, InstallOpencvOptions, OpencvInstaller, PipelineReport};
pub use ledger::{Stage, StageLedger, StageRecord};
pub use versions::{format_versions, list_versions, ComponentVersions};
