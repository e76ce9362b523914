//! Command implementations

pub mod install_cuda;
pub mod install_opencv;
pub mod list_versions;
