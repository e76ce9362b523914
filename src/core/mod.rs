//! Core data structures for jetbuild.
//!
//! - Component versions and descriptors
//! - Board architecture detection
//! - The on-disk build workspace

pub mod arch;
pub mod component;
pub mod version;
pub mod workspace;

pub use arch::CudaArch;
pub use component::{ComponentDescriptor, DEFAULT_OPENCV_VERSION};
pub use version::ComponentVersion;
pub use workspace::BuildWorkspace;
