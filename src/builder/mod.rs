//! Build steps for source components.
//!
//! - `extract`: unpack downloaded archives
//! - `cmake`: configure, compile and install a CMake tree

pub mod cmake;
pub mod extract;

pub use cmake::{preflight, resolve_jobs, CMakeBuild};
pub use extract::{extract, is_intact, ArchiveKind};
