//! jetbuild - provisioning for NVIDIA Jetson boards
//!
//! This crate installs the CUDA stack from apt and builds OpenCV from
//! source, resuming interrupted work from a persisted stage ledger.

pub mod builder;
pub mod core;
pub mod errors;
pub mod net;
pub mod ops;
pub mod util;

/// Test utilities and mocks for jetbuild unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted process runner, a capturing
/// logger, a scripted fetcher and archive fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildWorkspace, ComponentDescriptor, ComponentVersion};
pub use errors::{ProvisionError, Result};
pub use net::{TransferEngine, TransferOutcome, TransferRequest};
pub use util::context::GlobalContext;
