//! Verified artifact transfers.
//!
//! [`TransferEngine`] streams a remote file to disk, resumes partial files
//! with range requests, retries transient failures with exponential backoff
//! and checks the result against an expected SHA-256 digest.

pub mod request;
pub mod retry;
pub mod transfer;

pub use request::{TransferOutcome, TransferRequest};
pub use retry::RetryPolicy;
pub use transfer::{Fetch, TransferConfig, TransferEngine};
