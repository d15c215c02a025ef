//! Transaction identity and page-level locking for Sable.
//!
//! This crate provides:
//! - Process-wide transaction id allocation
//! - Shared/exclusive page locks under strict two-phase locking
//!
//! The lock manager never blocks. A refused request is reported back to the
//! caller, which decides how long to keep retrying.

mod lock;
mod transaction;

pub use lock::{LockManager, LockMode};
pub use transaction::{Permissions, TransactionId};
