//! Resource ledger, shared types, and error definitions.
//!
//! Foundation crate -- no threads, no I/O.

pub mod error;
pub mod ledger;
pub mod types;

pub use error::{BankerError, BankerResult, InvariantViolation};
pub use ledger::Ledger;
pub use types::{ClientId, Matrix, ResourceVector};
