//! Safety checker, request arbiter, client driver, report generator, and
//! event sink for the banker's algorithm simulation.

pub mod arbiter;
pub mod bootstrap;
pub mod client;
pub mod reporter;
pub mod safety;
pub mod sink;

pub use arbiter::{Arbiter, Decision, Denial, Release, Ruling};
pub use bootstrap::{bootstrap, BootstrapConfig};
pub use client::{run_clients, ClientConfig, ClientEvent, ClientSummary, EventKind, Simulation};
pub use reporter::{render_ledger, RunReport};
pub use safety::{is_safe, safe_sequence};
