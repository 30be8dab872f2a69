//! Machine-readable event log for a finished run.
//!
//! Two row schemas:
//! - [`EventRow`] — one per arbiter operation, in lock order
//! - [`RunSummaryRow`] — one per run
//!
//! Written as NDJSON through [`json_stream::JsonStreamSink`].

pub mod json_stream;

use crate::client::{ClientEvent, EventKind};
use crate::reporter::RunReport;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Serializable row types
// ---------------------------------------------------------------------------

/// One row per request or release, fully denormalized.
#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub row_type: &'static str,
    pub seq: u64,
    pub client: usize,
    /// `granted`, `denied` or `released`.
    pub outcome: &'static str,
    /// Requested units; for releases, the returned units.
    pub units: Vec<u32>,
    /// Denial kind (`exceeds_need`, `unavailable`, `unsafe`), if denied.
    pub reason: Option<&'static str>,
    /// Human-readable denial detail.
    pub detail: Option<String>,
}

impl From<&ClientEvent> for EventRow {
    fn from(event: &ClientEvent) -> Self {
        let (outcome, units, reason, detail) = match &event.kind {
            EventKind::Granted { request } => ("granted", request.to_vec(), None, None),
            EventKind::Denied { request, reason } => (
                "denied",
                request.to_vec(),
                Some(reason.kind()),
                Some(reason.to_string()),
            ),
            EventKind::Released { returned } => ("released", returned.to_vec(), None, None),
        };
        Self {
            row_type: "event",
            seq: event.seq,
            client: event.client,
            outcome,
            units,
            reason,
            detail,
        }
    }
}

/// One row per run — summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummaryRow {
    pub row_type: &'static str,
    pub clients: u32,
    pub resources: u32,
    pub total: Vec<u32>,
    pub final_available: Vec<u32>,
    pub requests: u64,
    pub grants: u64,
    pub denials: u64,
    pub releases: u32,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Flatten the report into a sink-ready summary row.
    pub fn to_summary_row(&self) -> RunSummaryRow {
        RunSummaryRow {
            row_type: "summary",
            clients: self.clients as u32,
            resources: self.resources as u32,
            total: self.total.clone(),
            final_available: self.final_available.clone(),
            requests: self.attempts,
            grants: self.grants,
            denials: self.denials(),
            releases: self.releases as u32,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Event rows in the order given (callers pass lock-ordered events).
pub fn to_event_rows(events: &[ClientEvent]) -> Vec<EventRow> {
    events.iter().map(EventRow::from).collect()
}
