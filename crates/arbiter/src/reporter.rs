//! Human-readable ledger dumps and end-of-run reports.

use crate::client::{ClientSummary, Simulation};
use banker_core::{Ledger, Matrix};
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

/// Renders the available vector and the max/allocation/need matrices.
pub fn render_ledger(ledger: &Ledger) -> String {
    let mut out = String::new();

    out.push_str("\t== LEDGER ==\n");
    out.push_str("Available\n\t   res: ");
    for j in 0..ledger.resources() {
        let _ = write!(out, " {j:>3} ");
    }
    out.push_str("\n\t        ");
    for a in ledger.available() {
        let _ = write!(out, " {a:>3} ");
    }
    out.push('\n');

    render_matrix(&mut out, "Max", ledger.max());
    render_matrix(&mut out, "Allocation", ledger.allocation());
    render_matrix(&mut out, "Need", ledger.need());

    out.push_str("========================\n");
    out
}

fn render_matrix(out: &mut String, title: &str, matrix: &Matrix) {
    out.push_str(title);
    out.push('\n');
    for (i, row) in matrix.iter_rows().enumerate() {
        let _ = write!(out, "\tc{i:<3} [ ");
        for v in row {
            let _ = write!(out, " {v:>3} ");
        }
        out.push_str(" ]\n");
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub clients: usize,
    pub resources: usize,
    pub total: Vec<u32>,
    pub final_available: Vec<u32>,
    pub attempts: u64,
    pub grants: u64,
    pub over_need: u64,
    pub unavailable: u64,
    #[serde(rename = "unsafe")]
    pub unsafe_: u64,
    pub releases: usize,
    pub elapsed_ms: u64,
    pub per_client: Vec<ClientSummary>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn build(sim: &Simulation, final_ledger: &Ledger) -> Self {
        let sum = |f: fn(&ClientSummary) -> u64| sim.summaries.iter().map(f).sum::<u64>();

        Self {
            clients: final_ledger.clients(),
            resources: final_ledger.resources(),
            total: final_ledger.total().to_vec(),
            final_available: final_ledger.available().to_vec(),
            attempts: sum(|s| s.attempts),
            grants: sum(|s| s.grants),
            over_need: sum(|s| s.over_need),
            unavailable: sum(|s| s.unavailable),
            unsafe_: sum(|s| s.unsafe_),
            releases: sim.summaries.iter().filter(|s| s.finished).count(),
            elapsed_ms: sim.elapsed.as_millis() as u64,
            per_client: sim.summaries.clone(),
            elapsed: sim.elapsed,
        }
    }

    pub fn denials(&self) -> u64 {
        self.over_need + self.unavailable + self.unsafe_
    }

    /// True when every client finished and every unit is back in the pool.
    pub fn fully_drained(&self) -> bool {
        self.releases == self.clients && self.final_available == self.total
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                  BANKER SIMULATION REPORT                    ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        row(&mut out, "Clients:", &self.clients.to_string());
        row(&mut out, "Resource types:", &self.resources.to_string());
        row(&mut out, "Total units:", &format!("{:?}", self.total));
        row(&mut out, "Requests:", &self.attempts.to_string());
        row(&mut out, "Granted:", &self.grants.to_string());
        row(&mut out, "Denied (over need):", &self.over_need.to_string());
        row(&mut out, "Denied (unavailable):", &self.unavailable.to_string());
        row(&mut out, "Denied (unsafe):", &self.unsafe_.to_string());
        row(&mut out, "Releases:", &self.releases.to_string());
        row(&mut out, "Final available:", &format!("{:?}", self.final_available));
        row(&mut out, "Elapsed:", &format!("{:?}", self.elapsed));
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str("║  client  attempts  grants   over  unavail  unsafe  finished  ║\n");

        for s in &self.per_client {
            let _ = writeln!(
                out,
                "║  {:>6}  {:>8}  {:>6}  {:>5}  {:>7}  {:>6}  {:>8}  ║",
                s.client,
                s.attempts,
                s.grants,
                s.over_need,
                s.unavailable,
                s.unsafe_,
                if s.finished { "yes" } else { "no" },
            );
        }

        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

fn row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "║  {label:<22}{value:>38} ║");
}
