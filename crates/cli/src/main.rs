//! CLI for the banker's algorithm resource allocation simulation.
//!
//! Pipeline: bootstrap ledger -> spawn clients -> join -> report.

use banker_arbiter::bootstrap::{DEFAULT_MAX_LIMIT, MAX_CLIENTS, MAX_RESOURCES};
use banker_arbiter::sink::json_stream::JsonStreamSink;
use banker_arbiter::{
    bootstrap, render_ledger, run_clients, Arbiter, BootstrapConfig, ClientConfig, ClientEvent,
    EventKind, RunReport,
};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "banker",
    version,
    about = "Deadlock-avoiding resource allocation simulation (banker's algorithm)"
)]
struct Cli {
    /// Number of concurrent clients.
    #[arg(value_parser = clap::value_parser!(u16).range(1..=MAX_CLIENTS as i64))]
    clients: u16,

    /// Number of resource types.
    #[arg(value_parser = clap::value_parser!(u16).range(1..=MAX_RESOURCES as i64))]
    resources: u16,

    /// Upper bound for the initial supply of each resource type.
    #[arg(long, default_value_t = DEFAULT_MAX_LIMIT, env = "BANKER_MAX_LIMIT")]
    max_limit: u32,

    /// Seed for a reproducible run.
    #[arg(long, env = "BANKER_SEED")]
    seed: Option<u64>,

    /// Milliseconds a client holds a grant before its next step.
    #[arg(long, default_value_t = 0)]
    hold_ms: u64,

    /// Milliseconds a client waits after a denial before retrying.
    #[arg(long, default_value_t = 0)]
    backoff_ms: u64,

    /// Print the full ledger after every request and release.
    #[arg(long, default_value_t = false)]
    trace_state: bool,

    /// Re-check ledger invariants after every committed operation.
    #[arg(long, default_value_t = false)]
    verify: bool,

    #[arg(long, default_value_t = false)]
    json: bool,

    /// Sink output: "ndjson" writes NDJSON to stdout,
    /// "ndjson:/path/to/file" writes to file.
    #[arg(long)]
    sink: Option<String>,
}

/// Where ledger dumps and trace lines go. Machine-readable output owns
/// stdout whenever it is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HumanOutput {
    Stdout,
    Stderr,
    Off,
}

impl HumanOutput {
    fn emit(self, text: &str) {
        match self {
            HumanOutput::Stdout => print!("{text}"),
            HumanOutput::Stderr => eprint!("{text}"),
            HumanOutput::Off => {}
        }
    }
}

impl Cli {
    fn human_output(&self) -> HumanOutput {
        if self.json {
            HumanOutput::Off
        } else if self.sink.is_some() {
            HumanOutput::Stderr
        } else {
            HumanOutput::Stdout
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // 1. Bootstrap the ledger.
    let boot = BootstrapConfig {
        clients: cli.clients.into(),
        resources: cli.resources.into(),
        max_limit: cli.max_limit,
        seed: cli.seed,
    };
    let ledger = bootstrap(&boot)?;
    let human = cli.human_output();
    human.emit(&render_ledger(&ledger));

    // 2. Run the clients to completion.
    let arbiter = Arbiter::new(ledger).with_verification(cli.verify);
    let client_cfg = ClientConfig {
        hold: Duration::from_millis(cli.hold_ms),
        backoff: Duration::from_millis(cli.backoff_ms),
        seed: cli.seed,
    };

    let trace_state = cli.trace_state && human != HumanOutput::Off;
    let observer = |event: &ClientEvent| {
        if !trace_state {
            return;
        }
        let line = match &event.kind {
            EventKind::Granted { request } => {
                format!(": client {} granted {:?}", event.client, request.as_slice())
            }
            EventKind::Denied { request, reason } => format!(
                ": client {} denied {:?} ({})",
                event.client,
                request.as_slice(),
                reason
            ),
            EventKind::Released { returned } => {
                format!(": client {} finished, released {:?}", event.client, returned.as_slice())
            }
        };
        // One write per event keeps concurrent dumps from interleaving.
        human.emit(&format!("{line}\n{}", render_ledger(&arbiter.snapshot())));
    };

    let sim = run_clients(&arbiter, &client_cfg, &observer)?;

    // 3. Report.
    let final_ledger = arbiter.into_ledger();
    let report = RunReport::build(&sim, &final_ledger);
    tracing::info!(
        requests = report.attempts,
        grants = report.grants,
        denials = report.denials(),
        drained = report.fully_drained(),
        "simulation complete"
    );

    if let Some(ref sink_spec) = cli.sink {
        let rows = banker_arbiter::sink::to_event_rows(&sim.events);
        let summary = report.to_summary_row();

        if sink_spec == "ndjson" {
            let mut s = JsonStreamSink::stdout();
            s.write_events(&rows)?;
            s.write_summary(&summary)?;
            let n = s.finish()?;
            tracing::info!(rows = n, "ndjson sink: wrote to stdout");
        } else if let Some(path) = sink_spec.strip_prefix("ndjson:") {
            let file = std::fs::File::create(path)?;
            let mut s = JsonStreamSink::new(file);
            s.write_events(&rows)?;
            s.write_summary(&summary)?;
            let n = s.finish()?;
            tracing::info!(rows = n, path, "ndjson sink: wrote to file");
        } else {
            eprintln!("Unknown sink: {}. Use 'ndjson' or 'ndjson:/path'", sink_spec);
        }

        eprint!("{}", report.render());
    } else if cli.json {
        let out = serde_json::json!({
            "report": report,
            "ledger": final_ledger,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render_ledger(&final_ledger));
        print!("{}", report.render());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("banker").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn sink_moves_ledger_dumps_off_stdout() {
        let cli = parse(&["4", "3", "--sink", "ndjson", "--trace-state"]);
        assert_eq!(cli.human_output(), HumanOutput::Stderr);

        let cli = parse(&["4", "3", "--sink", "ndjson:/tmp/run.ndjson"]);
        assert_eq!(cli.human_output(), HumanOutput::Stderr);
    }

    #[test]
    fn json_silences_ledger_dumps() {
        assert_eq!(parse(&["4", "3", "--json"]).human_output(), HumanOutput::Off);
    }

    #[test]
    fn plain_run_dumps_to_stdout() {
        assert_eq!(parse(&["4", "3"]).human_output(), HumanOutput::Stdout);
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        assert!(Cli::try_parse_from(["banker", "0", "3"]).is_err());
        assert!(Cli::try_parse_from(["banker", "4", "101"]).is_err());
    }
}
