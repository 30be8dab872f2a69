//! Client driver: one thread per client, each hammering the arbiter with
//! random requests until its need is met, then releasing.
//!
//! Retry cadence lives here, not in the arbiter. A denied client sleeps for
//! `backoff` (possibly zero) and tries again with a fresh request.
//!
//! A client that fails or panics may still hold units nobody else can get
//! back, so it raises a shared abort flag and every other client stops at its
//! next attempt.

use crate::arbiter::{Arbiter, Decision, Denial};
use crate::bootstrap::clock_seed;
use banker_core::{BankerError, BankerResult, ClientId, ResourceVector};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// How long a client sits on a grant before its next step.
    pub hold: Duration,
    /// Pause after a denial before retrying.
    pub backoff: Duration,
    /// Base seed; client `i` uses a stream derived from `(seed, i)`.
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Events and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Granted { request: ResourceVector },
    Denied { request: ResourceVector, reason: Denial },
    Released { returned: ResourceVector },
}

/// One arbiter operation as seen by a client. `seq` orders events globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEvent {
    pub seq: u64,
    pub client: ClientId,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    pub client: ClientId,
    pub attempts: u64,
    pub grants: u64,
    pub over_need: u64,
    pub unavailable: u64,
    #[serde(rename = "unsafe")]
    pub unsafe_: u64,
    pub finished: bool,
}

impl ClientSummary {
    pub fn denials(&self) -> u64 {
        self.over_need + self.unavailable + self.unsafe_
    }

    fn record(&mut self, denial: &Denial) {
        match denial {
            Denial::ExceedsNeed { .. } => self.over_need += 1,
            Denial::Unavailable { .. } => self.unavailable += 1,
            Denial::Unsafe => self.unsafe_ += 1,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Indexed by client id.
    pub summaries: Vec<ClientSummary>,
    /// All events, in lock order.
    pub events: Vec<ClientEvent>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Spawns one named thread per client and joins them all.
///
/// `observer` sees every event as it happens, from the client's own thread.
/// If any client returns an error or panics, the rest stop early and that
/// first failure is returned.
pub fn run_clients<F>(arbiter: &Arbiter, cfg: &ClientConfig, observer: &F) -> BankerResult<Simulation>
where
    F: Fn(&ClientEvent) + Sync,
{
    let base_seed = cfg.seed.unwrap_or_else(clock_seed);
    let t0 = Instant::now();

    tracing::info!(clients = arbiter.clients(), base_seed, "starting clients");

    let abort = AtomicBool::new(false);
    let abort = &abort;

    let results: Vec<BankerResult<(ClientSummary, Vec<ClientEvent>)>> = thread::scope(|s| {
        let mut handles = Vec::with_capacity(arbiter.clients());
        for client in 0..arbiter.clients() {
            let handle = thread::Builder::new()
                .name(format!("client-{client}"))
                .spawn_scoped(s, move || {
                    let guard = AbortGuard::new(abort);
                    let rng = Pcg64::seed_from_u64(client_seed(base_seed, client));
                    let result = ClientLoop::new(arbiter, client, cfg, rng, abort).run(observer);
                    if result.is_ok() {
                        guard.disarm();
                    }
                    result
                })
                .map_err(|e| {
                    abort.store(true, Ordering::Release);
                    BankerError::Internal(format!("failed to spawn client {client}: {e}"))
                });
            handles.push(handle);
        }

        handles
            .into_iter()
            .enumerate()
            .map(|(client, handle)| {
                handle?.join().map_err(|_| {
                    BankerError::Internal(format!("client {client} thread panicked"))
                })?
            })
            .collect()
    });

    let mut summaries = Vec::with_capacity(results.len());
    let mut events = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok((summary, client_events)) => {
                summaries.push(summary);
                events.extend(client_events);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        // Clients that only stopped because of the flag are not the cause.
        let first = errors
            .iter()
            .position(|e| !matches!(e, BankerError::Aborted { .. }))
            .unwrap_or(0);
        let failed = errors.len();
        let err = errors.swap_remove(first);
        tracing::error!(%err, failed, "client run aborted");
        return Err(err);
    }

    events.sort_unstable_by_key(|e| e.seq);

    let elapsed = t0.elapsed();
    tracing::info!(
        events = events.len(),
        elapsed_ms = elapsed.as_millis(),
        "all clients finished"
    );

    Ok(Simulation {
        summaries,
        events,
        elapsed,
    })
}

/// Mixes the client index into the base seed so streams differ per client.
fn client_seed(base: u64, client: ClientId) -> u64 {
    base ^ (client as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Raises the abort flag when dropped, unless disarmed. Runs on unwind too.
struct AbortGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> AbortGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

struct ClientLoop<'a> {
    arbiter: &'a Arbiter,
    client: ClientId,
    cfg: &'a ClientConfig,
    rng: Pcg64,
    abort: &'a AtomicBool,
    summary: ClientSummary,
    events: Vec<ClientEvent>,
}

impl<'a> ClientLoop<'a> {
    fn new(
        arbiter: &'a Arbiter,
        client: ClientId,
        cfg: &'a ClientConfig,
        rng: Pcg64,
        abort: &'a AtomicBool,
    ) -> Self {
        Self {
            arbiter,
            client,
            cfg,
            rng,
            abort,
            summary: ClientSummary {
                client,
                ..Default::default()
            },
            events: Vec::new(),
        }
    }

    fn run<F>(mut self, observer: &F) -> BankerResult<(ClientSummary, Vec<ClientEvent>)>
    where
        F: Fn(&ClientEvent) + Sync,
    {
        loop {
            if self.abort.load(Ordering::Acquire) {
                tracing::debug!(client = self.client, "client stopping: run aborted");
                return Err(BankerError::Aborted {
                    client: self.client,
                });
            }

            let need = self.arbiter.need_of(self.client)?;
            let request = random_request(&need, &mut self.rng);
            self.summary.attempts += 1;

            let ruling = self.arbiter.request(self.client, &request)?;
            let kind = match ruling.decision {
                Decision::Granted => {
                    self.summary.grants += 1;
                    EventKind::Granted { request }
                }
                Decision::Denied(reason) => {
                    self.summary.record(&reason);
                    EventKind::Denied { request, reason }
                }
            };
            self.emit(ruling.seq, kind, observer);

            if !ruling.decision.is_granted() {
                pause(self.cfg.backoff);
                continue;
            }

            pause(self.cfg.hold);

            if self.arbiter.is_satisfied(self.client)? {
                let release = self.arbiter.release(self.client)?;
                self.emit(
                    release.seq,
                    EventKind::Released {
                        returned: release.returned,
                    },
                    observer,
                );
                self.summary.finished = true;
                tracing::info!(
                    client = self.client,
                    attempts = self.summary.attempts,
                    "client finished"
                );
                return Ok((self.summary, self.events));
            }
        }
    }

    fn emit<F>(&mut self, seq: u64, kind: EventKind, observer: &F)
    where
        F: Fn(&ClientEvent) + Sync,
    {
        let event = ClientEvent {
            seq,
            client: self.client,
            kind,
        };
        observer(&event);
        self.events.push(event);
    }
}

/// Draws each `req[j]` uniformly from `[0, need[j]]`.
pub fn random_request<R: rand::Rng>(need: &[u32], rng: &mut R) -> ResourceVector {
    need.iter()
        .map(|&n| Uniform::new_inclusive(0, n).sample(rng))
        .collect()
}

fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
