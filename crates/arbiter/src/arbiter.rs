//! Request/release arbitration over a shared ledger.
//!
//! A single mutex guards the whole ledger. Every request runs its checks,
//! tentative apply, safety check and possible rollback inside one critical
//! section, so no other client can observe or interleave with a half-applied
//! request.

use crate::safety;
use banker_core::{BankerError, BankerResult, ClientId, InvariantViolation, Ledger, ResourceVector};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a request was turned down. The ledger is unchanged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Denial {
    /// The client asked for more than its declared remaining need.
    #[error("resource {resource}: requested {requested} exceeds remaining need {need}")]
    ExceedsNeed {
        resource: usize,
        requested: u32,
        need: u32,
    },

    /// Not enough free units right now.
    #[error("resource {resource}: requested {requested} exceeds available {available}")]
    Unavailable {
        resource: usize,
        requested: u32,
        available: u32,
    },

    /// Granting would leave no order in which every client can finish.
    #[error("granting would leave the system in an unsafe state")]
    Unsafe,
}

impl Denial {
    /// Short label for reports and sinks.
    pub fn kind(&self) -> &'static str {
        match self {
            Denial::ExceedsNeed { .. } => "exceeds_need",
            Denial::Unavailable { .. } => "unavailable",
            Denial::Unsafe => "unsafe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Granted,
    Denied(Denial),
}

impl Decision {
    #[inline]
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

/// Result of one request. `seq` is the operation's position in lock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ruling {
    pub seq: u64,
    pub decision: Decision,
}

/// Result of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub seq: u64,
    pub returned: ResourceVector,
}

// ---------------------------------------------------------------------------
// Arbiter
// ---------------------------------------------------------------------------

struct Inner {
    ledger: Ledger,
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }
}

/// Serializes concurrent requests and releases against one [`Ledger`].
///
/// Share it by reference (`&Arbiter` or `Arc<Arbiter>`); it is `Sync`.
pub struct Arbiter {
    inner: Mutex<Inner>,
    clients: usize,
    resources: usize,
    verify: bool,
}

impl Arbiter {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            clients: ledger.clients(),
            resources: ledger.resources(),
            inner: Mutex::new(Inner { ledger, seq: 0 }),
            verify: false,
        }
    }

    /// Re-checks every invariant before each operation commits. A failing
    /// check returns [`BankerError::Invariant`] and leaves the ledger as it
    /// was.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[inline]
    pub fn clients(&self) -> usize {
        self.clients
    }

    #[inline]
    pub fn resources(&self) -> usize {
        self.resources
    }

    /// Asks for `request[j]` more units of each resource on behalf of `client`.
    ///
    /// Denials come back as `Ok(Ruling { decision: Denied(..), .. })`. `Err` is
    /// reserved for an out-of-range client or a wrongly sized vector, both
    /// rejected before the lock is taken.
    pub fn request(&self, client: ClientId, request: &[u32]) -> BankerResult<Ruling> {
        self.check_client(client)?;
        if request.len() != self.resources {
            return Err(BankerError::DimensionMismatch {
                expected: self.resources,
                got: request.len(),
            });
        }

        let mut inner = self.inner.lock();
        let seq = inner.next_seq();
        let ledger = &mut inner.ledger;

        if let Some(denial) = precheck(ledger, client, request) {
            tracing::debug!(seq, client, ?request, %denial, "request denied");
            return Ok(Ruling {
                seq,
                decision: Decision::Denied(denial),
            });
        }

        ledger.apply_delta(client, request);

        if !safety::is_safe(ledger) {
            ledger.undo_delta(client, request);
            tracing::debug!(seq, client, ?request, "request denied: unsafe, rolled back");
            return Ok(Ruling {
                seq,
                decision: Decision::Denied(Denial::Unsafe),
            });
        }

        if self.verify {
            if let Err(violation) = verify(ledger) {
                ledger.undo_delta(client, request);
                return Err(violation.into());
            }
        }

        tracing::debug!(seq, client, ?request, available = ?ledger.available(), "request granted");
        Ok(Ruling {
            seq,
            decision: Decision::Granted,
        })
    }

    /// Returns everything `client` holds to the shared pool.
    ///
    /// Only valid once the client's need is zero; otherwise the ledger is left
    /// alone and [`BankerError::NeedOutstanding`] is returned.
    pub fn release(&self, client: ClientId) -> BankerResult<Release> {
        self.check_client(client)?;

        let mut inner = self.inner.lock();
        if !inner.ledger.is_satisfied(client) {
            return Err(BankerError::NeedOutstanding { client });
        }

        let seq = inner.next_seq();
        let returned = if self.verify {
            // Commit only a drained copy that passes every check.
            let mut drained = inner.ledger.clone();
            let returned = drained.drain(client);
            verify(&drained)?;
            inner.ledger = drained;
            returned
        } else {
            inner.ledger.drain(client)
        };

        tracing::debug!(seq, client, ?returned, available = ?inner.ledger.available(), "released");
        Ok(Release { seq, returned })
    }

    /// Current remaining need of `client`.
    pub fn need_of(&self, client: ClientId) -> BankerResult<ResourceVector> {
        self.check_client(client)?;
        Ok(self.inner.lock().ledger.need_of(client).iter().copied().collect())
    }

    pub fn is_satisfied(&self, client: ClientId) -> BankerResult<bool> {
        self.check_client(client)?;
        Ok(self.inner.lock().ledger.is_satisfied(client))
    }

    /// Consistent copy of the whole ledger, taken under the lock.
    pub fn snapshot(&self) -> Ledger {
        self.inner.lock().ledger.clone()
    }

    pub fn into_ledger(self) -> Ledger {
        self.inner.into_inner().ledger
    }

    fn check_client(&self, client: ClientId) -> BankerResult<()> {
        if client >= self.clients {
            return Err(BankerError::UnknownClient {
                client,
                clients: self.clients,
            });
        }
        Ok(())
    }
}

/// Per-resource checks before any mutation: need first, then availability.
fn precheck(ledger: &Ledger, client: ClientId, request: &[u32]) -> Option<Denial> {
    let need = ledger.need_of(client);
    let available = ledger.available();
    for (j, &requested) in request.iter().enumerate() {
        if requested > need[j] {
            return Some(Denial::ExceedsNeed {
                resource: j,
                requested,
                need: need[j],
            });
        }
        if requested > available[j] {
            return Some(Denial::Unavailable {
                resource: j,
                requested,
                available: available[j],
            });
        }
    }
    None
}

fn verify(ledger: &Ledger) -> Result<(), InvariantViolation> {
    let result = ledger.check_invariants().and_then(|()| {
        if safety::is_safe(ledger) {
            Ok(())
        } else {
            Err(InvariantViolation::Unsafe)
        }
    });
    if let Err(ref violation) = result {
        tracing::warn!(%violation, "ledger invariant violated");
    }
    result
}
