//! Random initial ledger generation.

use banker_core::{BankerError, BankerResult, Ledger, Matrix, ResourceVector};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAX_CLIENTS: usize = 100;
pub const MAX_RESOURCES: usize = 100;
/// Upper bound on the initial supply of any single resource type.
pub const DEFAULT_MAX_LIMIT: u32 = 15;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub clients: usize,
    pub resources: usize,
    pub max_limit: u32,
    /// Fixed seed for a reproducible ledger. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl BootstrapConfig {
    pub fn new(clients: usize, resources: usize) -> Self {
        Self {
            clients,
            resources,
            max_limit: DEFAULT_MAX_LIMIT,
            seed: None,
        }
    }

    pub fn validate(&self) -> BankerResult<()> {
        if self.clients == 0 || self.clients > MAX_CLIENTS {
            return Err(BankerError::Config(format!(
                "client count must be between 1 and {MAX_CLIENTS}, got {}",
                self.clients
            )));
        }
        if self.resources == 0 || self.resources > MAX_RESOURCES {
            return Err(BankerError::Config(format!(
                "resource count must be between 1 and {MAX_RESOURCES}, got {}",
                self.resources
            )));
        }
        if self.max_limit == 0 {
            return Err(BankerError::Config("max limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Draws `total[j]` in `[1, max_limit]`, then each `max[i][j]` in
/// `[1, total[j]]`.
///
/// Claims are bounded per client against the total, not against each other,
/// so the combined claims may well exceed supply. That is a legal, contended
/// start; the arbiter sorts it out.
pub fn bootstrap(cfg: &BootstrapConfig) -> BankerResult<Ledger> {
    cfg.validate()?;

    let seed = cfg.seed.unwrap_or_else(clock_seed);
    let mut rng = Pcg64::seed_from_u64(seed);

    let supply = Uniform::new_inclusive(1, cfg.max_limit);
    let total: ResourceVector = (0..cfg.resources).map(|_| supply.sample(&mut rng)).collect();

    let claims: Vec<Uniform<u32>> = total.iter().map(|&t| Uniform::new_inclusive(1, t)).collect();
    let mut max = Matrix::zeros(cfg.clients, cfg.resources);
    for i in 0..cfg.clients {
        for (cell, dist) in max.row_mut(i).iter_mut().zip(&claims) {
            *cell = dist.sample(&mut rng);
        }
    }

    tracing::info!(
        clients = cfg.clients,
        resources = cfg.resources,
        seed,
        total = ?total,
        "bootstrapped ledger"
    );

    Ledger::new(total, max)
}

pub(crate) fn clock_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    now.max(1)
}
