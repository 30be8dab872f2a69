//! The resource ledger: available vector plus max/allocation/need matrices.
//!
//! Passive storage. [`Ledger::apply_delta`] and [`Ledger::undo_delta`] do no
//! validation; the arbiter checks a request before touching the ledger.

use crate::error::{BankerError, BankerResult, InvariantViolation};
use crate::types::{ClientId, Matrix, ResourceVector};
use serde::{Deserialize, Serialize};

/// Bookkeeping for `n` clients over `m` resource types.
///
/// `total` is fixed for the run: `available[j] + sum_i allocation[i][j]`
/// always equals `total[j]`. A drained row keeps its `max` as history only;
/// `released` marks those rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    total: ResourceVector,
    available: ResourceVector,
    max: Matrix,
    allocation: Matrix,
    need: Matrix,
    released: Vec<bool>,
}

impl Ledger {
    /// Builds a ledger with nothing allocated: `available = total`, `need = max`.
    ///
    /// Dimensions are validated here once. A client whose declared max exceeds
    /// the total supply of some resource could never finish, so that is
    /// rejected too.
    pub fn new(total: ResourceVector, max: Matrix) -> BankerResult<Self> {
        if max.rows() == 0 {
            return Err(BankerError::InvalidInput("ledger needs at least one client".into()));
        }
        if total.is_empty() {
            return Err(BankerError::InvalidInput(
                "ledger needs at least one resource type".into(),
            ));
        }
        if max.cols() != total.len() {
            return Err(BankerError::DimensionMismatch {
                expected: total.len(),
                got: max.cols(),
            });
        }
        for (i, row) in max.iter_rows().enumerate() {
            for (j, (&claim, &supply)) in row.iter().zip(total.iter()).enumerate() {
                if claim > supply {
                    return Err(BankerError::InvalidInput(format!(
                        "client {i} claims {claim} of resource {j}, only {supply} exist"
                    )));
                }
            }
        }

        Ok(Self {
            available: total.clone(),
            allocation: Matrix::zeros(max.rows(), max.cols()),
            need: max.clone(),
            released: vec![false; max.rows()],
            total,
            max,
        })
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    #[inline]
    pub fn clients(&self) -> usize {
        self.max.rows()
    }

    #[inline]
    pub fn resources(&self) -> usize {
        self.total.len()
    }

    pub fn total(&self) -> &[u32] {
        &self.total
    }

    pub fn available(&self) -> &[u32] {
        &self.available
    }

    pub fn max(&self) -> &Matrix {
        &self.max
    }

    pub fn allocation(&self) -> &Matrix {
        &self.allocation
    }

    pub fn need(&self) -> &Matrix {
        &self.need
    }

    #[inline]
    pub fn need_of(&self, client: ClientId) -> &[u32] {
        self.need.row(client)
    }

    #[inline]
    pub fn allocation_of(&self, client: ClientId) -> &[u32] {
        self.allocation.row(client)
    }

    /// True once the client holds its full declared max, or has released.
    pub fn is_satisfied(&self, client: ClientId) -> bool {
        self.need.row(client).iter().all(|&n| n == 0)
    }

    /// True once the client's row has been drained back to the pool.
    #[inline]
    pub fn is_released(&self, client: ClientId) -> bool {
        self.released[client]
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Moves `delta` units from the shared pool into `client`'s row.
    pub fn apply_delta(&mut self, client: ClientId, delta: &[u32]) {
        let allocation = self.allocation.row_mut(client);
        let need = self.need.row_mut(client);
        for (j, &d) in delta.iter().enumerate() {
            self.available[j] -= d;
            allocation[j] += d;
            need[j] -= d;
        }
    }

    /// Exact inverse of [`Ledger::apply_delta`].
    pub fn undo_delta(&mut self, client: ClientId, delta: &[u32]) {
        let allocation = self.allocation.row_mut(client);
        let need = self.need.row_mut(client);
        for (j, &d) in delta.iter().enumerate() {
            self.available[j] += d;
            allocation[j] -= d;
            need[j] += d;
        }
    }

    /// Returns everything `client` holds to the pool, zeroes its allocation
    /// row and marks the row released. Need is left untouched.
    pub fn drain(&mut self, client: ClientId) -> ResourceVector {
        self.released[client] = true;
        let allocation = self.allocation.row_mut(client);
        let returned: ResourceVector = allocation.iter().copied().collect();
        for (avail, held) in self.available.iter_mut().zip(allocation.iter_mut()) {
            *avail += *held;
            *held = 0;
        }
        returned
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Checks `allocation + need == max` per cell of every live row, that
    /// released rows hold nothing and need nothing, and conservation of units
    /// per resource. Non-negativity is guaranteed by `u32`.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for i in 0..self.clients() {
            let (alloc, need, max) = (self.allocation.row(i), self.need.row(i), self.max.row(i));
            for j in 0..self.resources() {
                if self.released[i] {
                    if alloc[j] != 0 || need[j] != 0 {
                        return Err(InvariantViolation::ReleasedRow {
                            client: i,
                            resource: j,
                            allocation: alloc[j],
                            need: need[j],
                        });
                    }
                    continue;
                }
                if u64::from(alloc[j]) + u64::from(need[j]) != u64::from(max[j]) {
                    return Err(InvariantViolation::AllocationPlusNeed {
                        client: i,
                        resource: j,
                        allocation: alloc[j],
                        need: need[j],
                        max: max[j],
                    });
                }
            }
        }

        for j in 0..self.resources() {
            let allocated = self.allocation.column_sum(j);
            if u64::from(self.available[j]) + allocated != u64::from(self.total[j]) {
                return Err(InvariantViolation::Conservation {
                    resource: j,
                    available: self.available[j],
                    allocated,
                    total: self.total[j],
                });
            }
        }

        Ok(())
    }
}
