//! Safe-state check over a ledger.

use banker_core::{ClientId, Ledger};

/// Finds an order in which every client can run to completion.
///
/// Greedy reduction: starting from `work = available`, repeatedly pick the
/// first unfinished client whose whole remaining need fits in `work`, credit
/// its allocation back to `work`, and rescan from the top. Stops when a full
/// pass finishes nobody.
///
/// Which order comes out depends on scan order; whether one exists does not.
/// Works on local copies only, the ledger is never touched.
pub fn safe_sequence(ledger: &Ledger) -> Option<Vec<ClientId>> {
    let n = ledger.clients();
    let mut work: Vec<u64> = ledger.available().iter().map(|&a| u64::from(a)).collect();
    let mut finish = vec![false; n];
    let mut order = Vec::with_capacity(n);

    'scan: loop {
        for i in 0..n {
            if finish[i] {
                continue;
            }
            let fits = ledger
                .need_of(i)
                .iter()
                .zip(&work)
                .all(|(&need, &w)| u64::from(need) <= w);
            if fits {
                for (w, &held) in work.iter_mut().zip(ledger.allocation_of(i)) {
                    *w += u64::from(held);
                }
                finish[i] = true;
                order.push(i);
                continue 'scan;
            }
        }
        break;
    }

    (order.len() == n).then_some(order)
}

/// True iff some completion order exists for every client.
#[inline]
pub fn is_safe(ledger: &Ledger) -> bool {
    safe_sequence(ledger).is_some()
}
