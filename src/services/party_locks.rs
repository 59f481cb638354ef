use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex};

use tracing::trace;

use crate::error::{AppError, AppResult};

/// In-process registry serializing generation runs that share a tutor or student.
///
/// A run claims all of its parties at once, so two runs can never each hold
/// one party while waiting on the other.
#[derive(Debug, Default)]
pub struct PartyLocks {
    busy: Mutex<HashSet<String>>,
    released: Condvar,
}

impl PartyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until none of `parties` is held by another run.
    pub fn acquire(&self, parties: &[&str]) -> AppResult<PartyLease<'_>> {
        let wanted: BTreeSet<String> = parties.iter().map(|party| party.to_string()).collect();

        let mut busy = self
            .busy
            .lock()
            .map_err(|_| AppError::other("party lock registry poisoned"))?;
        while wanted.iter().any(|party| busy.contains(party)) {
            trace!(target: "app::scheduler", parties = ?wanted, "waiting for party lock");
            busy = self
                .released
                .wait(busy)
                .map_err(|_| AppError::other("party lock registry poisoned"))?;
        }
        busy.extend(wanted.iter().cloned());

        Ok(PartyLease {
            locks: self,
            parties: wanted,
        })
    }

    pub fn is_held(&self, party: &str) -> bool {
        self.busy
            .lock()
            .map(|busy| busy.contains(party))
            .unwrap_or(false)
    }
}

/// Releases its parties on drop.
#[derive(Debug)]
pub struct PartyLease<'a> {
    locks: &'a PartyLocks,
    parties: BTreeSet<String>,
}

impl Drop for PartyLease<'_> {
    fn drop(&mut self) {
        // A poisoned registry still gets its entries cleared.
        let mut busy = match self.locks.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for party in &self.parties {
            busy.remove(party);
        }
        drop(busy);
        self.locks.released.notify_all();
    }
}
