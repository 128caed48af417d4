//! Run-scoped memory of addresses whose connect timed out.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Addresses that already timed out on connect during this run.
///
/// Cloning yields another handle to the same set. Entries are only ever
/// added, so a pair whose address is in here can be skipped without dialing.
#[derive(Debug, Clone, Default)]
pub struct KnownTimeouts {
    inner: Arc<Mutex<HashSet<IpAddr>>>,
}

impl KnownTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `ip`, returning `true` if it was not known yet.
    pub fn insert(&self, ip: IpAddr) -> bool {
        self.lock().insert(ip)
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.lock().contains(ip)
    }

    /// Number of addresses recorded so far.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    // a poisoned lock still guards a valid set
    fn lock(&self) -> MutexGuard<'_, HashSet<IpAddr>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
