//! Canonical messenger cache
//!
//! Holds at most one open messenger per destination. The cache owns its
//! messengers; a background reaper closes self-destructing messengers whose
//! transport reports idle and evicts every closed entry. Messengers are torn
//! down by explicit eviction, never by being forgotten.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};
use wirenet_core::{EndpointAddress, MessengerCacheConfig};

use super::blocking::BlockingMessenger;
use super::Messenger;

struct CacheShared {
    entries: Mutex<HashMap<EndpointAddress, Arc<BlockingMessenger>>>,
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Per-destination canonical messengers with idle reaping
pub struct MessengerCache {
    shared: Arc<CacheShared>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl MessengerCache {
    /// Create the cache and start its reaper thread
    pub fn new(config: &MessengerCacheConfig) -> Self {
        let shared = Arc::new(CacheShared {
            entries: Mutex::new(HashMap::new()),
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });

        let weak = Arc::downgrade(&shared);
        let period = config.reaper_period;
        let reaper = thread::Builder::new()
            .name("messenger-idle-reaper".to_string())
            .spawn(move || IdleReaper { cache: weak }.run(period));

        let reaper = match reaper {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, "Could not start messenger reaper; idle messengers will not be closed");
                None
            }
        };

        Self {
            shared,
            reaper: Mutex::new(reaper),
        }
    }

    /// Open messenger for `addr`; a closed entry is evicted on the way
    pub fn get(&self, addr: &EndpointAddress) -> Option<Arc<BlockingMessenger>> {
        let mut entries = self.shared.entries.lock();
        match entries.get(addr) {
            Some(messenger) if !messenger.is_closed() => Some(messenger.clone()),
            Some(_) => {
                entries.remove(addr);
                None
            }
            None => None,
        }
    }

    /// Insert `messenger` unless an open one is already cached; returns the
    /// canonical messenger for `addr`.
    pub fn insert(
        &self,
        addr: EndpointAddress,
        messenger: Arc<BlockingMessenger>,
    ) -> Arc<BlockingMessenger> {
        let mut entries = self.shared.entries.lock();
        if let Some(existing) = entries.get(&addr) {
            if !existing.is_closed() {
                return existing.clone();
            }
        }
        debug!(destination = %addr, "Caching messenger");
        entries.insert(addr, messenger.clone());
        messenger
    }

    /// Remove the entry for `addr` without closing it
    pub fn remove(&self, addr: &EndpointAddress) -> Option<Arc<BlockingMessenger>> {
        self.shared.entries.lock().remove(addr)
    }

    pub fn contains(&self, addr: &EndpointAddress) -> bool {
        self.get(addr).is_some()
    }

    /// Destinations currently cached, open or not
    pub fn destinations(&self) -> Vec<EndpointAddress> {
        self.shared.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One reaper pass; returns the number of evicted entries
    pub fn reap(&self) -> usize {
        reap_entries(&self.shared)
    }

    /// Stop the reaper thread and close every cached messenger
    pub fn shutdown(&self) {
        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();

        if let Some(handle) = self.reaper.lock().take() {
            if handle.join().is_err() {
                warn!("Messenger reaper panicked");
            }
        }

        let drained: Vec<_> = self.shared.entries.lock().drain().collect();
        for (_, messenger) in drained {
            messenger.close();
        }
    }
}

impl Drop for MessengerCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Close idle self-destructing messengers, then evict closed entries
fn reap_entries(shared: &CacheShared) -> usize {
    let snapshot: Vec<_> = shared.entries.lock().values().cloned().collect();

    for messenger in snapshot {
        if messenger.self_destructs() && !messenger.is_closed() && messenger.is_idle() {
            debug!(destination = %messenger.destination_address(), "Closing idle messenger");
            messenger.close();
        }
    }

    let mut entries = shared.entries.lock();
    let before = entries.len();
    entries.retain(|_, messenger| !messenger.is_closed());
    before - entries.len()
}

// ----------------------------------------------------------------------------
// Idle Reaper
// ----------------------------------------------------------------------------

/// Background thread reaping idle messengers
struct IdleReaper {
    cache: Weak<CacheShared>,
}

impl IdleReaper {
    fn run(self, period: core::time::Duration) {
        info!(?period, "Messenger reaper started");
        loop {
            let Some(shared) = self.cache.upgrade() else {
                break;
            };

            {
                let mut stop = shared.stop.lock();
                if !*stop {
                    shared.wake.wait_for(&mut stop, period);
                }
                if *stop {
                    break;
                }
            }

            let evicted = reap_entries(&shared);
            if evicted > 0 {
                debug!(evicted, "Evicted closed messengers");
            }
        }
        info!("Messenger reaper stopped");
    }
}
