//! Process-scoped group registry
//!
//! Maps group ids to their live instance. Registration and removal are the
//! only mutation points; removal is checked against the instance so a stale
//! group cannot unregister its successor.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use wirenet_core::PeerGroupId;

use super::peer_group::{GroupInterface, PeerGroup};

#[derive(Default)]
pub struct GroupRegistry {
    instances: Mutex<HashMap<PeerGroupId, Arc<PeerGroup>>>,
}

impl GroupRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `group` under `id`; the first registration wins
    pub fn register_instance(&self, id: PeerGroupId, group: &Arc<PeerGroup>) -> bool {
        let mut instances = self.instances.lock();
        if instances.contains_key(&id) {
            debug!(group = %id, "Group already registered");
            return false;
        }
        info!(group = %id, "Registered group instance");
        instances.insert(id, group.clone());
        true
    }

    /// Unregister `group` if it is the instance registered under `id`
    pub fn unregister_instance(&self, id: &PeerGroupId, group: &PeerGroup) -> bool {
        let mut instances = self.instances.lock();
        match instances.get(id) {
            Some(registered) if core::ptr::eq(Arc::as_ptr(registered), group) => {
                instances.remove(id);
                info!(group = %id, "Unregistered group instance");
                true
            }
            _ => false,
        }
    }

    /// Counted interface to the instance registered under `id`; `None` if
    /// that instance has begun stopping
    pub fn lookup_instance(&self, id: &PeerGroupId) -> Option<GroupInterface> {
        let group = self.instances.lock().get(id).cloned()?;
        group.try_interface()
    }

    pub fn is_registered(&self, id: &PeerGroupId) -> bool {
        self.instances.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
