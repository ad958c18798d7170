//! Reference-counted peer groups
//!
//! Every counted [`GroupInterface`] handed out adds to the group's master
//! reference count. Once initialization is complete, the release that brings
//! the count to zero stops the group: it leaves the registry, stops and drops
//! its services and releases its parent.

use core::fmt;
use core::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{error, info};
use wirenet_core::{GroupError, PeerGroupId};

use super::registry::GroupRegistry;

/// A service hosted by a group
pub trait Service: Send + Sync {
    fn start_app(&self) -> Result<(), GroupError>;
    fn stop_app(&self) -> Result<(), GroupError>;
}

#[derive(Debug, Default)]
struct Lifecycle {
    master_ref_count: usize,
    init_complete: bool,
    stop_when_unreferenced: bool,
    stopping: bool,
}

pub struct PeerGroup {
    id: PeerGroupId,
    registry: Arc<GroupRegistry>,
    parent: Mutex<Option<GroupInterface>>,
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
    lifecycle: Mutex<Lifecycle>,
}

impl PeerGroup {
    fn new(id: PeerGroupId, registry: Arc<GroupRegistry>, parent: Option<GroupInterface>) -> Self {
        Self {
            id,
            registry,
            parent: Mutex::new(parent),
            services: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// The running instance of `id`, creating and registering it if needed.
    ///
    /// Fails with `AlreadyInstantiated` if another caller registered the id
    /// between the lookup and the registration, or if the registered
    /// instance is stopping and has not left the registry yet.
    pub fn instantiate(
        registry: &Arc<GroupRegistry>,
        id: PeerGroupId,
        parent: Option<GroupInterface>,
    ) -> Result<GroupInterface, GroupError> {
        if let Some(existing) = registry.lookup_instance(&id) {
            return Ok(existing);
        }

        let group = Arc::new(Self::new(id, registry.clone(), parent));
        if !registry.register_instance(id, &group) {
            return Err(GroupError::AlreadyInstantiated {
                group_id: id.to_string(),
            });
        }

        group.complete_init();
        Ok(group.interface())
    }

    pub fn id(&self) -> &PeerGroupId {
        &self.id
    }

    /// Counted reference to the parent group, if any
    pub fn parent(&self) -> Option<GroupInterface> {
        self.parent.lock().as_ref().map(GroupInterface::clone)
    }

    pub fn ref_count(&self) -> usize {
        self.lifecycle.lock().master_ref_count
    }

    pub fn is_stopping(&self) -> bool {
        self.lifecycle.lock().stopping
    }

    /// From now on the group stops when its last counted reference goes
    pub fn complete_init(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.init_complete = true;
        if lifecycle.master_ref_count > 0 {
            lifecycle.stop_when_unreferenced = true;
        }
    }

    // ------------------------------------------------------------------------
    // Reference Counting
    // ------------------------------------------------------------------------

    /// Counted interface to this group
    pub fn interface(self: &Arc<Self>) -> GroupInterface {
        let mut lifecycle = self.lifecycle.lock();
        self.counted_interface(&mut lifecycle)
    }

    /// Counted interface, unless the group has begun stopping
    pub fn try_interface(self: &Arc<Self>) -> Option<GroupInterface> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.stopping {
            return None;
        }
        Some(self.counted_interface(&mut lifecycle))
    }

    fn counted_interface(self: &Arc<Self>, lifecycle: &mut Lifecycle) -> GroupInterface {
        lifecycle.master_ref_count += 1;
        if lifecycle.init_complete {
            lifecycle.stop_when_unreferenced = true;
        }
        info!(group = %self.id, count = lifecycle.master_ref_count, "Group ref count incremented");
        GroupInterface {
            group: self.clone(),
            counted: true,
            released: AtomicBool::new(false),
        }
    }

    /// Interface that does not keep the group running
    pub fn weak_interface(self: &Arc<Self>) -> GroupInterface {
        GroupInterface {
            group: self.clone(),
            counted: false,
            released: AtomicBool::new(true),
        }
    }

    fn dec_ref(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.master_ref_count = lifecycle.master_ref_count.saturating_sub(1);
            info!(group = %self.id, count = lifecycle.master_ref_count, "Group ref count decremented");

            if lifecycle.master_ref_count != 0
                || !lifecycle.stop_when_unreferenced
                || lifecycle.stopping
            {
                return;
            }
        }

        info!(group = %self.id, "Stopping unreferenced group");
        self.stop();
    }

    /// Stop the group regardless of outstanding references
    pub fn stop(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopping {
                return;
            }
            lifecycle.stopping = true;
        }

        self.registry.unregister_instance(&self.id, self);

        let services: Vec<_> = self.services.lock().drain().collect();
        for (name, service) in services {
            if let Err(err) = service.stop_app() {
                error!(group = %self.id, service = %name, %err, "Failed stopping service");
            }
        }

        // released outside the lock; the parent may stop in turn
        let parent = self.parent.lock().take();
        drop(parent);
    }

    // ------------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------------

    /// Add a service; ignored once the group is stopping
    pub fn add_service<N: Into<String>>(&self, name: N, service: Arc<dyn Service>) {
        if self.is_stopping() {
            return;
        }
        self.services.lock().insert(name.into(), service);
    }

    pub fn lookup_service(&self, name: &str) -> Result<Arc<dyn Service>, GroupError> {
        self.services
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| GroupError::service_not_found(name))
    }

    /// Remove `service` registered as `name`
    pub fn remove_service(&self, name: &str, service: &Arc<dyn Service>) -> Result<(), GroupError> {
        let mut services = self.services.lock();
        let registered = services
            .get(name)
            .ok_or_else(|| GroupError::service_not_found(name))?;

        if !Arc::ptr_eq(registered, service) {
            return Err(GroupError::violation(format!(
                "service {} is not the registered instance",
                name
            )));
        }
        services.remove(name);
        Ok(())
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.lock().keys().cloned().collect()
    }

    /// Start every service, stopping at the first failure
    pub fn start_app(&self) -> Result<(), GroupError> {
        let services: Vec<_> = self
            .services
            .lock()
            .iter()
            .map(|(name, service)| (name.clone(), service.clone()))
            .collect();

        for (name, service) in services {
            service.start_app().map_err(|err| GroupError::ServiceFailed {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerGroup")
            .field("id", &self.id)
            .field("lifecycle", &*self.lifecycle.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Group Interface
// ----------------------------------------------------------------------------

/// Handle to a group; counted handles keep it running until released
pub struct GroupInterface {
    group: Arc<PeerGroup>,
    counted: bool,
    released: AtomicBool,
}

impl GroupInterface {
    pub fn group(&self) -> &Arc<PeerGroup> {
        &self.group
    }

    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// Give up this reference; later calls do nothing
    pub fn unref(&self) {
        if self.counted && !self.released.swap(true, Ordering::SeqCst) {
            self.group.dec_ref();
        }
    }
}

impl Clone for GroupInterface {
    fn clone(&self) -> Self {
        if self.counted {
            self.group.interface()
        } else {
            self.group.weak_interface()
        }
    }
}

impl Deref for GroupInterface {
    type Target = PeerGroup;

    fn deref(&self) -> &PeerGroup {
        &self.group
    }
}

impl Drop for GroupInterface {
    fn drop(&mut self) {
        self.unref();
    }
}

impl fmt::Debug for GroupInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupInterface")
            .field("group", &self.group.id)
            .field("counted", &self.counted)
            .finish()
    }
}
