use crate::context::Context;
use crate::device::{self, TrackedDevice};
use crate::host::HostEvent;
use crate::protocol::Message;
use crate::types::{ConnectionId, DeviceDescriptor, DeviceRole};
use crate::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Pool shared between the session thread (writes) and the frame thread (reads).
pub type SharedPool = Arc<Mutex<DevicePool>>;

/// Lock a shared pool, recovering the guard if a previous holder panicked.
pub fn lock(pool: &SharedPool) -> MutexGuard<'_, DevicePool> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binding state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Active(ConnectionId),
    Deactivated,
}

struct Slot {
    device: Box<dyn TrackedDevice>,
    state: SlotState,
}

/// Host runtime device handles, keyed by the connection currently bound to them.
///
/// Slots are never removed: a handle registered with the host runtime lives
/// until the process exits and only flips between `Active` and `Deactivated`.
/// Deactivated slots are reused most-recent-first.
pub struct DevicePool {
    ctx: Context,
    slots: Vec<Slot>,
    active: HashMap<ConnectionId, usize>,
    deactivated: Vec<usize>,
}

impl DevicePool {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            slots: Vec::new(),
            active: HashMap::new(),
            deactivated: Vec::new(),
        }
    }

    pub fn shared(ctx: Context) -> SharedPool {
        Arc::new(Mutex::new(Self::new(ctx)))
    }

    /// Bind a device handle to `id`, reusing a deactivated one of the same type if any.
    ///
    /// Returns the slot index. On error nothing is bound.
    pub fn acquire(&mut self, id: ConnectionId, desc: &DeviceDescriptor) -> Result<usize> {
        if self.active.contains_key(&id) {
            return Err(BridgeError::AlreadyBound(id));
        }
        if !device::is_supported(desc.device_type) {
            return Err(BridgeError::UnsupportedDeviceType(desc.device_type));
        }

        let reusable = self
            .deactivated
            .iter()
            .rposition(|&slot| self.slots[slot].device.device_type() == desc.device_type);
        if let Some(pos) = reusable {
            let slot = self.deactivated.remove(pos);
            let entry = &mut self.slots[slot];
            entry.device.turn_on(desc);
            entry.state = SlotState::Active(id);
            self.active.insert(id, slot);
            log::info!(
                "Reusing device {} (slot {}) for connection {}",
                entry.device.serial(),
                slot,
                id
            );
            return Ok(slot);
        }

        let mut device = device::create(desc, id, &self.ctx)?;
        let class = device.device_type().device_class();
        let index = self
            .ctx
            .host
            .register_device(device.serial(), class)
            .ok_or_else(|| BridgeError::RegistrationFailed(device.serial().to_string()))?;
        device.activate(index);

        let slot = self.slots.len();
        log::info!(
            "Registered device {} as {:?} (slot {}) for connection {}",
            device.serial(),
            class,
            slot,
            id
        );
        self.slots.push(Slot {
            device,
            state: SlotState::Active(id),
        });
        self.active.insert(id, slot);
        Ok(slot)
    }

    /// Unbind the device of `id` and park it for reuse.
    pub fn release(&mut self, id: ConnectionId) {
        let Some(slot) = self.active.remove(&id) else {
            log::warn!("No active device for connection {}, nothing to release", id);
            return;
        };
        let entry = &mut self.slots[slot];
        entry.device.turn_off();
        entry.state = SlotState::Deactivated;
        self.deactivated.push(slot);
        log::info!("Device {} deactivated (connection {})", entry.device.serial(), id);
    }

    /// Forward an update to the device bound to `id`.
    pub fn route(&mut self, id: ConnectionId, desc: &DeviceDescriptor) {
        match self.active.get(&id) {
            Some(&slot) => self.slots[slot].device.process_update(desc),
            None => log::debug!("Device {} missing, dropping update", id),
        }
    }

    /// Offer a host runtime event to every active device.
    pub fn dispatch_event(&mut self, event: &HostEvent) {
        for &slot in self.active.values() {
            self.slots[slot].device.process_event(event);
        }
    }

    /// Refresh input components of every active device.
    pub fn run_frame(&mut self) {
        for &slot in self.active.values() {
            self.slots[slot].device.run_frame();
        }
    }

    /// Announce removal of every active device to all peers and release it.
    pub fn shutdown(&mut self) {
        let mut ids: Vec<ConnectionId> = self.active.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            log::info!("Removing {}", id);
            self.ctx.transport.broadcast(&Message::remove_device(id), None);
            self.release(id);
        }
    }

    /// Tell every device the host runtime is going away.
    pub fn deactivate_all(&mut self) {
        for slot in &mut self.slots {
            slot.device.deactivate();
        }
    }

    pub fn is_active(&self, id: ConnectionId) -> bool {
        self.active.contains_key(&id)
    }

    /// Slot currently bound to `id`.
    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.active.get(&id).copied()
    }

    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    pub fn serial_of(&self, id: ConnectionId) -> Option<&str> {
        self.slot_of(id).map(|slot| self.slots[slot].device.serial())
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<DeviceRole> {
        self.slot_of(id).map(|slot| self.slots[slot].device.role())
    }

    pub fn active_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.active.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn deactivated_count(&self) -> usize {
        self.deactivated.len()
    }

    /// Total handles ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
