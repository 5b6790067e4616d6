use crate::context::Context;
use crate::pool::{self, SharedPool};
use crate::protocol::{Message, MessageKind};
use crate::transport::SessionEvent;
use crate::types::{ConnectionId, DeviceDescriptor};
use std::collections::BTreeMap;

/// Authoritative view of every registered peripheral.
///
/// Driven only from the session thread. Every inbound message first flushes
/// pending removals, so peers learn about disconnects no later than the next
/// message round-trip, in the order the disconnects happened.
pub struct SessionRegistry {
    ctx: Context,
    pool: SharedPool,
    roster: BTreeMap<ConnectionId, DeviceDescriptor>,
    garbage: Vec<ConnectionId>,
}

impl SessionRegistry {
    pub fn new(ctx: Context, pool: SharedPool) -> Self {
        Self {
            ctx,
            pool,
            roster: BTreeMap::new(),
            garbage: Vec::new(),
        }
    }

    /// Admission check. Every connection is accepted.
    pub fn on_connect(&mut self, id: ConnectionId) -> bool {
        log::debug!("Connection {} admitted", id);
        true
    }

    pub fn on_validated(&mut self, id: ConnectionId) {
        self.ctx.transport.send(id, &Message::accepted());
    }

    pub fn on_disconnect(&mut self, id: ConnectionId) {
        if self.roster.remove(&id).is_none() {
            return;
        }
        log::info!("Device {} disconnected", id);
        if !self.garbage.contains(&id) {
            self.garbage.push(id);
        }
        pool::lock(&self.pool).release(id);
    }

    pub fn on_message(&mut self, id: ConnectionId, message: Message) {
        self.flush_garbage();

        match message.kind() {
            Some(MessageKind::RegisterWithServer) => self.register(id, &message),
            Some(MessageKind::UpdateDevice) => self.update(id, message),
            Some(kind) => log::trace!("Ignoring {:?} from {}", kind, id),
            None => log::debug!(
                "Ignoring unknown message kind {} from {}",
                message.header.kind,
                id
            ),
        }
    }

    /// Feed one transport event through the matching handler.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected(id) => {
                if self.on_connect(id) {
                    self.on_validated(id);
                } else {
                    self.ctx.transport.disconnect(id);
                }
            }
            SessionEvent::Disconnected(id) => self.on_disconnect(id),
            SessionEvent::Message(id, message) => self.on_message(id, message),
        }
    }

    /// Announce pending and active removals to every peer.
    pub fn shutdown(&mut self) {
        self.flush_garbage();
        pool::lock(&self.pool).shutdown();
        self.roster.clear();
    }

    pub fn roster(&self) -> &BTreeMap<ConnectionId, DeviceDescriptor> {
        &self.roster
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.roster.contains_key(&id)
    }

    /// Identifiers disconnected since the last flush.
    pub fn pending_removals(&self) -> &[ConnectionId] {
        &self.garbage
    }

    fn flush_garbage(&mut self) {
        for id in self.garbage.drain(..) {
            log::info!("Removing {}", id);
            self.ctx.transport.broadcast(&Message::remove_device(id), None);
        }
    }

    fn register(&mut self, id: ConnectionId, message: &Message) {
        if self.roster.contains_key(&id) {
            log::warn!("Connection {} is already registered, ignoring", id);
            return;
        }
        let mut desc = match message.descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                log::warn!("Dropping registration from {}: {}", id, e);
                return;
            }
        };
        desc.id = id;

        if let Err(e) = pool::lock(&self.pool).acquire(id, &desc) {
            log::warn!("Registration from {} ignored: {}", id, e);
            return;
        }
        self.roster.insert(id, desc);
        log::info!(
            "Registered connection {} as {:?} ({:?})",
            id,
            desc.device_type,
            desc.role
        );

        let transport = &self.ctx.transport;
        transport.send(id, &Message::assign_identity(id));
        transport.broadcast(&Message::add_device(&desc), None);
        for (&other, entry) in &self.roster {
            if other != id {
                transport.send(id, &Message::add_device(entry));
            }
        }
    }

    fn update(&mut self, id: ConnectionId, mut message: Message) {
        let mut desc = match message.descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                log::warn!("Dropping update from {}: {}", id, e);
                return;
            }
        };
        desc.id = id;
        let Some(entry) = self.roster.get_mut(&id) else {
            // Peers never saw an AddDevice for this id.
            log::debug!("Dropping update from unregistered connection {}", id);
            return;
        };
        *entry = desc;

        // Forward the raw body, only the identity is rewritten.
        if let Err(e) = message.stamp_identity(id) {
            log::warn!("Dropping update from {}: {}", id, e);
            return;
        }
        self.ctx.transport.broadcast(&message, Some(id));

        pool::lock(&self.pool).route(id, &desc);
    }
}
