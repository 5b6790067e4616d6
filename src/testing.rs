//! In-memory transport and host runtime doubles.

use crate::config::BridgeConfig;
use crate::context::Context;
use crate::host::{
    ComponentHandle, DeviceIndex, DriverPose, HostEvent, HostRuntime, ScalarUnits,
};
use crate::protocol::{Message, MessageKind};
use crate::transport::Transport;
use crate::types::{ConnectionId, DeviceClass};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Transport that expands every send and broadcast into per-connection inboxes.
#[derive(Default)]
pub struct RecordingTransport {
    peers: Mutex<BTreeSet<ConnectionId>>,
    inboxes: Mutex<BTreeMap<ConnectionId, Vec<Message>>>,
}

impl RecordingTransport {
    pub fn add_peer(&self, id: ConnectionId) {
        self.peers.lock().unwrap().insert(id);
    }

    pub fn remove_peer(&self, id: ConnectionId) {
        self.peers.lock().unwrap().remove(&id);
    }

    /// Drain everything delivered to `id` so far.
    pub fn take(&self, id: ConnectionId) -> Vec<Message> {
        self.inboxes
            .lock()
            .unwrap()
            .remove(&id)
            .unwrap_or_default()
    }

    /// Drain and keep only messages of one kind.
    pub fn take_kind(&self, id: ConnectionId, kind: MessageKind) -> Vec<Message> {
        self.take(id)
            .into_iter()
            .filter(|m| m.kind() == Some(kind))
            .collect()
    }

    pub fn clear(&self) {
        self.inboxes.lock().unwrap().clear();
    }

    fn deliver(&self, id: ConnectionId, message: &Message) {
        self.inboxes
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push(message.clone());
    }
}

impl Transport for RecordingTransport {
    fn send(&self, to: ConnectionId, message: &Message) {
        if self.peers.lock().unwrap().contains(&to) {
            self.deliver(to, message);
        }
    }

    fn broadcast(&self, message: &Message, except: Option<ConnectionId>) {
        let peers: Vec<ConnectionId> = self.peers.lock().unwrap().iter().copied().collect();
        for id in peers {
            if Some(id) != except {
                self.deliver(id, message);
            }
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        self.remove_peer(id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Boolean,
    Scalar(ScalarUnits),
    Haptic,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub index: DeviceIndex,
    pub path: String,
    pub kind: ComponentKind,
}

/// Host runtime that records every call.
#[derive(Default)]
pub struct MockHost {
    pub refuse_registration: Mutex<bool>,
    pub registered: Mutex<Vec<(String, DeviceClass)>>,
    pub poses: Mutex<Vec<(DeviceIndex, DriverPose)>>,
    pub components: Mutex<Vec<Component>>,
    pub boolean_updates: Mutex<Vec<(ComponentHandle, bool)>>,
    pub scalar_updates: Mutex<Vec<(ComponentHandle, f32)>>,
    pub events: Mutex<VecDeque<HostEvent>>,
}

impl MockHost {
    pub fn refuse(&self, refuse: bool) {
        *self.refuse_registration.lock().unwrap() = refuse;
    }

    pub fn push_event(&self, event: HostEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn registrations(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn last_pose(&self, index: DeviceIndex) -> Option<DriverPose> {
        self.poses
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, pose)| *pose)
    }

    pub fn pose_count(&self) -> usize {
        self.poses.lock().unwrap().len()
    }

    /// Handle of the component created at `path` on device `index`.
    pub fn component(&self, index: DeviceIndex, path: &str) -> Option<ComponentHandle> {
        self.components
            .lock()
            .unwrap()
            .iter()
            .position(|c| c.index == index && c.path == path)
            .map(|pos| pos as ComponentHandle + 1)
    }

    fn add_component(&self, index: DeviceIndex, path: &str, kind: ComponentKind) -> ComponentHandle {
        let mut components = self.components.lock().unwrap();
        components.push(Component {
            index,
            path: path.to_string(),
            kind,
        });
        components.len() as ComponentHandle
    }
}

impl HostRuntime for MockHost {
    fn register_device(&self, serial: &str, class: DeviceClass) -> Option<DeviceIndex> {
        if *self.refuse_registration.lock().unwrap() {
            return None;
        }
        let mut registered = self.registered.lock().unwrap();
        registered.push((serial.to_string(), class));
        Some(registered.len() as DeviceIndex - 1)
    }

    fn submit_pose(&self, index: DeviceIndex, pose: &DriverPose) {
        self.poses.lock().unwrap().push((index, *pose));
    }

    fn poll_event(&self) -> Option<HostEvent> {
        self.events.lock().unwrap().pop_front()
    }

    fn create_boolean_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.add_component(index, path, ComponentKind::Boolean)
    }

    fn create_scalar_component(
        &self,
        index: DeviceIndex,
        path: &str,
        units: ScalarUnits,
    ) -> ComponentHandle {
        self.add_component(index, path, ComponentKind::Scalar(units))
    }

    fn create_haptic_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.add_component(index, path, ComponentKind::Haptic)
    }

    fn update_boolean_component(&self, handle: ComponentHandle, value: bool, _time_offset_s: f64) {
        self.boolean_updates.lock().unwrap().push((handle, value));
    }

    fn update_scalar_component(&self, handle: ComponentHandle, value: f32, _time_offset_s: f64) {
        self.scalar_updates.lock().unwrap().push((handle, value));
    }
}

/// A context wired to fresh doubles.
pub fn test_context() -> (Context, Arc<MockHost>, Arc<RecordingTransport>) {
    let host = Arc::new(MockHost::default());
    let transport = Arc::new(RecordingTransport::default());
    let ctx = Context::new(host.clone(), transport.clone(), BridgeConfig::default());
    (ctx, host, transport)
}
