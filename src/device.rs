use crate::bridge;
use crate::context::Context;
use crate::controller::ControllerDevice;
use crate::host::{
    ComponentHandle, DeviceIndex, DriverPose, HostEvent, HostRuntime, ScalarUnits,
    INVALID_COMPONENT, INVALID_DEVICE_INDEX,
};
use crate::tracker::TrackerDevice;
use crate::types::{
    ConnectionId, DeviceDescriptor, DeviceRole, DeviceType, InputButtons, Vec3,
    SCALAR_TRIGGER_VALUE,
};
use crate::{BridgeError, Result};
use std::sync::Arc;

/// Device types the bridge can present to the host runtime.
pub const SUPPORTED_DEVICE_TYPES: [DeviceType; 2] =
    [DeviceType::Tracker, DeviceType::ControllerViveLike];

pub fn is_supported(device_type: DeviceType) -> bool {
    SUPPORTED_DEVICE_TYPES.contains(&device_type)
}

/// One device slot as seen by the host runtime.
///
/// Every concrete device kind implements this port; the pool and registry
/// never know which kind they are holding.
pub trait TrackedDevice: Send {
    /// Serial number the device was registered under. Stable for the life of the handle.
    fn serial(&self) -> &str;

    fn device_type(&self) -> DeviceType;

    /// Hand or placement hint of the peripheral currently bound.
    fn role(&self) -> DeviceRole;

    /// Runtime index, or `INVALID_DEVICE_INDEX` before activation / after deactivation.
    fn device_index(&self) -> DeviceIndex;

    /// Called once the host runtime has accepted the device.
    fn activate(&mut self, index: DeviceIndex);

    /// The runtime is done with this device; stop talking to it.
    fn deactivate(&mut self);

    /// Most recently submitted pose.
    fn pose(&self) -> DriverPose;

    /// Inspect a host runtime event. Devices filter for events addressed to themselves.
    fn process_event(&mut self, event: &HostEvent);

    /// Apply an inbound network update.
    fn process_update(&mut self, desc: &DeviceDescriptor);

    /// Per-frame refresh of input components from the latest descriptor.
    fn run_frame(&mut self);

    /// Rebound to the peripheral described by `desc`: adopt its hints, report connected.
    fn turn_on(&mut self, desc: &DeviceDescriptor);

    /// Peripheral gone: report disconnected.
    fn turn_off(&mut self);
}

/// Build a new device for a registration descriptor.
pub fn create(
    desc: &DeviceDescriptor,
    id: ConnectionId,
    ctx: &Context,
) -> Result<Box<dyn TrackedDevice>> {
    match desc.device_type {
        DeviceType::Tracker => Ok(Box::new(TrackerDevice::new(id, ctx))),
        DeviceType::ControllerViveLike => Ok(Box::new(ControllerDevice::new(id, desc.role, ctx))),
        other => Err(BridgeError::UnsupportedDeviceType(other)),
    }
}

/// Input component paths shared by the built-in device kinds.
pub mod paths {
    pub const A_TOUCH: &str = "/input/a/touch";
    pub const A_CLICK: &str = "/input/a/click";
    pub const TRIGGER_VALUE: &str = "/input/trigger/value";
    pub const TRIGGER_CLICK: &str = "/input/trigger/click";
    pub const HAPTIC: &str = "/output/haptic";
}

/// Handles of the button and trigger components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputComponents {
    pub a_touch: ComponentHandle,
    pub a_click: ComponentHandle,
    pub trigger_value: ComponentHandle,
    pub trigger_click: ComponentHandle,
}

impl Default for InputComponents {
    fn default() -> Self {
        Self {
            a_touch: INVALID_COMPONENT,
            a_click: INVALID_COMPONENT,
            trigger_value: INVALID_COMPONENT,
            trigger_click: INVALID_COMPONENT,
        }
    }
}

impl InputComponents {
    pub fn create(host: &dyn HostRuntime, index: DeviceIndex) -> Self {
        Self {
            a_touch: host.create_boolean_component(index, paths::A_TOUCH),
            a_click: host.create_boolean_component(index, paths::A_CLICK),
            trigger_value: host.create_scalar_component(
                index,
                paths::TRIGGER_VALUE,
                ScalarUnits::NormalizedOneSided,
            ),
            trigger_click: host.create_boolean_component(index, paths::TRIGGER_CLICK),
        }
    }

    pub fn refresh(&self, host: &dyn HostRuntime, desc: &DeviceDescriptor) {
        let buttons = desc.buttons;
        host.update_boolean_component(self.a_touch, buttons.contains(InputButtons::A_TOUCH), 0.0);
        host.update_boolean_component(self.a_click, buttons.contains(InputButtons::A_CLICK), 0.0);
        host.update_boolean_component(
            self.trigger_click,
            buttons.contains(InputButtons::TRIGGER_CLICK),
            0.0,
        );
        host.update_scalar_component(
            self.trigger_value,
            desc.scalars[SCALAR_TRIGGER_VALUE],
            0.0,
        );
    }
}

/// State and behavior common to the built-in device kinds.
pub struct DeviceCore {
    host: Arc<dyn HostRuntime>,
    serial: String,
    index: DeviceIndex,
    recenter: Vec3,
    inputs: InputComponents,
    latest: DeviceDescriptor,
    pose: DriverPose,
}

impl DeviceCore {
    pub fn new(host: Arc<dyn HostRuntime>, serial: String, recenter: Vec3) -> Self {
        Self {
            host,
            serial,
            index: INVALID_DEVICE_INDEX,
            recenter,
            inputs: InputComponents::default(),
            latest: DeviceDescriptor::default(),
            pose: DriverPose::default(),
        }
    }

    pub fn host(&self) -> &dyn HostRuntime {
        &*self.host
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    pub fn pose(&self) -> DriverPose {
        self.pose
    }

    pub fn activate(&mut self, index: DeviceIndex) {
        self.index = index;
        self.inputs = InputComponents::create(&*self.host, index);
        log::info!("Device {} activated at index {}", self.serial, index);
    }

    pub fn deactivate(&mut self) {
        self.index = INVALID_DEVICE_INDEX;
    }

    /// Translate and submit an update, shifted by the recenter offset.
    pub fn apply_update(&mut self, desc: &DeviceDescriptor) {
        self.latest = *desc;
        let mut pose = bridge::translate(desc);
        pose.position = (desc.position - self.recenter).to_array();
        self.pose = pose;
        bridge::submit(&*self.host, self.index, &pose);
    }

    pub fn set_connected(&mut self, connected: bool) {
        if connected {
            // Inputs of the previous peripheral must not leak into the new binding.
            self.latest = DeviceDescriptor::default();
        }
        self.pose = bridge::connection_pose(connected);
        bridge::submit(&*self.host, self.index, &self.pose);
    }

    pub fn refresh_inputs(&self) {
        if self.index != INVALID_DEVICE_INDEX {
            self.inputs.refresh(&*self.host, &self.latest);
        }
    }
}
