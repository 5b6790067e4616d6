use crate::context::Context;
use crate::device::{DeviceCore, TrackedDevice};
use crate::host::{DeviceIndex, DriverPose, HostEvent};
use crate::types::{ConnectionId, DeviceDescriptor, DeviceRole, DeviceType};

/// Generic tracker. Pose plus the shared button/trigger inputs, no outputs.
pub struct TrackerDevice {
    core: DeviceCore,
}

impl TrackerDevice {
    pub fn new(id: ConnectionId, ctx: &Context) -> Self {
        let serial = format!("{}-{}", ctx.config.tracker_model, id);
        log::info!("Tracker serial number: {}", serial);
        Self {
            core: DeviceCore::new(ctx.host.clone(), serial, ctx.config.recenter_offset),
        }
    }
}

impl TrackedDevice for TrackerDevice {
    fn serial(&self) -> &str {
        self.core.serial()
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Tracker
    }

    fn role(&self) -> DeviceRole {
        DeviceRole::Neither
    }

    fn device_index(&self) -> DeviceIndex {
        self.core.index()
    }

    fn activate(&mut self, index: DeviceIndex) {
        self.core.activate(index);
    }

    fn deactivate(&mut self) {
        self.core.deactivate();
    }

    fn pose(&self) -> DriverPose {
        self.core.pose()
    }

    fn process_event(&mut self, _event: &HostEvent) {}

    fn process_update(&mut self, desc: &DeviceDescriptor) {
        self.core.apply_update(desc);
    }

    fn run_frame(&mut self) {
        self.core.refresh_inputs();
    }

    fn turn_on(&mut self, _desc: &DeviceDescriptor) {
        self.core.set_connected(true);
    }

    fn turn_off(&mut self) {
        self.core.set_connected(false);
    }
}
