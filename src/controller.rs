use crate::context::Context;
use crate::device::{paths, DeviceCore, TrackedDevice};
use crate::host::{ComponentHandle, DeviceIndex, DriverPose, HostEvent, INVALID_COMPONENT};
use crate::types::{ConnectionId, DeviceDescriptor, DeviceRole, DeviceType};

/// Handheld controller with a role hint and a haptic output.
pub struct ControllerDevice {
    core: DeviceCore,
    role: DeviceRole,
    haptic: ComponentHandle,
    haptic_pulses: u64,
}

impl ControllerDevice {
    pub fn new(id: ConnectionId, role: DeviceRole, ctx: &Context) -> Self {
        let serial = format!("{}-{}", ctx.config.controller_model, id);
        log::info!("Controller serial number: {} ({:?})", serial, role);
        Self {
            core: DeviceCore::new(ctx.host.clone(), serial, ctx.config.recenter_offset),
            role,
            haptic: INVALID_COMPONENT,
            haptic_pulses: 0,
        }
    }

    /// Haptic events received for this controller since creation.
    pub fn haptic_pulses(&self) -> u64 {
        self.haptic_pulses
    }

    fn hand(&self) -> &'static str {
        match self.role {
            DeviceRole::Left => "left",
            DeviceRole::Right => "right",
            _ => "unassigned",
        }
    }
}

impl TrackedDevice for ControllerDevice {
    fn serial(&self) -> &str {
        self.core.serial()
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::ControllerViveLike
    }

    fn role(&self) -> DeviceRole {
        self.role
    }

    fn device_index(&self) -> DeviceIndex {
        self.core.index()
    }

    fn activate(&mut self, index: DeviceIndex) {
        self.core.activate(index);
        // One haptic component per device.
        self.haptic = self.core.host().create_haptic_component(index, paths::HAPTIC);
    }

    fn deactivate(&mut self) {
        self.core.deactivate();
    }

    fn pose(&self) -> DriverPose {
        self.core.pose()
    }

    fn process_event(&mut self, event: &HostEvent) {
        if let HostEvent::HapticVibration {
            component,
            duration_s,
            frequency,
            amplitude,
        } = *event
        {
            if component == INVALID_COMPONENT || component != self.haptic {
                return;
            }
            self.haptic_pulses += 1;
            log::info!(
                "Haptic event for {} hand. Duration: {:.2}, Frequency: {:.2}, Amplitude: {:.2}",
                self.hand(),
                duration_s,
                frequency,
                amplitude
            );
        }
    }

    fn process_update(&mut self, desc: &DeviceDescriptor) {
        self.core.apply_update(desc);
    }

    fn run_frame(&mut self) {
        self.core.refresh_inputs();
    }

    fn turn_on(&mut self, desc: &DeviceDescriptor) {
        if desc.role != self.role {
            log::info!(
                "Controller {} role {:?} -> {:?}",
                self.core.serial(),
                self.role,
                desc.role
            );
            self.role = desc.role;
        }
        self.core.set_connected(true);
    }

    fn turn_off(&mut self) {
        self.core.set_connected(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    #[test]
    fn test_controller_filters_haptics_by_component() {
        let (ctx, host, _) = test_context();
        let mut left = ControllerDevice::new(1, DeviceRole::Left, &ctx);
        let mut right = ControllerDevice::new(2, DeviceRole::Right, &ctx);
        left.activate(0);
        right.activate(1);

        let left_haptic = host.component(0, paths::HAPTIC).unwrap();
        let event = HostEvent::HapticVibration {
            component: left_haptic,
            duration_s: 0.1,
            frequency: 200.0,
            amplitude: 0.5,
        };
        left.process_event(&event);
        right.process_event(&event);
        left.process_event(&HostEvent::Other(42));

        assert_eq!(left.haptic_pulses(), 1);
        assert_eq!(right.haptic_pulses(), 0);
        assert_eq!(right.role(), DeviceRole::Right);
    }

    #[test]
    fn test_turn_on_adopts_new_role() {
        let (ctx, host, _) = test_context();
        let mut controller = ControllerDevice::new(1, DeviceRole::Left, &ctx);
        controller.activate(0);
        controller.turn_off();

        let desc = DeviceDescriptor::new(DeviceType::ControllerViveLike, DeviceRole::Right);
        controller.turn_on(&desc);
        assert_eq!(controller.role(), DeviceRole::Right);
        assert_eq!(controller.hand(), "right");
        assert!(host.last_pose(0).unwrap().device_is_connected);
    }

    #[test]
    fn test_unactivated_controller_ignores_haptics() {
        let (ctx, _, _) = test_context();
        let mut controller = ControllerDevice::new(1, DeviceRole::Left, &ctx);
        controller.process_event(&HostEvent::HapticVibration {
            component: INVALID_COMPONENT,
            duration_s: 1.0,
            frequency: 1.0,
            amplitude: 1.0,
        });
        assert_eq!(controller.haptic_pulses(), 0);
    }
}
