//! Pose bridge: descriptor state to host runtime pose submissions.
//!
//! Stateless. Any positional convention (recentering and the like) belongs
//! to the concrete device, which adjusts the translated pose before submitting.

use crate::host::{DeviceIndex, DriverPose, HostRuntime, TrackingResult, INVALID_DEVICE_INDEX};
use crate::types::DeviceDescriptor;

/// Copy kinematic state into a valid, connected host pose.
pub fn translate(desc: &DeviceDescriptor) -> DriverPose {
    DriverPose {
        position: desc.position.to_array(),
        velocity: desc.velocity.to_array(),
        orientation: desc.orientation,
        angular_velocity: desc.angular_velocity.to_array(),
        pose_is_valid: true,
        device_is_connected: true,
        result: TrackingResult::RunningOk,
    }
}

/// Pose carrying only connection state, used when a device is turned on or off.
pub fn connection_pose(connected: bool) -> DriverPose {
    DriverPose {
        pose_is_valid: connected,
        device_is_connected: connected,
        result: TrackingResult::RunningOk,
        ..DriverPose::default()
    }
}

/// Submit a pose for an activated device. Returns `false` if the device has no index yet.
pub fn submit(host: &dyn HostRuntime, index: DeviceIndex, pose: &DriverPose) -> bool {
    if index == INVALID_DEVICE_INDEX {
        log::debug!("pose dropped: device not activated");
        return false;
    }
    host.submit_pose(index, pose);
    true
}
