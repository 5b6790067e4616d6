use crate::types::{DeviceClass, Quat};

/// Index the host runtime assigns to a registered device.
pub type DeviceIndex = u32;

/// Sentinel for a device that is not (or no longer) activated.
pub const INVALID_DEVICE_INDEX: DeviceIndex = u32::MAX;

/// Handle to an input or output component created on a device.
pub type ComponentHandle = u64;

pub const INVALID_COMPONENT: ComponentHandle = 0;

/// Event type code of a haptic vibration request.
pub const EVENT_HAPTIC_VIBRATION: u32 = 1700;

/// Tracking state reported alongside a pose.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingResult {
    #[default]
    Uninitialized = 1,
    RunningOk = 200,
    RunningOutOfRange = 201,
}

/// Value range of a scalar input component.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarUnits {
    /// 0 to 1, e.g. a trigger.
    NormalizedOneSided = 0,
    /// -1 to 1, e.g. a joystick axis.
    NormalizedTwoSided = 1,
}

/// Pose in the host runtime's representation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriverPose {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub orientation: Quat,
    pub angular_velocity: [f64; 3],
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
    pub result: TrackingResult,
}

/// Event drained from the host runtime's per-frame queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    HapticVibration {
        component: ComponentHandle,
        duration_s: f32,
        frequency: f32,
        amplitude: f32,
    },
    /// Any event type the bridge does not act on.
    Other(u32),
}

/// Call-only surface of the host motion-tracking runtime.
///
/// The bridge never expects the runtime to call back into it synchronously;
/// runtime-originated traffic is pulled through [`HostRuntime::poll_event`]
/// once per frame.
pub trait HostRuntime: Send + Sync {
    /// Register a new tracked device. Returns the runtime's device index,
    /// or `None` when the runtime refuses the device.
    fn register_device(&self, serial: &str, class: DeviceClass) -> Option<DeviceIndex>;

    fn submit_pose(&self, index: DeviceIndex, pose: &DriverPose);

    fn poll_event(&self) -> Option<HostEvent>;

    fn create_boolean_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle;

    fn create_scalar_component(
        &self,
        index: DeviceIndex,
        path: &str,
        units: ScalarUnits,
    ) -> ComponentHandle;

    fn create_haptic_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle;

    fn update_boolean_component(&self, handle: ComponentHandle, value: bool, time_offset_s: f64);

    fn update_scalar_component(&self, handle: ComponentHandle, value: f32, time_offset_s: f64);
}
