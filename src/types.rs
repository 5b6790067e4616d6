/// Transport-assigned connection identifier. Doubles as the device identity.
pub type ConnectionId = u32;

/// Number of scalar input slots carried by every descriptor.
pub const SCALAR_STATE_COUNT: usize = 64;

/// Kind of device a peripheral claims to be.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Hmd = 0,
    HmdDirectDisplay = 1,
    HmdVirtualDisplay = 2,
    ControllerViveLike = 3,
    ControllerQuestLike = 4,
    ControllerIndexLike = 5,
    Tracker = 6,
    FaceTracker = 7,
    EyeTracker = 8,
    BaseStation = 9,
    Invalid = 10,
}

impl DeviceType {
    /// Decode a wire byte. Unknown values map to `Invalid`.
    pub fn from_u8(value: u8) -> DeviceType {
        match value {
            0 => DeviceType::Hmd,
            1 => DeviceType::HmdDirectDisplay,
            2 => DeviceType::HmdVirtualDisplay,
            3 => DeviceType::ControllerViveLike,
            4 => DeviceType::ControllerQuestLike,
            5 => DeviceType::ControllerIndexLike,
            6 => DeviceType::Tracker,
            7 => DeviceType::FaceTracker,
            8 => DeviceType::EyeTracker,
            9 => DeviceType::BaseStation,
            _ => DeviceType::Invalid,
        }
    }

    /// Device class the host runtime files this type under.
    pub fn device_class(self) -> DeviceClass {
        match self {
            DeviceType::Hmd | DeviceType::HmdDirectDisplay | DeviceType::HmdVirtualDisplay => {
                DeviceClass::Hmd
            }
            DeviceType::ControllerViveLike
            | DeviceType::ControllerQuestLike
            | DeviceType::ControllerIndexLike => DeviceClass::Controller,
            DeviceType::Tracker | DeviceType::FaceTracker | DeviceType::EyeTracker => {
                DeviceClass::GenericTracker
            }
            DeviceType::BaseStation => DeviceClass::TrackingReference,
            DeviceType::Invalid => DeviceClass::Invalid,
        }
    }
}

/// Hand or placement hint for controllers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Left = 0,
    Right = 1,
    Neither = 2,
    Stylus = 3,
    Treadmill = 4,
    Invalid = 5,
}

impl DeviceRole {
    /// Decode a wire byte. Unknown values map to `Invalid`.
    pub fn from_u8(value: u8) -> DeviceRole {
        match value {
            0 => DeviceRole::Left,
            1 => DeviceRole::Right,
            2 => DeviceRole::Neither,
            3 => DeviceRole::Stylus,
            4 => DeviceRole::Treadmill,
            _ => DeviceRole::Invalid,
        }
    }
}

/// Host runtime device class.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Invalid = 0,
    Hmd = 1,
    Controller = 2,
    GenericTracker = 3,
    TrackingReference = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Orientation quaternion, scalar first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

bitflags::bitflags! {
    /// Boolean input states of a peripheral (16 bits on the wire).
    ///
    /// Only the bits the built-in device kinds bind to inputs are named;
    /// the rest are carried through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputButtons: u16 {
        const A_TOUCH       = 1 << 0;
        const A_CLICK       = 1 << 1;
        const TRIGGER_CLICK = 1 << 2;
    }
}

/// Index of the trigger value in [`DeviceDescriptor::scalars`].
pub const SCALAR_TRIGGER_VALUE: usize = 0;

/// Full state of one peripheral as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceDescriptor {
    /// Connection identifier. Overwritten by the bridge on registration.
    pub id: ConnectionId,
    pub device_type: DeviceType,
    pub role: DeviceRole,
    /// Position in meters.
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub angular_velocity: Vec3,
    pub buttons: InputButtons,
    /// Scalar inputs (triggers, axes, skeletal curls).
    pub scalars: [f32; SCALAR_STATE_COUNT],
}

impl DeviceDescriptor {
    pub fn new(device_type: DeviceType, role: DeviceRole) -> Self {
        Self {
            device_type,
            role,
            ..Self::default()
        }
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            id: 0,
            device_type: DeviceType::Tracker,
            role: DeviceRole::Invalid,
            position: Vec3::default(),
            velocity: Vec3::default(),
            orientation: Quat::IDENTITY,
            angular_velocity: Vec3::default(),
            buttons: InputButtons::empty(),
            scalars: [0.0; SCALAR_STATE_COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_wire_bytes_decode_to_invalid() {
        assert_eq!(DeviceType::from_u8(6), DeviceType::Tracker);
        assert_eq!(DeviceType::from_u8(200), DeviceType::Invalid);
        assert_eq!(DeviceRole::from_u8(1), DeviceRole::Right);
        assert_eq!(DeviceRole::from_u8(99), DeviceRole::Invalid);
    }

    #[test]
    fn test_device_classes() {
        assert_eq!(DeviceType::Tracker.device_class(), DeviceClass::GenericTracker);
        assert_eq!(
            DeviceType::ControllerIndexLike.device_class(),
            DeviceClass::Controller
        );
        assert_eq!(
            DeviceType::BaseStation.device_class(),
            DeviceClass::TrackingReference
        );
        assert_eq!(DeviceType::Invalid.device_class(), DeviceClass::Invalid);
    }

    #[test]
    fn test_unnamed_button_bits_survive() {
        let buttons = InputButtons::from_bits_retain(0x8001);
        assert!(buttons.contains(InputButtons::A_TOUCH));
        assert_eq!(buttons.bits(), 0x8001);
    }

    #[test]
    fn test_default_descriptor_has_identity_orientation() {
        let desc = DeviceDescriptor::default();
        assert_eq!(desc.orientation, Quat::IDENTITY);
        assert_eq!(desc.device_type, DeviceType::Tracker);
        assert_eq!(desc.role, DeviceRole::Invalid);
    }
}
