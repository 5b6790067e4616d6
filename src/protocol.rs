use crate::types::{
    ConnectionId, DeviceDescriptor, DeviceRole, DeviceType, InputButtons, Quat, Vec3,
    SCALAR_STATE_COUNT,
};
use crate::{BridgeError, Result};

// -- Endpoint --
pub const DEFAULT_PORT: u16 = 60000;

// -- Frame geometry --
/// Header: kind (u32 LE) + payload length (u32 LE).
pub const HEADER_SIZE: usize = 8;
/// Header plus one descriptor body.
pub const FRAME_SIZE: usize = 512;
pub const DESCRIPTOR_SIZE: usize = FRAME_SIZE - HEADER_SIZE;
pub const IDENTITY_SIZE: usize = 4;

// -- Descriptor layout --
const OFF_ID: usize = 0;
const OFF_TYPE: usize = 4;
const OFF_ROLE: usize = 5;
const OFF_POSITION: usize = 6;
const OFF_VELOCITY: usize = 30;
const OFF_ORIENTATION: usize = 54;
const OFF_ANGULAR_VELOCITY: usize = 86;
const OFF_BUTTONS: usize = 110;
const OFF_SCALARS: usize = 112;
/// First reserved byte. Everything from here to `DESCRIPTOR_SIZE` is zero padding.
pub const OFF_RESERVED: usize = OFF_SCALARS + SCALAR_STATE_COUNT * 4;
pub const RESERVED_SIZE: usize = DESCRIPTOR_SIZE - OFF_RESERVED;

/// Wire message kinds. Values are part of the protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    GetStatus = 0,
    GetPing = 1,
    Accepted = 2,
    AssignIdentity = 3,
    RegisterWithServer = 4,
    AddDevice = 5,
    RemoveDevice = 6,
    UpdateDevice = 7,
}

impl MessageKind {
    pub fn from_u32(value: u32) -> Option<MessageKind> {
        match value {
            0 => Some(MessageKind::GetStatus),
            1 => Some(MessageKind::GetPing),
            2 => Some(MessageKind::Accepted),
            3 => Some(MessageKind::AssignIdentity),
            4 => Some(MessageKind::RegisterWithServer),
            5 => Some(MessageKind::AddDevice),
            6 => Some(MessageKind::RemoveDevice),
            7 => Some(MessageKind::UpdateDevice),
            _ => None,
        }
    }
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw kind value. Unknown kinds are framed normally and ignored by consumers.
    pub kind: u32,
    pub payload_length: u32,
}

impl Header {
    pub fn new(kind: MessageKind, payload_length: u32) -> Self {
        Self {
            kind: kind as u32,
            payload_length,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.kind.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Returns `None` if the buffer is shorter than a header.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            kind: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Reject payload lengths the transport is not willing to buffer.
    pub fn validate(&self, max_payload: u32) -> Result<()> {
        if self.payload_length > max_payload {
            return Err(BridgeError::PayloadTooLarge(self.payload_length, max_payload));
        }
        Ok(())
    }
}

/// One framed message: header plus raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            header: Header::new(kind, payload.len() as u32),
            payload,
        }
    }

    /// Build a message from a header already read off the wire.
    pub fn from_parts(header: Header, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    pub fn empty(kind: MessageKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn accepted() -> Self {
        Self::empty(MessageKind::Accepted)
    }

    pub fn assign_identity(id: ConnectionId) -> Self {
        Self::new(MessageKind::AssignIdentity, encode_identity(id).to_vec())
    }

    pub fn register(desc: &DeviceDescriptor) -> Self {
        Self::new(MessageKind::RegisterWithServer, encode_descriptor(desc).to_vec())
    }

    pub fn add_device(desc: &DeviceDescriptor) -> Self {
        Self::new(MessageKind::AddDevice, encode_descriptor(desc).to_vec())
    }

    pub fn remove_device(id: ConnectionId) -> Self {
        Self::new(MessageKind::RemoveDevice, encode_identity(id).to_vec())
    }

    pub fn update_device(desc: &DeviceDescriptor) -> Self {
        Self::new(MessageKind::UpdateDevice, encode_descriptor(desc).to_vec())
    }

    /// Known kind, or `None` for values outside the protocol.
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_u32(self.header.kind)
    }

    /// Decode the body as a device descriptor.
    pub fn descriptor(&self) -> Result<DeviceDescriptor> {
        decode_descriptor(&self.payload)
    }

    /// Decode the body as a single connection identifier.
    pub fn identity(&self) -> Result<ConnectionId> {
        decode_identity(&self.payload)
    }

    /// Overwrite the identity field of a descriptor body in place,
    /// leaving every other byte untouched.
    pub fn stamp_identity(&mut self, id: ConnectionId) -> Result<()> {
        check_len(&self.payload, DESCRIPTOR_SIZE)?;
        self.payload[OFF_ID..OFF_ID + 4].copy_from_slice(&id.to_le_bytes());
        Ok(())
    }

    /// Serialize header and body into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

fn check_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(BridgeError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

pub fn encode_identity(id: ConnectionId) -> [u8; IDENTITY_SIZE] {
    id.to_le_bytes()
}

pub fn decode_identity(data: &[u8]) -> Result<ConnectionId> {
    check_len(data, IDENTITY_SIZE)?;
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

fn put_f64(buf: &mut [u8], offset: usize, value: f64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_vec3(buf: &mut [u8], offset: usize, v: Vec3) {
    put_f64(buf, offset, v.x);
    put_f64(buf, offset + 8, v.y);
    put_f64(buf, offset + 16, v.z);
}

fn get_f64(data: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(raw)
}

fn get_vec3(data: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        get_f64(data, offset),
        get_f64(data, offset + 8),
        get_f64(data, offset + 16),
    )
}

/// Encode a descriptor into its fixed 504-byte body.
///
/// Layout (little-endian, packed):
/// - `[0..4]`: id u32
/// - `[4]`: device type, `[5]`: role
/// - `[6..30]`: position 3x f64
/// - `[30..54]`: velocity 3x f64
/// - `[54..86]`: orientation [w, x, y, z] 4x f64
/// - `[86..110]`: angular velocity 3x f64
/// - `[110..112]`: button bits u16
/// - `[112..368]`: 64x f32 scalar inputs
/// - `[368..504]`: reserved, zero
pub fn encode_descriptor(desc: &DeviceDescriptor) -> [u8; DESCRIPTOR_SIZE] {
    let mut buf = [0u8; DESCRIPTOR_SIZE];
    buf[OFF_ID..OFF_ID + 4].copy_from_slice(&desc.id.to_le_bytes());
    buf[OFF_TYPE] = desc.device_type as u8;
    buf[OFF_ROLE] = desc.role as u8;
    put_vec3(&mut buf, OFF_POSITION, desc.position);
    put_vec3(&mut buf, OFF_VELOCITY, desc.velocity);
    put_f64(&mut buf, OFF_ORIENTATION, desc.orientation.w);
    put_f64(&mut buf, OFF_ORIENTATION + 8, desc.orientation.x);
    put_f64(&mut buf, OFF_ORIENTATION + 16, desc.orientation.y);
    put_f64(&mut buf, OFF_ORIENTATION + 24, desc.orientation.z);
    put_vec3(&mut buf, OFF_ANGULAR_VELOCITY, desc.angular_velocity);
    buf[OFF_BUTTONS..OFF_BUTTONS + 2].copy_from_slice(&desc.buttons.bits().to_le_bytes());
    for (i, value) in desc.scalars.iter().enumerate() {
        let at = OFF_SCALARS + i * 4;
        buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Decode a descriptor body.
///
/// Bodies shorter than `DESCRIPTOR_SIZE` are rejected with `Truncated`;
/// anything past the descriptor is ignored.
pub fn decode_descriptor(data: &[u8]) -> Result<DeviceDescriptor> {
    check_len(data, DESCRIPTOR_SIZE)?;

    let mut scalars = [0f32; SCALAR_STATE_COUNT];
    for (i, slot) in scalars.iter_mut().enumerate() {
        let at = OFF_SCALARS + i * 4;
        *slot = f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
    }

    Ok(DeviceDescriptor {
        id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
        device_type: DeviceType::from_u8(data[OFF_TYPE]),
        role: DeviceRole::from_u8(data[OFF_ROLE]),
        position: get_vec3(data, OFF_POSITION),
        velocity: get_vec3(data, OFF_VELOCITY),
        orientation: Quat::new(
            get_f64(data, OFF_ORIENTATION),
            get_f64(data, OFF_ORIENTATION + 8),
            get_f64(data, OFF_ORIENTATION + 16),
            get_f64(data, OFF_ORIENTATION + 24),
        ),
        angular_velocity: get_vec3(data, OFF_ANGULAR_VELOCITY),
        buttons: InputButtons::from_bits_retain(u16::from_le_bytes([
            data[OFF_BUTTONS],
            data[OFF_BUTTONS + 1],
        ])),
        scalars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> DeviceDescriptor {
        let mut desc = DeviceDescriptor::new(DeviceType::ControllerViveLike, DeviceRole::Left);
        desc.id = 42;
        desc.position = Vec3::new(3.0, -1.25, 3.5);
        desc.velocity = Vec3::new(-4.0, 0.0, 1e-9);
        desc.orientation = Quat::new(0.7071, 0.0, -0.7071, 0.0);
        desc.angular_velocity = Vec3::new(f64::MIN, f64::MAX, -0.0);
        desc.buttons = InputButtons::A_CLICK | InputButtons::from_bits_retain(0x8000);
        for (i, s) in desc.scalars.iter_mut().enumerate() {
            *s = i as f32 * -0.5;
        }
        desc
    }

    #[test]
    fn test_frame_geometry() {
        assert_eq!(DESCRIPTOR_SIZE, 504);
        assert_eq!(OFF_RESERVED, 368);
        assert_eq!(RESERVED_SIZE, 136);
        let msg = Message::update_device(&DeviceDescriptor::default());
        assert_eq!(msg.to_bytes().len(), FRAME_SIZE);
        assert_eq!(msg.header.payload_length as usize, DESCRIPTOR_SIZE);
    }

    #[test]
    fn test_kind_values_are_stable() {
        assert_eq!(MessageKind::GetStatus as u32, 0);
        assert_eq!(MessageKind::Accepted as u32, 2);
        assert_eq!(MessageKind::RegisterWithServer as u32, 4);
        assert_eq!(MessageKind::UpdateDevice as u32, 7);
        assert_eq!(MessageKind::from_u32(6), Some(MessageKind::RemoveDevice));
        assert_eq!(MessageKind::from_u32(8), None);
    }

    #[test]
    fn test_header_encode_decode() {
        let header = Header::new(MessageKind::AddDevice, 504);
        let bytes = header.encode();
        assert_eq!(bytes, [5, 0, 0, 0, 0xF8, 0x01, 0, 0]);
        assert_eq!(Header::decode(&bytes), Some(header));
        assert_eq!(Header::decode(&bytes[..7]), None);
    }

    #[test]
    fn test_header_validate() {
        assert!(Header::new(MessageKind::UpdateDevice, 504).validate(504).is_ok());
        assert!(matches!(
            Header::new(MessageKind::UpdateDevice, 505).validate(504),
            Err(BridgeError::PayloadTooLarge(505, 504))
        ));
    }

    #[test]
    fn test_descriptor_round_trip() {
        let cases = [
            DeviceDescriptor::default(),
            sample_descriptor(),
            DeviceDescriptor {
                id: u32::MAX,
                buttons: InputButtons::from_bits_retain(u16::MAX),
                scalars: [f32::MAX; SCALAR_STATE_COUNT],
                position: Vec3::new(f64::MAX, f64::MIN_POSITIVE, -1.0),
                ..DeviceDescriptor::new(DeviceType::BaseStation, DeviceRole::Treadmill)
            },
        ];
        for desc in cases {
            let decoded = decode_descriptor(&encode_descriptor(&desc)).unwrap();
            assert_eq!(decoded, desc);
        }
    }

    #[test]
    fn test_descriptor_field_offsets() {
        let bytes = encode_descriptor(&sample_descriptor());
        assert_eq!(&bytes[0..4], &42u32.to_le_bytes());
        assert_eq!(bytes[4], DeviceType::ControllerViveLike as u8);
        assert_eq!(bytes[5], DeviceRole::Left as u8);
        assert_eq!(&bytes[6..14], &3.0f64.to_le_bytes());
        assert_eq!(&bytes[54..62], &0.7071f64.to_le_bytes());
        assert_eq!(&bytes[110..112], &0x8002u16.to_le_bytes());
        assert_eq!(&bytes[116..120], &(-0.5f32).to_le_bytes());
        assert!(bytes[OFF_RESERVED..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_truncated_descriptor_rejected() {
        let bytes = encode_descriptor(&sample_descriptor());
        match decode_descriptor(&bytes[..DESCRIPTOR_SIZE - 1]) {
            Err(BridgeError::Truncated { expected, actual }) => {
                assert_eq!(expected, DESCRIPTOR_SIZE);
                assert_eq!(actual, DESCRIPTOR_SIZE - 1);
            }
            other => panic!("expected truncation error, got {:?}", other),
        }
        assert!(Message::empty(MessageKind::UpdateDevice).descriptor().is_err());
        assert!(decode_identity(&[1, 2]).is_err());
    }

    #[test]
    fn test_oversized_descriptor_ignores_tail() {
        let mut bytes = encode_descriptor(&sample_descriptor()).to_vec();
        bytes.extend_from_slice(&[0xAA; 16]);
        assert_eq!(decode_descriptor(&bytes).unwrap(), sample_descriptor());
    }

    #[test]
    fn test_unknown_enum_bytes() {
        let mut bytes = encode_descriptor(&sample_descriptor());
        bytes[4] = 0xEE;
        bytes[5] = 0xEE;
        let desc = decode_descriptor(&bytes).unwrap();
        assert_eq!(desc.device_type, DeviceType::Invalid);
        assert_eq!(desc.role, DeviceRole::Invalid);
    }

    #[test]
    fn test_identity_messages() {
        let msg = Message::remove_device(7);
        assert_eq!(msg.kind(), Some(MessageKind::RemoveDevice));
        assert_eq!(msg.identity().unwrap(), 7);
        assert_eq!(Message::assign_identity(1).identity().unwrap(), 1);
    }

    #[test]
    fn test_stamp_identity_keeps_other_bytes() {
        let mut msg = Message::update_device(&sample_descriptor());
        msg.payload[OFF_RESERVED] = 0x5A;
        msg.stamp_identity(9).unwrap();
        assert_eq!(msg.descriptor().unwrap().id, 9);
        assert_eq!(msg.payload[OFF_RESERVED], 0x5A);

        let mut short = Message::empty(MessageKind::UpdateDevice);
        assert!(short.stamp_identity(9).is_err());
    }
}
