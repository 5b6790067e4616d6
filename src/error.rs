use crate::types::{ConnectionId, DeviceType};
use std::fmt;

/// Errors raised by the bridge, its transport and the device pool.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated payload: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Payload length {0} exceeds maximum {1}")]
    PayloadTooLarge(u32, u32),

    #[error("Unsupported device type: {0:?}")]
    UnsupportedDeviceType(DeviceType),

    #[error("Host runtime refused device {0}")]
    RegistrationFailed(String),

    #[error("Connection {0} already owns an active device")]
    AlreadyBound(ConnectionId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout waiting for session event")]
    Timeout,

    #[error("Channel disconnected")]
    ChannelDisconnected,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &BridgeError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_is_nul_terminated() {
        let slot = LastError::new();
        assert!(slot.as_ptr().is_null());

        slot.set(&BridgeError::UnsupportedDeviceType(DeviceType::BaseStation));
        let ptr = slot.as_ptr();
        assert!(!ptr.is_null());
        let text = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert_eq!(
            text.to_str().unwrap(),
            "Unsupported device type: BaseStation"
        );
    }
}
