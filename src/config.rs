use crate::protocol::{DEFAULT_PORT, FRAME_SIZE};
use crate::types::Vec3;
use crate::{BridgeError, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Largest payload the transport will buffer for a single message.
pub const DEFAULT_MAX_PAYLOAD: u32 = 64 * 1024;

/// Runtime configuration of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// How long the session pump waits for an event before rechecking cancellation.
    pub poll_interval: Duration,
    pub max_payload: u32,
    /// Subtracted from every inbound position before it reaches the host runtime.
    pub recenter_offset: Vec3,
    pub tracker_model: String,
    pub controller_model: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            poll_interval: Duration::from_millis(10),
            max_payload: DEFAULT_MAX_PAYLOAD,
            recenter_offset: Vec3::new(3.0, 0.0, 3.0),
            tracker_model: "hvr_tracker".to_string(),
            controller_model: "hvr_controller".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults, overridden by `HVR_BRIDGE_*` environment variables.
    ///
    /// - `HVR_BRIDGE_BIND`: listen address
    /// - `HVR_BRIDGE_PORT`: listen port
    /// - `HVR_BRIDGE_POLL_MS`: pump poll interval
    /// - `HVR_BRIDGE_MAX_PAYLOAD`: per-message payload cap in bytes
    /// - `HVR_BRIDGE_RECENTER`: `x,y,z` recenter offset
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: read_env_parse("HVR_BRIDGE_BIND", defaults.bind_address),
            port: read_env_parse("HVR_BRIDGE_PORT", defaults.port),
            poll_interval: Duration::from_millis(read_env_parse(
                "HVR_BRIDGE_POLL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            max_payload: read_env_parse("HVR_BRIDGE_MAX_PAYLOAD", defaults.max_payload),
            recenter_offset: std::env::var("HVR_BRIDGE_RECENTER")
                .ok()
                .and_then(|v| parse_vec3(&v))
                .unwrap_or(defaults.recenter_offset),
            ..defaults
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(BridgeError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if (self.max_payload as usize) < FRAME_SIZE {
            return Err(BridgeError::InvalidConfig(format!(
                "max payload {} is smaller than one {}-byte frame",
                self.max_payload, FRAME_SIZE
            )));
        }
        Ok(())
    }
}

fn read_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_vec3(text: &str) -> Option<Vec3> {
    let mut parts = text.split(',').map(|p| p.trim().parse::<f64>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Vec3::new(x, y, z))
}
