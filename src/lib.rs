//! # hvr-bridge - remote tracking peripherals as host runtime devices
//!
//! Lightweight peripherals (trackers, controllers) connect over TCP and stream
//! fixed-layout device descriptors. The bridge keeps the authoritative roster,
//! fans updates out to every other peer, and presents each peripheral to the
//! host motion-tracking runtime as a persistent tracked device. Device handles
//! are pooled, so a peripheral that reconnects reuses a handle instead of
//! registering a fresh device index with the runtime.
//!
//! Provides:
//! - The session registry, device handle pool and pose bridge
//! - A 512-byte wire protocol shared by the bridge and peripherals
//! - A peripheral-side client session for test harnesses
//! - C FFI for loading the bridge as a host runtime plugin
//!
//! ## Quick Start
//! ```no_run
//! use hvr_bridge::{BridgeConfig, DeviceProvider, HostRuntime};
//! use std::sync::Arc;
//!
//! # fn host() -> Arc<dyn HostRuntime> { unimplemented!() }
//! let provider = DeviceProvider::init(host(), BridgeConfig::from_env()).unwrap();
//! loop {
//!     // once per host runtime frame
//!     provider.run_frame();
//! #   break;
//! }
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod transport;
pub mod host;
pub mod context;
pub mod config;
pub mod bridge;
pub mod device;
pub mod tracker;
pub mod controller;
pub mod pool;
pub mod registry;
pub mod provider;
pub mod client;
pub mod ffi;

#[cfg(test)]
pub(crate) mod testing;

pub use config::BridgeConfig;
pub use context::{CancellationToken, Context};
pub use error::BridgeError;
pub use host::HostRuntime;
pub use protocol::{Message, MessageKind};
pub use provider::DeviceProvider;
pub use registry::SessionRegistry;
pub use types::*;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
