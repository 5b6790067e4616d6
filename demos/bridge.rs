//! Run the bridge headless against a host runtime that just prints.
//!
//! Usage: RUST_LOG=info cargo run --example bridge
//! Connect peripherals with `cargo run --example client`. Press Ctrl+C to stop.

use hvr_bridge::host::{
    ComponentHandle, DeviceIndex, DriverPose, HostEvent, HostRuntime, ScalarUnits,
};
use hvr_bridge::{BridgeConfig, DeviceClass, DeviceProvider};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(11);

#[derive(Default)]
struct PrintingHost {
    next_index: AtomicU32,
    next_component: AtomicU64,
    poses: AtomicU64,
}

impl HostRuntime for PrintingHost {
    fn register_device(&self, serial: &str, class: DeviceClass) -> Option<DeviceIndex> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        println!("register {} as {:?} -> index {}", serial, class, index);
        Some(index)
    }

    fn submit_pose(&self, index: DeviceIndex, pose: &DriverPose) {
        let count = self.poses.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 100 == 1 {
            println!(
                "pose #{:<8} dev={}  pos=[{:+.3}, {:+.3}, {:+.3}]  valid={} connected={}",
                count,
                index,
                pose.position[0],
                pose.position[1],
                pose.position[2],
                pose.pose_is_valid,
                pose.device_is_connected,
            );
        }
    }

    fn poll_event(&self) -> Option<HostEvent> {
        None
    }

    fn create_boolean_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.component(index, path)
    }

    fn create_scalar_component(
        &self,
        index: DeviceIndex,
        path: &str,
        _units: ScalarUnits,
    ) -> ComponentHandle {
        self.component(index, path)
    }

    fn create_haptic_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.component(index, path)
    }

    fn update_boolean_component(&self, _handle: ComponentHandle, _value: bool, _offset: f64) {}

    fn update_scalar_component(&self, _handle: ComponentHandle, _value: f32, _offset: f64) {}
}

impl PrintingHost {
    fn component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        let handle = self.next_component.fetch_add(1, Ordering::Relaxed) + 1;
        println!("  dev={} {} -> component {}", index, path, handle);
        handle
    }
}

fn main() {
    env_logger::init();

    let provider = match DeviceProvider::init(
        Arc::new(PrintingHost::default()),
        BridgeConfig::from_env(),
    ) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to start bridge: {}", e);
            std::process::exit(1);
        }
    };

    println!("Bridge listening on {} (Ctrl+C to stop)...", provider.local_addr());

    let mut last_report = Instant::now();
    loop {
        let frame_start = Instant::now();
        provider.run_frame();

        if last_report.elapsed() >= Duration::from_secs(3) {
            println!("--- {} active devices ---", provider.active_devices());
            last_report = Instant::now();
        }

        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
