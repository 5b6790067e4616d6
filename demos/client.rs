//! Peripheral stand-in: a benchmark loop or a device walking in a circle.
//!
//! Usage: cargo run --example client [host:port]
//! Press Ctrl+C to stop.

use hvr_bridge::client::{ClientEvent, PeripheralClient};
use hvr_bridge::protocol::DEFAULT_PORT;
use hvr_bridge::{DeviceDescriptor, DeviceRole, DeviceType, Vec3};
use std::io::{self, BufRead, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(16);

fn ask(prompt: &str) -> String {
    print!("{} ", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

fn connect(addr: SocketAddr, desc: DeviceDescriptor) -> PeripheralClient {
    match PeripheralClient::connect(addr, desc) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

fn drain(client: &mut PeripheralClient) -> Vec<ClientEvent> {
    match client.poll() {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Connection lost: {}", e);
            std::process::exit(1);
        }
    }
}

/// Send updates as fast as the bridge answers and print per-tick cost.
fn bench(addr: SocketAddr) {
    let mut start = DeviceDescriptor::default();
    start.position = Vec3::new(3.0, 0.0, 3.0);
    let mut client = connect(addr, start);

    loop {
        let tick = Instant::now();
        for event in drain(&mut client) {
            if let ClientEvent::Identity(id) = event {
                println!("Assigned Client ID = {}", id);
            }
        }
        if let Err(e) = client.send_update() {
            eprintln!("Send failed: {}", e);
            break;
        }
        println!("elapsed(ns): {}", tick.elapsed().as_nanos());
    }
}

/// Walk the device around a circle and print what the bridge mirrors back.
fn demo(addr: SocketAddr, device_type: DeviceType, role: DeviceRole) {
    let mut start = DeviceDescriptor::new(device_type, role);
    start.position = Vec3::new(3.0, 0.0, 3.0);
    let mut client = connect(addr, start);

    let epoch = Instant::now();
    let mut last_print = Instant::now();
    loop {
        for event in drain(&mut client) {
            match event {
                ClientEvent::Identity(id) => println!("Assigned Client ID = {}", id),
                ClientEvent::Added(desc) => println!("+ device {} ({:?})", desc.id, desc.device_type),
                ClientEvent::Removed(id) => println!("- device {}", id),
                _ => {}
            }
        }

        let t = epoch.elapsed().as_secs_f64();
        let desc = client.descriptor_mut();
        desc.position = Vec3::new(3.0 + t.cos(), 0.0, 3.0 + t.sin());
        desc.velocity = Vec3::new(-t.sin(), 0.0, t.cos());
        if let Err(e) = client.send_update() {
            eprintln!("Send failed: {}", e);
            break;
        }

        if last_print.elapsed() >= Duration::from_secs(1) {
            for (id, desc) in client.devices() {
                let p = desc.position;
                println!("  {:>4}: [{:+.3}, {:+.3}, {:+.3}]", id, p.x, p.y, p.z);
            }
            last_print = Instant::now();
        }
        std::thread::sleep(TICK);
    }
}

fn main() {
    env_logger::init();

    let addr = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or_else(|| SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_PORT));

    match ask("bench/demo? [0/1]").as_str() {
        "0" => bench(addr),
        _ => {
            let (device_type, role) = match ask("device type? [t/c]").as_str() {
                "c" => (DeviceType::ControllerViveLike, DeviceRole::Left),
                _ => (DeviceType::Tracker, DeviceRole::Neither),
            };
            demo(addr, device_type, role)
        }
    }
}
