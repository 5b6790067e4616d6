use crate::config::BridgeConfig;
use crate::context::{CancellationToken, Context};
use crate::host::HostRuntime;
use crate::pool::{self, DevicePool, SharedPool};
use crate::registry::SessionRegistry;
use crate::transport::TcpServer;
use crate::{BridgeError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// The bridge as seen by the host runtime: one instance per process.
///
/// `init` binds the listening endpoint and starts the session thread, which
/// is the only thread that touches the roster and mutates the device pool.
/// The host runtime calls [`DeviceProvider::run_frame`] from its own frame
/// thread.
pub struct DeviceProvider {
    ctx: Context,
    pool: SharedPool,
    local_addr: SocketAddr,
    stop: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl DeviceProvider {
    /// Bind the listening endpoint and start the session thread.
    ///
    /// Failing to bind is the only fatal startup condition.
    pub fn init(host: Arc<dyn HostRuntime>, config: BridgeConfig) -> Result<DeviceProvider> {
        config.validate()?;
        let server = TcpServer::bind(config.socket_addr(), config.max_payload)?;
        let local_addr = server.local_addr();

        let ctx = Context::new(host, server.transport(), config);
        let pool = DevicePool::shared(ctx.clone());
        let registry = SessionRegistry::new(ctx.clone(), pool.clone());

        let stop = CancellationToken::new();
        let pump_stop = stop.clone();
        let poll_interval = ctx.config.poll_interval;
        let pump = std::thread::Builder::new()
            .name("hvr-session".into())
            .spawn(move || {
                session_loop(server, registry, pump_stop, poll_interval);
            })?;

        log::info!("Device provider initialized on {}", local_addr);

        Ok(DeviceProvider {
            ctx,
            pool,
            local_addr,
            stop,
            pump: Some(pump),
        })
    }

    /// Address peripherals connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// One host runtime frame: dispatch pending host events, then refresh inputs.
    pub fn run_frame(&self) {
        let mut pool = pool::lock(&self.pool);
        while let Some(event) = self.ctx.host.poll_event() {
            pool.dispatch_event(&event);
        }
        pool.run_frame();
    }

    /// Number of devices currently bound to a live peripheral.
    pub fn active_devices(&self) -> usize {
        pool::lock(&self.pool).active_count()
    }

    /// Stop the session thread, announce removals and deactivate every device.
    pub fn cleanup(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.cancel();
        if let Some(thread) = self.pump.take() {
            let _ = thread.join();
            pool::lock(&self.pool).deactivate_all();
            log::info!("Device provider shut down");
        }
    }
}

impl Drop for DeviceProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The session pump runs in a dedicated thread.
///
/// On exit it announces every remaining device before closing connections,
/// so peers see a removal instead of a silent drop.
fn session_loop(
    mut server: TcpServer,
    mut registry: SessionRegistry,
    stop: CancellationToken,
    poll_interval: Duration,
) {
    log::info!("Session pump started");

    loop {
        if stop.is_cancelled() {
            log::info!("Session pump stopping (stop flag set)");
            break;
        }

        match server.recv_timeout(poll_interval) {
            Ok(event) => registry.handle_event(event),
            Err(BridgeError::Timeout) => continue,
            Err(e) => {
                log::warn!("Session events ended: {}", e);
                break;
            }
        }
    }

    registry.shutdown();
    server.shutdown();
    log::info!("Session pump stopped");
}
