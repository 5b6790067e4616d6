use crate::config::BridgeConfig;
use crate::host::HostRuntime;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything a component needs to reach the outside world.
///
/// Built once at startup and cloned into each component's constructor,
/// so no part of the bridge reaches for a global runtime accessor.
#[derive(Clone)]
pub struct Context {
    pub host: Arc<dyn HostRuntime>,
    pub transport: Arc<dyn Transport>,
    pub config: Arc<BridgeConfig>,
}

impl Context {
    pub fn new(
        host: Arc<dyn HostRuntime>,
        transport: Arc<dyn Transport>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            host,
            transport,
            config: Arc::new(config),
        }
    }
}

/// Shared stop signal for background threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
