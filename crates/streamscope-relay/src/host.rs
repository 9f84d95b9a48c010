use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;

pub type TabId = u32;

/// Where an injected script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptTarget {
    /// Isolated world; hosts the bridge
    Bridge,
    /// The page's own world; hosts the interceptors
    MainWorld,
}

/// Places a script into a tab. Injection for a tab is requested once per page lifetime.
#[async_trait]
pub trait Injector: Send + Sync {
    async fn inject(&self, tab: TabId, target: ScriptTarget) -> Result<()>;
}

/// Whether the extension runtime is still usable.
pub trait HostEnvironment: Send + Sync {
    fn is_valid(&self) -> bool;
}

/// Host validity flag that can be flipped once to invalid.
#[derive(Debug, Clone)]
pub struct HostFlag {
    valid: Arc<AtomicBool>,
}

impl Default for HostFlag {
    fn default() -> Self {
        Self {
            valid: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl HostFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl HostEnvironment for HostFlag {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}
