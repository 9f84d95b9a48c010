//! Inner leg of the relay: the isolated-world bridge that carries page events out.
//!
//! The bridge accepts only marker-bearing messages. While its channel is down it keeps a
//! bounded FIFO queue (oldest evicted first) and reconnects lazily on the next delivery,
//! flushing the queue in order before the new message. Once the host reports invalidation the
//! bridge goes quiet for good.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use streamscope_intercept::EventSink;
use streamscope_types::{has_marker, BridgeConfig, StreamEvent};

use crate::error::Result;
use crate::host::HostEnvironment;
use crate::port::BridgeLink;

/// Opens the bridge's channel toward the forwarder.
pub trait BridgeConnector: Send + Sync {
    fn connect(&self) -> Result<BridgeLink>;
}

#[derive(Default)]
struct BridgeState {
    link: Option<BridgeLink>,
    queue: VecDeque<Value>,
    invalidated: bool,
}

pub struct Bridge {
    connector: Arc<dyn BridgeConnector>,
    host: Arc<dyn HostEnvironment>,
    config: BridgeConfig,
    state: Mutex<BridgeState>,
}

impl Bridge {
    pub fn new(
        connector: Arc<dyn BridgeConnector>,
        host: Arc<dyn HostEnvironment>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            connector,
            host,
            config,
            state: Mutex::new(BridgeState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Send or queue `message`. Returns `false` when it was ignored or the bridge is dead.
    pub fn post(&self, message: Value) -> bool {
        if !has_marker(&message) {
            return false;
        }

        let mut state = self.state();
        if state.invalidated {
            return false;
        }
        if !self.host.is_valid() {
            tracing::warn!(
                dropped = state.queue.len() + 1,
                "extension context invalidated, bridge stopped"
            );
            state.invalidated = true;
            state.link = None;
            state.queue.clear();
            return false;
        }

        if state.link.is_none() {
            self.reconnect(&mut state);
        }

        if let Some(link) = state.link.as_ref() {
            match link.send(message) {
                Ok(()) => return true,
                Err(err) => {
                    tracing::warn!("bridge channel closed, queueing");
                    state.link = None;
                    self.enqueue(&mut state, err.0);
                }
            }
        } else {
            self.enqueue(&mut state, message);
        }
        true
    }

    /// Try to open a channel now, flushing anything queued.
    pub fn connect(&self) -> bool {
        let mut state = self.state();
        if state.invalidated || !self.host.is_valid() {
            return false;
        }
        if state.link.is_none() {
            self.reconnect(&mut state);
        }
        state.link.is_some()
    }

    fn reconnect(&self, state: &mut BridgeState) {
        match self.connector.connect() {
            Ok(link) => {
                tracing::debug!(queued = state.queue.len(), "bridge connected");
                state.link = Some(link);
                self.flush(state);
            }
            Err(err) => tracing::debug!(error = %err, "bridge connect failed"),
        }
    }

    fn flush(&self, state: &mut BridgeState) {
        while let Some(message) = state.queue.pop_front() {
            let Some(link) = state.link.as_ref() else {
                state.queue.push_front(message);
                return;
            };
            if let Err(err) = link.send(message) {
                state.queue.push_front(err.0);
                state.link = None;
                return;
            }
        }
    }

    fn enqueue(&self, state: &mut BridgeState, message: Value) {
        if self.config.queue_capacity == 0 {
            return;
        }
        while state.queue.len() >= self.config.queue_capacity {
            state.queue.pop_front();
        }
        state.queue.push_back(message);
    }

    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_connected(&self) -> bool {
        self.state()
            .link
            .as_ref()
            .is_some_and(|link| !link.is_closed())
    }
}

impl EventSink for Bridge {
    fn deliver(&self, event: StreamEvent) {
        match event.to_wire() {
            Ok(wire) => {
                self.post(wire);
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode event"),
        }
    }
}

/// The isolated world of one page. Holds the bridge once it has been installed.
#[derive(Default)]
pub struct IsolatedWorld {
    bridge: OnceLock<Arc<Bridge>>,
}

impl IsolatedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bridge(&self) -> Option<Arc<Bridge>> {
        self.bridge.get().cloned()
    }
}

/// Install the bridge into `world` and open its channel. A second install is a no-op.
pub fn install_bridge(
    world: &IsolatedWorld,
    connector: Arc<dyn BridgeConnector>,
    host: Arc<dyn HostEnvironment>,
    config: BridgeConfig,
) -> bool {
    let mut installed = false;
    let bridge = world.bridge.get_or_init(|| {
        installed = true;
        Arc::new(Bridge::new(connector, host, config))
    });
    if !installed {
        tracing::warn!("bridge already installed, skipping");
        return false;
    }
    bridge.connect();
    tracing::info!("bridge installed");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::host::HostFlag;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct TestConnector {
        up: AtomicBool,
        attempts: AtomicUsize,
        links: Mutex<Vec<mpsc::UnboundedReceiver<Value>>>,
    }

    impl TestConnector {
        fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(up),
                attempts: AtomicUsize::new(0),
                links: Mutex::new(Vec::new()),
            })
        }

        fn drain(&self) -> Vec<Value> {
            let mut links = self.links.lock().unwrap();
            let mut out = Vec::new();
            for rx in links.iter_mut() {
                while let Ok(value) = rx.try_recv() {
                    out.push(value);
                }
            }
            out
        }

        fn drop_links(&self) {
            self.links.lock().unwrap().clear();
        }
    }

    impl BridgeConnector for TestConnector {
        fn connect(&self) -> Result<BridgeLink> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.up.load(Ordering::SeqCst) {
                return Err(RelayError::Disconnected);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            self.links.lock().unwrap().push(rx);
            Ok(tx)
        }
    }

    fn marked(n: u64) -> Value {
        json!({"__sse_viewer": true, "n": n})
    }

    fn numbers(values: &[Value]) -> Vec<u64> {
        values.iter().filter_map(|v| v["n"].as_u64()).collect()
    }

    #[test]
    fn test_unmarked_messages_are_ignored() {
        let connector = TestConnector::new(true);
        let bridge = Bridge::new(connector.clone(), Arc::new(HostFlag::new()), BridgeConfig::default());

        assert!(!bridge.post(json!({"n": 1})));
        assert!(!bridge.post(json!({"__sse_viewer": false, "n": 2})));
        assert!(connector.drain().is_empty());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queue_evicts_oldest_and_flushes_in_order() {
        let connector = TestConnector::new(false);
        let config = BridgeConfig::default().with_queue_capacity(3);
        let bridge = Bridge::new(connector.clone(), Arc::new(HostFlag::new()), config);

        for n in 1..=5 {
            assert!(bridge.post(marked(n)));
        }
        assert_eq!(bridge.queued(), 3);
        assert!(!bridge.is_connected());

        connector.up.store(true, Ordering::SeqCst);
        assert!(bridge.post(marked(6)));

        assert_eq!(numbers(&connector.drain()), vec![3, 4, 5, 6]);
        assert_eq!(bridge.queued(), 0);
        assert!(bridge.is_connected());
    }

    #[test]
    fn test_closed_link_requeues_and_reconnects_lazily() {
        let connector = TestConnector::new(true);
        let bridge = Bridge::new(connector.clone(), Arc::new(HostFlag::new()), BridgeConfig::default());

        assert!(bridge.connect());
        bridge.post(marked(1));
        assert_eq!(numbers(&connector.drain()), vec![1]);

        connector.drop_links();
        connector.up.store(false, Ordering::SeqCst);
        bridge.post(marked(2));
        assert_eq!(bridge.queued(), 1);

        connector.up.store(true, Ordering::SeqCst);
        bridge.post(marked(3));
        assert_eq!(numbers(&connector.drain()), vec![2, 3]);
    }

    #[test]
    fn test_invalidation_stops_queueing_and_reconnecting() {
        let connector = TestConnector::new(false);
        let host = HostFlag::new();
        let bridge = Bridge::new(connector.clone(), Arc::new(host.clone()), BridgeConfig::default());

        bridge.post(marked(1));
        assert_eq!(bridge.queued(), 1);
        let attempts = connector.attempts.load(Ordering::SeqCst);

        host.invalidate();
        connector.up.store(true, Ordering::SeqCst);
        assert!(!bridge.post(marked(2)));
        assert!(!bridge.post(marked(3)));
        assert!(!bridge.connect());

        assert_eq!(bridge.queued(), 0);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), attempts);
        assert!(connector.drain().is_empty());
    }

    #[test]
    fn test_install_bridge_once() {
        let world = IsolatedWorld::new();
        let connector = TestConnector::new(true);
        let host: Arc<dyn HostEnvironment> = Arc::new(HostFlag::new());

        assert!(install_bridge(&world, connector.clone(), host.clone(), BridgeConfig::default()));
        assert!(!install_bridge(&world, connector.clone(), host, BridgeConfig::default()));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert!(world.bridge().unwrap().is_connected());
    }
}
