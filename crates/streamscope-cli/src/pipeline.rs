//! In-process wiring of the whole relay: one simulated tab whose page, bridge, forwarder and
//! panel all live in this process.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use streamscope_intercept::{install_interceptors, EventEmitter, EventSink, PageContext};
use streamscope_panel::PanelSession;
use streamscope_relay::{
    install_bridge, Bridge, ConnectionStatus, Forwarder, HostEnvironment, HostFlag, Injector,
    IsolatedWorld, PanelClient, RelayError, ScriptTarget, TabId,
};
use streamscope_types::{NoiseFilter, StreamEvent};

use crate::config::Config;

/// Tab id of the single simulated page.
pub const LOCAL_TAB: TabId = 1;

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bridge sink that counts what the bridge accepted, so the panel side knows what to expect.
struct TallySink {
    bridge: Arc<Bridge>,
    accepted: Arc<AtomicUsize>,
}

impl EventSink for TallySink {
    fn deliver(&self, event: StreamEvent) {
        match event.to_wire() {
            Ok(wire) => {
                if self.bridge.post(wire) {
                    self.accepted.fetch_add(1, Ordering::SeqCst);
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode event"),
        }
    }
}

/// The page side of the simulated tab; doubles as the forwarder's injector.
///
/// Holds the forwarder only while the pipeline runs, since the forwarder holds it back.
struct LocalPage {
    page: Mutex<Option<PageContext>>,
    world: IsolatedWorld,
    host: HostFlag,
    config: Config,
    forwarder: std::sync::Mutex<Option<Forwarder>>,
    accepted: Arc<AtomicUsize>,
    ready: watch::Sender<bool>,
}

impl LocalPage {
    fn set_forwarder(&self, forwarder: Option<Forwarder>) {
        if let Ok(mut slot) = self.forwarder.lock() {
            *slot = forwarder;
        }
    }
}

#[async_trait]
impl Injector for LocalPage {
    async fn inject(&self, tab: TabId, target: ScriptTarget) -> streamscope_relay::Result<()> {
        let injection_error = |reason: &str| RelayError::Injection {
            tab,
            reason: reason.to_string(),
        };

        match target {
            ScriptTarget::Bridge => {
                let forwarder = self
                    .forwarder
                    .lock()
                    .ok()
                    .and_then(|slot| slot.clone())
                    .ok_or_else(|| injection_error("forwarder not started"))?;
                let host: Arc<dyn HostEnvironment> = Arc::new(self.host.clone());
                install_bridge(
                    &self.world,
                    Arc::new(forwarder.bridge_connector(tab)),
                    host,
                    self.config.bridge.clone(),
                );
                Ok(())
            }
            ScriptTarget::MainWorld => {
                let bridge = self
                    .world
                    .bridge()
                    .ok_or_else(|| injection_error("bridge not installed"))?;
                let filter = self.config.filter.apply(NoiseFilter::page_default());
                let sink = TallySink {
                    bridge,
                    accepted: Arc::clone(&self.accepted),
                };
                let emitter = EventEmitter::with_filter(Arc::new(sink), filter);

                let mut guard = self.page.lock().await;
                let page = guard
                    .as_mut()
                    .ok_or_else(|| injection_error("page already taken"))?;
                install_interceptors(page, &emitter);
                self.ready.send_replace(true);
                Ok(())
            }
        }
    }
}

/// A running pipeline. Drive the page's primitives, then [`finish`](Pipeline::finish) to
/// collect everything the panel received.
pub struct Pipeline {
    page: Arc<LocalPage>,
    forwarder: Forwarder,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    client: JoinHandle<ConnectionStatus>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: watch::Sender<bool>,
}

impl Pipeline {
    /// Start the forwarder and panel client around `page`, and wait for the interceptors.
    pub async fn start(config: Config, page: PageContext) -> anyhow::Result<(Self, PageContext)> {
        let (ready_tx, mut ready_rx) = watch::channel(false);
        let local = Arc::new(LocalPage {
            page: Mutex::new(Some(page)),
            world: IsolatedWorld::new(),
            host: HostFlag::new(),
            config: config.clone(),
            forwarder: std::sync::Mutex::new(None),
            accepted: Arc::new(AtomicUsize::new(0)),
            ready: ready_tx,
        });

        let forwarder = Forwarder::new(local.clone());
        local.set_forwarder(Some(forwarder.clone()));

        let client = PanelClient::new(
            Arc::new(forwarder.clone()),
            Arc::new(local.host.clone()),
            LOCAL_TAB,
            config.relay.clone(),
        );
        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (client, status) = client.spawn(events_tx, shutdown_rx);

        tokio::time::timeout(READY_TIMEOUT, ready_rx.wait_for(|ready| *ready))
            .await
            .context("timed out waiting for interceptors")?
            .context("page host dropped")?;

        let page = local
            .page
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("page already taken"))?;
        tracing::info!(tab = LOCAL_TAB, "pipeline ready");

        Ok((
            Self {
                page: local,
                forwarder,
                events,
                client,
                status,
                shutdown,
            },
            page,
        ))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Wait for every accepted event to reach the panel side, then shut the relay down.
    pub async fn finish(mut self) -> anyhow::Result<PanelSession> {
        let expected = self.page.accepted.load(Ordering::SeqCst);
        let mut session = PanelSession::new();

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while session.len() < expected {
                match self.events.recv().await {
                    Some(event) => session.push(event),
                    None => break,
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                expected,
                received = session.len(),
                "timed out waiting for events to reach the panel"
            );
        }

        self.shutdown.send_replace(true);
        let status = self.client.await.context("panel client task failed")?;
        tracing::debug!(status = %status, "panel client stopped");

        self.forwarder.tab_removed(LOCAL_TAB).await;
        self.page.set_forwarder(None);
        Ok(session)
    }
}
