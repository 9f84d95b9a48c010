use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use streamscope_types::{now_millis, ErrorPayload, EventBody, StreamEvent};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, RwLock};

use crate::bridge::BridgeConnector;
use crate::error::{RelayError, Result};
use crate::host::{Injector, ScriptTarget, TabId};
use crate::panel_client::PanelTransport;
use crate::port::{BridgeLink, PanelConnection, PanelMessage, PanelPort, Port};

struct BridgeEntry {
    id: u64,
    shutdown: watch::Sender<bool>,
}

struct ForwarderInner {
    panels: RwLock<HashMap<TabId, mpsc::UnboundedSender<Value>>>,
    bridges: RwLock<HashMap<TabId, BridgeEntry>>,
    injected: RwLock<HashSet<TabId>>,
    injector: Arc<dyn Injector>,
    next_bridge: AtomicU64,
}

/// Background hop between page bridges and panels, one logical channel per tab.
///
/// Messages are passed through untouched; a message for a tab with no panel attached is dropped.
#[derive(Clone)]
pub struct Forwarder {
    inner: Arc<ForwarderInner>,
}

impl Forwarder {
    pub fn new(injector: Arc<dyn Injector>) -> Self {
        Self {
            inner: Arc::new(ForwarderInner {
                panels: RwLock::new(HashMap::new()),
                bridges: RwLock::new(HashMap::new()),
                injected: RwLock::new(HashSet::new()),
                injector,
                next_bridge: AtomicU64::new(1),
            }),
        }
    }

    /// Register a panel for `tab` and inject the page scripts if this page has none yet.
    ///
    /// Injection failure is reported to the panel as an `error` event; the panel stays attached.
    pub async fn attach_panel(&self, tab: TabId, sender: mpsc::UnboundedSender<Value>) {
        self.inner.panels.write().await.insert(tab, sender.clone());
        tracing::info!(tab, "panel attached");

        let mut injected = self.inner.injected.write().await;
        if injected.contains(&tab) {
            tracing::debug!(tab, "scripts already injected, skipping");
            return;
        }

        match self.inject_scripts(tab).await {
            Ok(()) => {
                injected.insert(tab);
                tracing::info!(tab, "scripts injected");
            }
            Err(err) => {
                tracing::warn!(tab, error = %err, "script injection failed");
                let body = EventBody::Error(ErrorPayload {
                    message: Some(err.to_string()),
                    ..Default::default()
                });
                match StreamEvent::new("", now_millis(), body).to_wire() {
                    Ok(wire) => {
                        let _ = sender.send(wire);
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to encode injection error"),
                }
            }
        }
    }

    async fn inject_scripts(&self, tab: TabId) -> Result<()> {
        self.inner.injector.inject(tab, ScriptTarget::Bridge).await?;
        self.inner.injector.inject(tab, ScriptTarget::MainWorld).await
    }

    /// Drive one panel connection until the panel hangs up.
    pub async fn serve_panel(&self, mut connection: PanelConnection) {
        let mut attached: Option<TabId> = None;
        while let Some(message) = connection.rx.recv().await {
            match message {
                PanelMessage::Init { tab_id } => {
                    self.attach_panel(tab_id, connection.tx.clone()).await;
                    attached = Some(tab_id);
                }
            }
        }

        if let Some(tab) = attached {
            let mut panels = self.inner.panels.write().await;
            // a newer panel for the same tab may already have replaced this one
            if panels
                .get(&tab)
                .is_some_and(|current| current.same_channel(&connection.tx))
            {
                panels.remove(&tab);
                tracing::info!(tab, "panel disconnected");
            }
        }
    }

    /// Open a bridge channel for `tab`. Messages sent into the returned link are forwarded to
    /// the tab's panel until the bridge is dropped or the tab goes away.
    pub fn connect_bridge(&self, tab: TabId) -> Result<BridgeLink> {
        let handle = Handle::try_current().map_err(|_| RelayError::NoRuntime)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let id = self.inner.next_bridge.fetch_add(1, Ordering::Relaxed);
        let forwarder = self.clone();

        handle.spawn(async move {
            {
                let mut bridges = forwarder.inner.bridges.write().await;
                if let Some(previous) = bridges.insert(
                    tab,
                    BridgeEntry {
                        id,
                        shutdown: shutdown_tx,
                    },
                ) {
                    let _ = previous.shutdown.send(true);
                }
            }
            tracing::info!(tab, "bridge connected");

            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(message) => {
                            forwarder.forward(tab, message).await;
                        }
                        None => break,
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }

            let mut bridges = forwarder.inner.bridges.write().await;
            if bridges.get(&tab).is_some_and(|entry| entry.id == id) {
                bridges.remove(&tab);
                tracing::info!(tab, "bridge disconnected");
            }
        });

        Ok(tx)
    }

    /// Pass `message` to the panel for `tab`. Returns whether it was handed over.
    pub async fn forward(&self, tab: TabId, message: Value) -> bool {
        let failed = {
            let panels = self.inner.panels.read().await;
            let Some(panel) = panels.get(&tab) else {
                tracing::trace!(tab, "no panel attached, message dropped");
                return false;
            };
            match panel.send(message) {
                Ok(()) => return true,
                Err(_) => panel.clone(),
            }
        };

        let mut panels = self.inner.panels.write().await;
        if panels
            .get(&tab)
            .is_some_and(|current| current.same_channel(&failed))
        {
            panels.remove(&tab);
        }
        tracing::warn!(tab, "panel send failed, panel removed");
        false
    }

    pub async fn panel_disconnected(&self, tab: TabId) {
        if self.inner.panels.write().await.remove(&tab).is_some() {
            tracing::info!(tab, "panel disconnected");
        }
    }

    pub async fn bridge_disconnected(&self, tab: TabId) {
        if let Some(entry) = self.inner.bridges.write().await.remove(&tab) {
            let _ = entry.shutdown.send(true);
            tracing::info!(tab, "bridge disconnected");
        }
    }

    /// Forget everything about a closed tab.
    pub async fn tab_removed(&self, tab: TabId) {
        self.inner.injected.write().await.remove(&tab);
        self.inner.panels.write().await.remove(&tab);
        if let Some(entry) = self.inner.bridges.write().await.remove(&tab) {
            let _ = entry.shutdown.send(true);
        }
        tracing::info!(tab, "tab removed, cleaned up");
    }

    /// A navigation loads a fresh page that needs its scripts again.
    pub async fn tab_navigated(&self, tab: TabId) {
        if self.inner.injected.write().await.remove(&tab) {
            tracing::info!(tab, "tab navigated, cleared injection flag");
        }
    }

    pub async fn has_panel(&self, tab: TabId) -> bool {
        self.inner.panels.read().await.contains_key(&tab)
    }

    pub async fn has_bridge(&self, tab: TabId) -> bool {
        self.inner.bridges.read().await.contains_key(&tab)
    }

    pub async fn is_injected(&self, tab: TabId) -> bool {
        self.inner.injected.read().await.contains(&tab)
    }

    /// Connector a page bridge in `tab` uses to (re)open its channel.
    pub fn bridge_connector(&self, tab: TabId) -> ForwarderBridgeConnector {
        ForwarderBridgeConnector {
            forwarder: self.clone(),
            tab,
        }
    }
}

#[async_trait]
impl PanelTransport for Forwarder {
    async fn connect(&self) -> Result<PanelPort> {
        let (panel, connection) = Port::pair();
        let forwarder = self.clone();
        tokio::spawn(async move { forwarder.serve_panel(connection).await });
        Ok(panel)
    }
}

pub struct ForwarderBridgeConnector {
    forwarder: Forwarder,
    tab: TabId,
}

impl BridgeConnector for ForwarderBridgeConnector {
    fn connect(&self) -> Result<BridgeLink> {
        self.forwarder.connect_bridge(self.tab)
    }
}
