use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use streamscope_types::{RelayConfig, StreamEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{RelayError, Result};
use crate::host::{HostEnvironment, TabId};
use crate::port::{PanelMessage, PanelPort};

/// Opens a panel connection to the forwarder.
#[async_trait]
pub trait PanelTransport: Send + Sync {
    async fn connect(&self) -> Result<PanelPort>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    ReconnectFailed,
    ContextInvalidated,
    ConnectionFailed,
    Closed,
}

impl ConnectionStatus {
    /// True once the client has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::ReconnectFailed
                | ConnectionStatus::ContextInvalidated
                | ConnectionStatus::Closed
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting { attempt } => write!(f, "reconnecting ({})", attempt),
            ConnectionStatus::ReconnectFailed => write!(f, "reconnect failed"),
            ConnectionStatus::ContextInvalidated => write!(f, "context invalidated"),
            ConnectionStatus::ConnectionFailed => write!(f, "connection failed"),
            ConnectionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Resolves once `shutdown` reads `true`. A dropped sender never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

enum Session {
    Disconnected,
    Failed,
    Invalidated,
    Shutdown,
}

/// Outer leg of the relay: the panel's connection to the forwarder.
///
/// Sends one `Init` per connection and forwards every marker-bearing message it receives as a
/// [`StreamEvent`]. A dropped connection is retried at a fixed interval up to the configured
/// number of attempts; a successful connection resets the count.
pub struct PanelClient {
    transport: Arc<dyn PanelTransport>,
    host: Arc<dyn HostEnvironment>,
    tab: TabId,
    config: RelayConfig,
    status: watch::Sender<ConnectionStatus>,
}

impl PanelClient {
    pub fn new(
        transport: Arc<dyn PanelTransport>,
        host: Arc<dyn HostEnvironment>,
        tab: TabId,
        config: RelayConfig,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            transport,
            host,
            tab,
            config,
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        tracing::debug!(tab = self.tab, status = %status, "panel connection status");
        self.status.send_replace(status);
    }

    /// Run until a terminal status is reached. `shutdown` flipping to `true` closes the client.
    pub async fn run(
        self,
        events: mpsc::UnboundedSender<StreamEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ConnectionStatus {
        let mut attempts: u32 = 0;

        loop {
            if !self.host.is_valid() {
                tracing::error!(tab = self.tab, "extension context invalid, stopping reconnect attempts");
                return self.finish(ConnectionStatus::ContextInvalidated);
            }

            match self.session(&events, &mut shutdown, &mut attempts).await {
                Session::Shutdown => return self.finish(ConnectionStatus::Closed),
                Session::Invalidated => return self.finish(ConnectionStatus::ContextInvalidated),
                Session::Failed if attempts == 0 => self.set_status(ConnectionStatus::ConnectionFailed),
                Session::Failed | Session::Disconnected => self.set_status(ConnectionStatus::Reconnecting {
                    attempt: attempts + 1,
                }),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_interval()) => {}
                _ = shutdown_requested(&mut shutdown) => return self.finish(ConnectionStatus::Closed),
            }

            if attempts >= self.config.max_reconnect_attempts {
                tracing::error!(tab = self.tab, attempts, "max reconnect attempts reached");
                return self.finish(ConnectionStatus::ReconnectFailed);
            }
            attempts += 1;
            tracing::info!(
                tab = self.tab,
                attempt = attempts,
                max = self.config.max_reconnect_attempts,
                "reconnect attempt"
            );
            self.set_status(ConnectionStatus::Reconnecting { attempt: attempts });
        }
    }

    async fn session(
        &self,
        events: &mpsc::UnboundedSender<StreamEvent>,
        shutdown: &mut watch::Receiver<bool>,
        attempts: &mut u32,
    ) -> Session {
        let mut port = match self.transport.connect().await {
            Ok(port) => port,
            Err(RelayError::ContextInvalidated) => return Session::Invalidated,
            Err(err) => {
                tracing::warn!(tab = self.tab, error = %err, "failed to connect to forwarder");
                return Session::Failed;
            }
        };

        if port.tx.send(PanelMessage::Init { tab_id: self.tab }).is_err() {
            tracing::warn!(tab = self.tab, "failed to send init message");
            return Session::Failed;
        }
        *attempts = 0;
        self.set_status(ConnectionStatus::Connected);
        tracing::info!(tab = self.tab, "connected to forwarder");

        loop {
            tokio::select! {
                message = port.rx.recv() => match message {
                    Some(message) => {
                        let Some(event) = StreamEvent::from_wire(&message) else {
                            continue;
                        };
                        if events.send(event).is_err() {
                            return Session::Shutdown;
                        }
                    }
                    None => {
                        tracing::warn!(tab = self.tab, "port disconnected, will attempt reconnect");
                        return Session::Disconnected;
                    }
                },
                _ = shutdown_requested(shutdown) => return Session::Shutdown,
            }
        }
    }

    fn finish(&self, status: ConnectionStatus) -> ConnectionStatus {
        self.set_status(status.clone());
        status
    }

    /// Run on the current runtime. Returns the task and a status receiver.
    pub fn spawn(
        self,
        events: mpsc::UnboundedSender<StreamEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<ConnectionStatus>, watch::Receiver<ConnectionStatus>) {
        let status = self.status();
        (tokio::spawn(self.run(events, shutdown)), status)
    }
}
