//! Relay carrying stream events from an inspected page to its panel.
//!
//! ```text
//! page emitter -> Bridge -(bridge link)-> Forwarder -(panel port)-> PanelClient -> session
//! ```
//!
//! The [`Forwarder`] keeps one panel and one bridge per tab and injects the page scripts once
//! per page lifetime through an [`Injector`].

pub mod bridge;
pub mod error;
pub mod forwarder;
pub mod host;
pub mod panel_client;
pub mod port;

pub use bridge::{install_bridge, Bridge, BridgeConnector, IsolatedWorld};
pub use error::{RelayError, Result};
pub use forwarder::{Forwarder, ForwarderBridgeConnector};
pub use host::{HostEnvironment, HostFlag, Injector, ScriptTarget, TabId};
pub use panel_client::{ConnectionStatus, PanelClient, PanelTransport};
pub use port::{BridgeLink, PanelConnection, PanelMessage, PanelPort, Port};
