use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::host::TabId;

/// Control messages a panel sends to the forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelMessage {
    /// First message on every panel connection.
    Init {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

/// One end of a bidirectional message port.
#[derive(Debug)]
pub struct Port<In, Out> {
    pub tx: mpsc::UnboundedSender<Out>,
    pub rx: mpsc::UnboundedReceiver<In>,
}

impl<In, Out> Port<In, Out> {
    /// Both ends of a fresh port.
    pub fn pair() -> (Port<In, Out>, Port<Out, In>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Port {
                tx: out_tx,
                rx: in_rx,
            },
            Port {
                tx: in_tx,
                rx: out_rx,
            },
        )
    }
}

/// The panel's end: wire messages in, control messages out.
pub type PanelPort = Port<Value, PanelMessage>;

/// The forwarder's end of a panel connection.
pub type PanelConnection = Port<PanelMessage, Value>;

/// Sender half the bridge posts wire messages into.
pub type BridgeLink = mpsc::UnboundedSender<Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_message_shape() {
        let message = PanelMessage::Init { tab_id: 42 };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "init", "tabId": 42})
        );
    }

    #[tokio::test]
    async fn test_pair_is_crossed() {
        let (mut panel, mut forwarder): (PanelPort, PanelConnection) = Port::pair();
        panel.tx.send(PanelMessage::Init { tab_id: 1 }).unwrap();
        forwarder.tx.send(json!({"x": 1})).unwrap();

        assert_eq!(forwarder.rx.recv().await, Some(PanelMessage::Init { tab_id: 1 }));
        assert_eq!(panel.rx.recv().await, Some(json!({"x": 1})));
    }
}
