//! Per-connection handler: claim a panel, then pump frames both ways.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use marquee_webview::{GuiController, GuiState, MemoryPanel, PanelPeer};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use super::factory::SocketPanelFactory;

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    mut ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    controller: GuiController,
    factory: &SocketPanelFactory,
) {
    let Some(peer) = claim_panel(&controller, factory).await else {
        warn!(peer = %addr, "No panel available for connection");
        let _ = ws.close(None).await;
        return;
    };

    let endpoint = peer.id.clone();
    info!(peer = %addr, endpoint = %endpoint, "Webview connected");
    pump(ws, addr, peer).await;
    info!(peer = %addr, endpoint = %endpoint, "Webview disconnected");
}

/// Pick the panel this connection will render: the one the controller is
/// waiting on, a secondary view of the active one, or a freshly opened one.
async fn claim_panel(controller: &GuiController, factory: &SocketPanelFactory) -> Option<PanelPeer> {
    if let Some(peer) = factory.take_pending() {
        return Some(peer);
    }

    let wait = controller.options().ready_timeout;
    match controller.status() {
        GuiState::Active => {
            let (_panel, handle, peer) = MemoryPanel::open(&controller.document());
            controller.attach_secondary(handle).then_some(peer)
        }
        GuiState::Opening | GuiState::AwaitingReady => factory.wait_pending(wait).await,
        GuiState::Closed | GuiState::Failed => {
            controller.open();
            factory.wait_pending(wait).await
        }
    }
}

/// Forward host messages to the socket and socket frames to the host until
/// either side goes away. Dropping `inbound` tells the controller the
/// webview is gone.
async fn pump(ws: WebSocketStream<TcpStream>, addr: SocketAddr, peer: PanelPeer) {
    let PanelPeer {
        id,
        mut outbound,
        inbound,
        mut disposed,
    } = peer;
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    if sink.send(Message::Text(message.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            changed = disposed.changed() => {
                if changed.is_err() || *disposed.borrow() {
                    debug!(endpoint = %id, "Panel disposed by host");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(text.as_str()) {
                    Ok(value) => {
                        if inbound.send(value).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(peer = %addr, error = %e, "Dropping non-JSON frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(peer = %addr, error = %e, "WS error");
                    break;
                }
                _ => {}
            }
        }
    }
}
