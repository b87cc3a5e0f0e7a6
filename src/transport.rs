//! WebSocket transport adapter.
//!
//! One task owns the socket; the rest of the client talks to it through a
//! pair of channels. Inbound text frames decode to [`ServerEvent`]s;
//! malformed or unknown frames are logged and skipped, never fatal.
//! Outbound [`ClientRequest`]s serialize to the `{"type","data"}` frame
//! shape. Connection retry policy is deliberately absent: when the socket
//! closes, the event channel closes and the caller decides what to do.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::PollError;
use crate::events::{ClientRequest, ServerEvent};

/// Serialize an outbound request to its wire frame.
pub fn encode_request(request: &ClientRequest) -> Result<String, PollError> {
    Ok(serde_json::to_string(request)?)
}

/// Decode an inbound text frame. `None` for frames that are not valid
/// events; the caller skips those.
pub fn decode_event(text: &str) -> Option<ServerEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(%err, frame = text, "skipping malformed frame");
            None
        }
    }
}

/// A connected transport: events in, requests out.
pub struct Transport {
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
    pub requests: mpsc::UnboundedSender<ClientRequest>,
}

impl Transport {
    /// Connect to the poll service and spawn the socket task.
    pub async fn connect(url: &str) -> Result<Transport, PollError> {
        let (ws_stream, _response) = connect_async(url).await?;
        info!(url, "connected to poll service");

        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<ClientRequest>();

        tokio::spawn(async move {
            let (mut ws_sink, mut ws_stream) = ws_stream.split();

            loop {
                tokio::select! {
                    outbound = request_rx.recv() => {
                        match outbound {
                            Some(request) => {
                                let text = match encode_request(&request) {
                                    Ok(text) => text,
                                    Err(err) => {
                                        warn!(%err, "dropping unencodable request");
                                        continue;
                                    }
                                };
                                if ws_sink.send(WsMessage::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            // Client side dropped the sender: clean shutdown.
                            None => {
                                let _ = ws_sink.close().await;
                                break;
                            }
                        }
                    }

                    frame = ws_stream.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                if let Some(event) = decode_event(&text) {
                                    if event_tx.send(event).is_err() {
                                        break;
                                    }
                                }
                            }
                            // Binary / ping / pong frames carry no events.
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(%err, "websocket error, closing");
                                break;
                            }
                            None => {
                                debug!("websocket closed by peer");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Transport { events: event_rx, requests: request_tx })
    }

    /// Dispatch one request. Failure means the socket task is gone.
    pub fn send(&self, request: ClientRequest) -> Result<(), PollError> {
        self.requests
            .send(request)
            .map_err(|_| PollError::Transport("connection closed".to_string()))
    }

    /// Dispatch several requests in order.
    pub fn send_all(
        &self,
        requests: impl IntoIterator<Item = ClientRequest>,
    ) -> Result<(), PollError> {
        for request in requests {
            self.send(request)?;
        }
        Ok(())
    }
}
