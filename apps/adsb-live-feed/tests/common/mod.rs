//! Shared helpers for integration tests: an in-process WebSocket server and
//! timeout-guarded waits.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use adsb_live_feed::TransportEvent;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// WebSocket server on `127.0.0.1:0` handing out accepted connections.
pub struct TestServer {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut sink, mut source) = ws.split();
                    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
                    let (incoming_tx, incoming) = mpsc::unbounded_channel::<Message>();

                    if tx.send(ServerConnection { outgoing, incoming }).is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            msg = outgoing_rx.recv() => {
                                let Some(msg) = msg else { break };
                                let closing = matches!(msg, Message::Close(_));
                                if sink.send(msg).await.is_err() || closing {
                                    break;
                                }
                            }
                            msg = source.next() => {
                                match msg {
                                    Some(Ok(msg)) => {
                                        let closing = matches!(msg, Message::Close(_));
                                        let _ = incoming_tx.send(msg);
                                        if closing {
                                            break;
                                        }
                                    }
                                    _ => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next client connection.
    pub async fn next_connection(&mut self) -> ServerConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("server stopped")
    }

    /// Assert that no client connects within `within`.
    pub async fn expect_no_connection(&mut self, within: Duration) {
        assert!(
            timeout(within, self.connections.recv()).await.is_err(),
            "unexpected connection"
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Server side of one accepted connection. Dropping it drops the TCP
/// connection without a close frame.
pub struct ServerConnection {
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: mpsc::UnboundedReceiver<Message>,
}

impl ServerConnection {
    pub fn send_text(&self, text: &str) {
        self.outgoing
            .send(Message::Text(text.to_owned().into()))
            .unwrap();
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(&value.to_string());
    }

    /// Send a normal close frame with reason "bye".
    pub fn close(&self) {
        self.outgoing
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Utf8Bytes::from_static("bye"),
            })))
            .unwrap();
    }

    /// Next text frame from the client.
    pub async fn recv_text(&mut self) -> String {
        loop {
            let msg = timeout(WAIT, self.incoming.recv())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection closed");
            match msg {
                Message::Text(text) => return text.as_str().to_owned(),
                Message::Close(_) => panic!("connection closed by client"),
                _ => {}
            }
        }
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> serde_json::Value {
        serde_json::from_str(&self.recv_text().await).unwrap()
    }

    /// Wait until the client closes the connection.
    pub async fn expect_closed(&mut self) {
        let closed = timeout(WAIT, async {
            loop {
                match self.incoming.recv().await {
                    Some(Message::Close(_)) | None => return,
                    Some(_) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "client did not close the connection");
    }

    /// Assert that no text frame arrives within `within`.
    pub async fn expect_silence(&mut self, within: Duration) {
        let received = timeout(within, async {
            loop {
                match self.incoming.recv().await {
                    Some(Message::Text(text)) => return Some(text.as_str().to_owned()),
                    Some(_) => {}
                    None => return None,
                }
            }
        })
        .await;
        if let Ok(Some(text)) = received {
            panic!("unexpected frame: {text}");
        }
    }
}

/// Next transport event.
pub async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Poll `condition` until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met in time");
}

/// An address nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}
