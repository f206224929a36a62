//! Duplex stream transport
//!
//! The worker only sees [`StreamTransport`]: open a feed, get a channel of
//! [`StreamEvent`]s back, and push requests upstream. [`WsTransport`] is the
//! websocket implementation.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;

use crate::WorkerError;

/// Events reported by an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected,
    /// Connection ended, with the close reason if the server gave one
    Closed(Option<String>),
    Error(String),
    /// One decoded JSON message
    Message(Value),
}

pub trait StreamTransport: Send + Sync {
    /// Connect and return the event channel for this connection.
    ///
    /// Any previous connection is closed first.
    fn open(
        &mut self,
        url: &str,
        subscribe: Option<&str>,
        token: Option<&str>,
    ) -> mpsc::UnboundedReceiver<StreamEvent>;

    fn close(&mut self);

    fn subscribe(&mut self, context: &str, path: &[Value]);

    fn raise_alarm(&mut self, path: &str, message: Option<&str>, state: Option<&str>);

    fn clear_alarm(&mut self, path: &str);

    /// Credential used for subsequent requests and connections
    fn set_token(&mut self, token: Option<String>);
}

/// Append the `subscribe` policy to a stream URL
pub fn stream_url(url: &str, subscribe: Option<&str>) -> String {
    match subscribe.filter(|s| !s.is_empty()) {
        Some(policy) if !url.contains("subscribe=") => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}subscribe={}", url, sep, policy)
        }
        _ => url.to_string(),
    }
}

fn subscribe_message(context: &str, path: &[Value]) -> Value {
    json!({
        "context": context,
        "subscribe": path,
    })
}

fn put_message(request_id: u64, path: &str, value: Value) -> Value {
    json!({
        "context": "vessels.self",
        "requestId": request_id.to_string(),
        "put": {
            "path": path,
            "value": value,
        }
    })
}

fn alarm_value(message: Option<&str>, state: Option<&str>) -> Value {
    json!({
        "message": message.unwrap_or_default(),
        "state": state.unwrap_or("alarm"),
        "method": ["visual", "sound"],
    })
}

fn build_request(url: &str, token: Option<&str>) -> Result<Request<()>, WorkerError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| WorkerError::Transport(e.to_string()))?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| WorkerError::Transport(e.to_string()))?;
        request.headers_mut().append(AUTHORIZATION, value);
    }
    Ok(request)
}

#[derive(Default)]
pub struct WsTransport {
    token: Option<String>,
    outgoing: Option<mpsc::UnboundedSender<Value>>,
    task: Option<JoinHandle<()>>,
    request_id: u64,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&mut self, message: Value) {
        match &self.outgoing {
            Some(tx) => {
                if tx.send(message).is_err() {
                    log::warn!("Transport: connection gone, dropping request");
                }
            }
            None => log::debug!("Transport: not connected, dropping request"),
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }
}

impl StreamTransport for WsTransport {
    fn open(
        &mut self,
        url: &str,
        subscribe: Option<&str>,
        token: Option<&str>,
    ) -> mpsc::UnboundedReceiver<StreamEvent> {
        self.close();
        if let Some(token) = token {
            self.token = Some(token.to_string());
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let url = stream_url(url, subscribe);
        let token = self.token.clone();

        log::info!("Transport: connecting to {}", url);
        self.outgoing = Some(out_tx);
        self.task = Some(tokio::spawn(async move {
            run_connection(url, token, out_rx, event_tx).await;
        }));
        event_rx
    }

    fn close(&mut self) {
        self.outgoing = None;
        if let Some(task) = self.task.take() {
            log::debug!("Transport: closing connection");
            task.abort();
        }
    }

    fn subscribe(&mut self, context: &str, path: &[Value]) {
        self.send(subscribe_message(context, path));
    }

    fn raise_alarm(&mut self, path: &str, message: Option<&str>, state: Option<&str>) {
        let id = self.next_request_id();
        self.send(put_message(id, path, alarm_value(message, state)));
    }

    fn clear_alarm(&mut self, path: &str) {
        let id = self.next_request_id();
        self.send(put_message(id, path, Value::Null));
    }

    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    url: String,
    token: Option<String>,
    mut outgoing: mpsc::UnboundedReceiver<Value>,
    events: mpsc::UnboundedSender<StreamEvent>,
) {
    let connection = match build_request(&url, token.as_deref()) {
        Ok(request) => connect_async(request)
            .await
            .map_err(|e| WorkerError::Transport(e.to_string())),
        Err(e) => Err(e),
    };
    let ws_stream = match connection {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            log::warn!("Transport: cannot connect to {}: {}", url, e);
            let _ = events.send(StreamEvent::Error(e.to_string()));
            let _ = events.send(StreamEvent::Closed(None));
            return;
        }
    };

    log::info!("Transport: connected to {}", url);
    let _ = events.send(StreamEvent::Connected);
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            request = outgoing.recv() => match request {
                Some(request) => {
                    if let Err(e) = write.send(Message::Text(request.to_string().into())).await {
                        log::warn!("Transport: send failed: {}", e);
                        let _ = events.send(StreamEvent::Error(e.to_string()));
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(value) => {
                            if events.send(StreamEvent::Message(value)).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::debug!("Transport: ignoring non-JSON message: {}", e),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty());
                    let _ = events.send(StreamEvent::Closed(reason));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("Transport: receive failed: {}", e);
                    let _ = events.send(StreamEvent::Error(e.to_string()));
                    let _ = events.send(StreamEvent::Closed(None));
                    break;
                }
                None => {
                    let _ = events.send(StreamEvent::Closed(None));
                    break;
                }
            }
        }
    }
    log::debug!("Transport: connection task for {} finished", url);
}
