//! Page-level DevTools connection.
//!
//! One WebSocket to the page target, kept open for the whole session.
//! Commands are strictly sequential: [`CdpConnection::send`] writes a request
//! and reads until the matching reply, folding any events that arrive in
//! between into [`EventState`].

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::engine::ConsoleMessage;
use crate::error::{ConsoleError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What we track from CDP events between commands.
#[derive(Debug, Default)]
pub struct EventState {
    console: Vec<ConsoleMessage>,
    /// frame id -> id of the frame's default execution context
    contexts: HashMap<String, i64>,
}

impl EventState {
    pub fn apply(&mut self, method: &str, params: &Value) {
        match method {
            "Runtime.consoleAPICalled" => {
                let level = params
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("log")
                    .to_string();
                let text = params
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|args| {
                        args.iter()
                            .map(remote_object_text)
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                self.console.push(ConsoleMessage { level, text });
            }
            "Runtime.executionContextCreated" => {
                let context = &params["context"];
                let aux = &context["auxData"];
                if aux["isDefault"].as_bool() == Some(true) {
                    if let (Some(frame), Some(id)) = (aux["frameId"].as_str(), context["id"].as_i64()) {
                        self.contexts.insert(frame.to_string(), id);
                    }
                }
            }
            "Runtime.executionContextDestroyed" => {
                if let Some(id) = params["executionContextId"].as_i64() {
                    self.contexts.retain(|_, ctx| *ctx != id);
                }
            }
            "Runtime.executionContextsCleared" => self.contexts.clear(),
            _ => {}
        }
    }

    pub fn context_for(&self, frame_id: &str) -> Option<i64> {
        self.contexts.get(frame_id).copied()
    }

    pub fn take_console(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.console)
    }
}

/// Printable form of a Runtime.RemoteObject console argument
fn remote_object_text(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => arg
            .get("description")
            .or_else(|| arg.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

pub struct CdpConnection {
    ws: WsStream,
    next_id: u64,
    command_timeout: Duration,
    events: EventState,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
        let (ws, _) = connect_async(ws_url).await.map_err(|e| {
            ConsoleError::CdpConnectionFailed(format!("WebSocket connection failed: {}", e))
        })?;
        tracing::debug!("Connected to page at {}", ws_url);

        Ok(Self {
            ws,
            next_id: 1,
            command_timeout,
            events: EventState::default(),
        })
    }

    pub async fn send(&mut self, method: &str, params: Value) -> Result<Value> {
        let timeout = self.command_timeout;
        self.send_with_timeout(method, params, timeout).await
    }

    pub async fn send_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let cmd = json!({ "id": id, "method": method, "params": params });
        tracing::trace!("-> {}", cmd);
        self.ws
            .send(Message::Text(cmd.to_string().into()))
            .await
            .map_err(|e| ConsoleError::BrowserGone(format!("Failed to send {}: {}", method, e)))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let msg = match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => {
                    return Err(ConsoleError::Timeout(format!(
                        "{} got no reply within {}ms",
                        method,
                        timeout.as_millis()
                    )))
                }
                Ok(None) => {
                    return Err(ConsoleError::BrowserGone(
                        "DevTools connection closed".to_string(),
                    ))
                }
                Ok(Some(Err(e))) => return Err(ConsoleError::BrowserGone(e.to_string())),
                Ok(Some(Ok(msg))) => msg,
            };

            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return Err(ConsoleError::BrowserGone(
                        "Browser closed the DevTools connection".to_string(),
                    ))
                }
                _ => continue,
            };

            let response: Value = serde_json::from_str(text.as_str())?;

            if response.get("id").and_then(Value::as_u64) == Some(id) {
                if let Some(error) = response.get("error") {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    return Err(ConsoleError::CdpError(format!("{}: {}", method, message)));
                }
                return Ok(response.get("result").cloned().unwrap_or(Value::Null));
            }

            if let Some(event) = response.get("method").and_then(Value::as_str) {
                self.events
                    .apply(event, response.get("params").unwrap_or(&Value::Null));
            }
        }
    }

    pub fn events(&self) -> &EventState {
        &self.events
    }

    pub fn take_console(&mut self) -> Vec<ConsoleMessage> {
        self.events.take_console()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_calls_are_collected_and_drained() {
        let mut state = EventState::default();
        state.apply(
            "Runtime.consoleAPICalled",
            &json!({
                "type": "warning",
                "args": [
                    {"type": "string", "value": "count"},
                    {"type": "number", "value": 3},
                    {"type": "object", "description": "Window"}
                ]
            }),
        );

        let messages = state.take_console();
        assert_eq!(
            messages,
            vec![ConsoleMessage {
                level: "warning".to_string(),
                text: "count 3 Window".to_string()
            }]
        );
        assert!(state.take_console().is_empty());
    }

    #[test]
    fn default_contexts_are_tracked_per_frame() {
        let mut state = EventState::default();
        state.apply(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 7, "auxData": {"frameId": "F1", "isDefault": true}}}),
        );
        state.apply(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 8, "auxData": {"frameId": "F1", "isDefault": false}}}),
        );
        assert_eq!(state.context_for("F1"), Some(7));

        state.apply(
            "Runtime.executionContextDestroyed",
            &json!({"executionContextId": 7}),
        );
        assert_eq!(state.context_for("F1"), None);
    }

    #[test]
    fn contexts_cleared_on_navigation() {
        let mut state = EventState::default();
        state.apply(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 2, "auxData": {"frameId": "MAIN", "isDefault": true}}}),
        );
        state.apply("Runtime.executionContextsCleared", &json!({}));
        assert_eq!(state.context_for("MAIN"), None);
    }

    #[tokio::test]
    async fn connect_to_nothing_fails_cleanly() {
        let result =
            CdpConnection::connect("ws://127.0.0.1:19997/devtools/page/x", Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(ConsoleError::CdpConnectionFailed(_))));
    }
}
