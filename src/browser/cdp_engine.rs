use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use super::cdp::CdpConnection;
use super::keys;
use super::launcher::{BrowserLauncher, BrowserProcess};
use super::scripts;
use crate::config::{Config, TimeoutConfig};
use crate::engine::{
    ClickOutcome, ConsoleMessage, ElementSummary, ElementTarget, Engine, FrameId, FrameInfo,
    FrameScope,
};
use crate::error::{ConsoleError, Result};
use crate::shell::{SelectorSpec, WaitState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extra pause once `readyState` is complete, for late script work
const SETTLE_GRACE: Duration = Duration::from_millis(200);

/// How long a click gets to start a main-frame navigation
const CLICK_NAVIGATION_WINDOW: Duration = Duration::from_millis(500);

/// [`Engine`] over a browser we launched, driven through one page target.
pub struct CdpEngine {
    process: BrowserProcess,
    conn: CdpConnection,
    timeouts: TimeoutConfig,
}

impl CdpEngine {
    pub async fn launch(config: &Config) -> Result<Self> {
        let launcher = BrowserLauncher::from_config(&config.browser)?;
        let mut process = launcher.launch().await?;

        match Self::attach(&process, &config.timeouts).await {
            Ok(conn) => Ok(Self {
                process,
                conn,
                timeouts: config.timeouts.clone(),
            }),
            Err(e) => {
                if let Err(close_err) = process.close().await {
                    tracing::debug!("Cleanup after failed attach: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn attach(process: &BrowserProcess, timeouts: &TimeoutConfig) -> Result<CdpConnection> {
        let ws_url = process.page_ws_url().await?;
        let mut conn = CdpConnection::connect(&ws_url, timeouts.command()).await?;
        conn.send("Page.enable", json!({})).await?;
        conn.send("Runtime.enable", json!({})).await?;
        Ok(conn)
    }

    /// Execution context for a child frame, or `None` for the main frame
    async fn context_id(&mut self, scope: &FrameScope) -> Result<Option<i64>> {
        let frame = match scope {
            FrameScope::Main => return Ok(None),
            FrameScope::Child(frame) => frame,
        };

        if let Some(id) = self.conn.events().context_for(&frame.id.0) {
            return Ok(Some(id));
        }

        // No default context seen yet; page globals are not visible here
        tracing::debug!("No default context for {}, creating an isolated world", frame.id);
        let world = self
            .conn
            .send(
                "Page.createIsolatedWorld",
                json!({ "frameId": frame.id.0, "worldName": "console-browser" }),
            )
            .await
            .map_err(|e| match e {
                ConsoleError::CdpError(msg) => {
                    ConsoleError::FrameNotFound(format!("{} is no longer available ({})", scope, msg))
                }
                other => other,
            })?;

        world
            .get("executionContextId")
            .and_then(Value::as_i64)
            .map(Some)
            .ok_or_else(|| ConsoleError::CdpError("isolated world has no context id".to_string()))
    }

    async fn eval_in(
        &mut self,
        scope: &FrameScope,
        expression: &str,
        repl_mode: bool,
    ) -> Result<Option<Value>> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
            "userGesture": true,
        });
        if repl_mode {
            params["replMode"] = json!(true);
        }
        if let Some(context_id) = self.context_id(scope).await? {
            params["contextId"] = json!(context_id);
        }

        let response = self.conn.send("Runtime.evaluate", params).await?;

        if let Some(details) = response.get("exceptionDetails") {
            return Err(ConsoleError::JavaScriptError(exception_message(details)));
        }

        let result = &response["result"];
        if result.get("type").and_then(Value::as_str) == Some("undefined") {
            return Ok(None);
        }
        Ok(Some(result.get("value").cloned().unwrap_or(Value::Null)))
    }

    async fn eval_string(&mut self, scope: &FrameScope, expression: &str) -> Result<String> {
        Ok(match self.eval_in(scope, expression, false).await? {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }

    /// Run an element script; `null` means the element disappeared.
    async fn on_element(&mut self, target: &ElementTarget, body: &str) -> Result<Value> {
        let js = scripts::on_element(&target.selector, target.index, body)?;
        let value = self
            .eval_in(&target.scope, &js, false)
            .await?
            .unwrap_or(Value::Null);

        if value.is_null() {
            return Err(ConsoleError::ElementNotFound(format!(
                "{} is no longer in {}",
                target.selector, target.scope
            )));
        }
        if let Some(message) = value.get("__error").and_then(Value::as_str) {
            return Err(ConsoleError::JavaScriptError(format!(
                "{}: {}",
                target.selector, message
            )));
        }
        Ok(value)
    }

    /// Wait for the main document to finish loading, bounded by the settle timeout.
    async fn wait_settled(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.timeouts.settle();

        loop {
            match self.eval_in(&FrameScope::Main, scripts::READY_STATE, false).await {
                Ok(Some(Value::String(state))) if state == "complete" => break,
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                // Context torn down mid-navigation
                Err(e) => tracing::trace!("readyState check failed: {}", e),
            }

            if Instant::now() >= deadline {
                tracing::debug!("Page did not settle within {}ms", self.timeouts.settle_ms);
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }

        sleep(SETTLE_GRACE).await;
        Ok(())
    }

    async fn main_loader_id(&mut self) -> Result<Option<String>> {
        let tree = self.conn.send("Page.getFrameTree", json!({})).await?;
        Ok(tree["frameTree"]["frame"]["loaderId"]
            .as_str()
            .map(str::to_string))
    }

    /// Step through history by `delta`; false when there is no such entry.
    async fn traverse_history(&mut self, delta: i64) -> Result<bool> {
        let history = self
            .conn
            .send("Page.getNavigationHistory", json!({}))
            .await?;

        let current_index = history
            .get("currentIndex")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let target = current_index + delta;
        if target < 0 {
            return Ok(false);
        }

        let entry_id = history
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|entries| entries.get(target as usize))
            .and_then(|entry| entry.get("id"))
            .and_then(Value::as_i64);

        let Some(entry_id) = entry_id else {
            return Ok(false);
        };

        self.conn
            .send("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
            .await?;
        sleep(POLL_INTERVAL).await;
        self.wait_settled().await?;
        Ok(true)
    }

    async fn mouse_click(&mut self, x: f64, y: f64) -> Result<()> {
        // mouseMoved first so hit-testing targets the right element
        self.conn
            .send(
                "Input.dispatchMouseEvent",
                json!({ "type": "mouseMoved", "x": x, "y": y }),
            )
            .await?;
        for event_type in ["mousePressed", "mouseReleased"] {
            self.conn
                .send(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": event_type,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn dispatch_key(&mut self, key: &keys::KeyDefinition) -> Result<()> {
        for event_type in ["keyDown", "keyUp"] {
            self.conn
                .send("Input.dispatchKeyEvent", key.event(event_type))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Engine for CdpEngine {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let timeout = self.timeouts.navigation();
        let response = self
            .conn
            .send_with_timeout("Page.navigate", json!({ "url": url }), timeout)
            .await
            .map_err(|e| match e {
                ConsoleError::Timeout(_) => ConsoleError::NavigationFailed(format!(
                    "{} did not respond within {}ms",
                    url, self.timeouts.navigation_ms
                )),
                other => other,
            })?;

        if let Some(error) = response.get("errorText").and_then(Value::as_str) {
            return Err(ConsoleError::NavigationFailed(format!("{}: {}", url, error)));
        }

        self.wait_settled().await
    }

    async fn go_back(&mut self) -> Result<bool> {
        self.traverse_history(-1).await
    }

    async fn go_forward(&mut self) -> Result<bool> {
        self.traverse_history(1).await
    }

    async fn reload(&mut self) -> Result<()> {
        self.conn.send("Page.reload", json!({})).await?;
        sleep(POLL_INTERVAL).await;
        self.wait_settled().await
    }

    async fn title(&mut self) -> Result<String> {
        self.eval_string(&FrameScope::Main, scripts::TITLE).await
    }

    async fn current_url(&mut self) -> Result<String> {
        self.eval_string(&FrameScope::Main, scripts::LOCATION).await
    }

    async fn frames(&mut self) -> Result<Vec<FrameInfo>> {
        let tree = self.conn.send("Page.getFrameTree", json!({})).await?;
        Ok(flatten_frame_tree(&tree["frameTree"]))
    }

    async fn query(
        &mut self,
        scope: &FrameScope,
        selector: &SelectorSpec,
        limit: usize,
    ) -> Result<Vec<ElementSummary>> {
        let js = scripts::query(selector, limit)?;
        match self.eval_in(scope, &js, false).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn click(&mut self, target: &ElementTarget) -> Result<ClickOutcome> {
        let loader_before = self.main_loader_id().await?;

        let point = self.on_element(target, scripts::CLICK_POINT).await?;
        let direct = point.get("direct").and_then(Value::as_bool).unwrap_or(false);
        let coords = (
            point.get("x").and_then(Value::as_f64),
            point.get("y").and_then(Value::as_f64),
        );

        match coords {
            (Some(x), Some(y)) if !direct => self.mouse_click(x, y).await?,
            _ => {
                tracing::debug!("Falling back to a DOM click for {}", target.selector);
                self.on_element(target, scripts::DIRECT_CLICK).await?;
            }
        }

        let deadline = Instant::now() + CLICK_NAVIGATION_WINDOW;
        let mut navigated = false;
        while Instant::now() < deadline {
            sleep(POLL_INTERVAL).await;
            match self.main_loader_id().await {
                Ok(loader) if loader != loader_before => {
                    navigated = true;
                    break;
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::trace!("Frame tree fetch failed: {}", e),
            }
        }

        self.wait_settled().await?;
        Ok(ClickOutcome { navigated })
    }

    async fn mark_clicked(&mut self, target: &ElementTarget) -> Result<()> {
        self.on_element(target, scripts::MARK_CLICKED).await?;
        Ok(())
    }

    async fn type_text(&mut self, target: &ElementTarget, text: &str) -> Result<()> {
        self.on_element(target, scripts::CLEAR_AND_FOCUS).await?;

        for c in text.chars() {
            let text = c.to_string();
            for event_type in ["keyDown", "keyUp"] {
                let mut event = json!({ "type": event_type });
                if event_type == "keyDown" {
                    event["text"] = json!(text);
                }
                self.conn.send("Input.dispatchKeyEvent", event).await?;
            }
        }
        Ok(())
    }

    async fn set_value(&mut self, target: &ElementTarget, text: &str) -> Result<()> {
        let js = scripts::set_value(text)?;
        self.on_element(target, &js).await?;
        Ok(())
    }

    async fn select_option(&mut self, target: &ElementTarget, value: &str) -> Result<String> {
        let js = scripts::select_option(value)?;
        let selected = self.on_element(target, &js).await?;
        Ok(selected
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| selected.to_string()))
    }

    async fn press_key(&mut self, target: Option<&ElementTarget>, key: &str) -> Result<()> {
        let definition = keys::lookup(key)?;
        if let Some(target) = target {
            self.on_element(target, scripts::FOCUS).await?;
        }
        self.dispatch_key(&definition).await
    }

    async fn wait_for(
        &mut self,
        scope: &FrameScope,
        selector: &SelectorSpec,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()> {
        let js = scripts::presence(selector, selector.index())?;
        let deadline = Instant::now() + timeout;

        loop {
            match self.eval_in(scope, &js, false).await {
                Ok(Some(presence)) => {
                    let attached = presence["attached"].as_bool().unwrap_or(false);
                    let visible = presence["visible"].as_bool().unwrap_or(false);
                    if state.is_satisfied(attached, visible) {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                // Protocol errors here are usually a document being replaced
                Err(ConsoleError::CdpError(e)) => tracing::trace!("wait check failed: {}", e),
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(ConsoleError::Timeout(format!(
                    "{} did not become {} within {}ms",
                    selector,
                    state.as_str(),
                    timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate(
        &mut self,
        scope: &FrameScope,
        expression: &str,
    ) -> Result<Option<Value>> {
        self.eval_in(scope, expression, true).await
    }

    async fn serialize_dom(&mut self, scope: &FrameScope) -> Result<String> {
        self.eval_string(scope, scripts::OUTER_HTML).await
    }

    fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        self.conn.take_console()
    }

    async fn close(&mut self) -> Result<()> {
        self.process.close().await
    }
}

/// `Runtime.ExceptionDetails` as one line, preferring the thrown error's text
fn exception_message(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .map(|s| s.lines().next().unwrap_or(s).to_string())
        .unwrap_or_else(|| "uncaught exception".to_string())
}

/// Depth-first list of a `Page.FrameTree`, main frame at index 0.
pub fn flatten_frame_tree(tree: &Value) -> Vec<FrameInfo> {
    fn walk(node: &Value, out: &mut Vec<FrameInfo>) {
        let frame = &node["frame"];
        if let Some(id) = frame["id"].as_str() {
            let url = frame["url"].as_str().unwrap_or("").to_string();
            let fragment = frame["urlFragment"].as_str().unwrap_or("");
            out.push(FrameInfo {
                index: out.len(),
                id: FrameId(id.to_string()),
                name: frame["name"].as_str().unwrap_or("").to_string(),
                url: format!("{}{}", url, fragment),
            });
        }
        if let Some(children) = node["childFrames"].as_array() {
            for child in children {
                walk(child, out);
            }
        }
    }

    let mut frames = Vec::new();
    walk(tree, &mut frames);
    frames
}
