//! Scripted in-memory engine for driving the shell without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use console_browser::engine::{
    ClickOutcome, ConsoleMessage, ElementSummary, ElementTarget, Engine, FrameId, FrameInfo,
    FrameScope,
};
use console_browser::shell::{SelectorSpec, WaitState};
use console_browser::{ConsoleError, Result};

#[derive(Default)]
pub struct FakeEngine {
    pub history: Vec<String>,
    pub position: usize,
    pub title: String,
    pub html: String,
    pub frames: Vec<FrameInfo>,
    /// selector expression -> number of matches
    pub elements: HashMap<String, usize>,
    /// selector expression -> URL a click on it navigates to
    pub links: HashMap<String, String>,
    pub console: Vec<ConsoleMessage>,
    /// URL an Enter press submits to
    pub submit_to: Option<String>,
    /// Every engine call, in order
    pub calls: Vec<String>,
    /// Simulate the browser going away
    pub gone: bool,
    pub closed: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            history: vec!["about:blank".to_string()],
            html: "<html><body><p>blank</p></body></html>".to_string(),
            frames: vec![frame(0, "MAIN", "", "about:blank")],
            ..Default::default()
        }
    }

    pub fn with_elements(mut self, expression: &str, count: usize) -> Self {
        self.elements.insert(expression.to_string(), count);
        self
    }

    pub fn with_link(mut self, expression: &str, url: &str) -> Self {
        self.elements.insert(expression.to_string(), 1);
        self.links.insert(expression.to_string(), url.to_string());
        self
    }

    pub fn with_submit(mut self, url: &str) -> Self {
        self.submit_to = Some(url.to_string());
        self
    }

    pub fn with_child_frame(mut self, name: &str, url: &str) -> Self {
        let index = self.frames.len();
        self.frames
            .push(frame(index, &format!("F{}", index), name, url));
        self
    }

    pub fn url(&self) -> &str {
        &self.history[self.position]
    }

    fn check(&self) -> Result<()> {
        if self.gone {
            return Err(ConsoleError::BrowserGone("fake browser exited".to_string()));
        }
        Ok(())
    }

    fn visit(&mut self, url: &str) {
        self.history.truncate(self.position + 1);
        self.history.push(url.to_string());
        self.position = self.history.len() - 1;
        self.frames.truncate(1);
        self.frames[0].url = url.to_string();
    }
}

pub fn frame(index: usize, id: &str, name: &str, url: &str) -> FrameInfo {
    FrameInfo {
        index,
        id: FrameId(id.to_string()),
        name: name.to_string(),
        url: url.to_string(),
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.check()?;
        self.calls.push(format!("navigate {}", url));
        if url.contains("unreachable") {
            return Err(ConsoleError::NavigationFailed(format!(
                "{}: net::ERR_NAME_NOT_RESOLVED",
                url
            )));
        }
        self.visit(url);
        Ok(())
    }

    async fn go_back(&mut self) -> Result<bool> {
        self.check()?;
        if self.position == 0 {
            return Ok(false);
        }
        self.position -= 1;
        Ok(true)
    }

    async fn go_forward(&mut self) -> Result<bool> {
        self.check()?;
        if self.position + 1 >= self.history.len() {
            return Ok(false);
        }
        self.position += 1;
        Ok(true)
    }

    async fn reload(&mut self) -> Result<()> {
        self.check()?;
        self.calls.push("reload".to_string());
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        self.check()?;
        Ok(self.title.clone())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.check()?;
        Ok(self.url().to_string())
    }

    async fn frames(&mut self) -> Result<Vec<FrameInfo>> {
        self.check()?;
        Ok(self.frames.clone())
    }

    async fn query(
        &mut self,
        scope: &FrameScope,
        selector: &SelectorSpec,
        limit: usize,
    ) -> Result<Vec<ElementSummary>> {
        self.check()?;
        self.calls
            .push(format!("query {} in {}", selector.expression, scope));
        let count = self
            .elements
            .get(&selector.expression)
            .copied()
            .unwrap_or(0);
        Ok((0..count.min(limit))
            .map(|index| ElementSummary {
                index,
                tag: "a".to_string(),
                description: format!("<a> match {}", index),
            })
            .collect())
    }

    async fn click(&mut self, target: &ElementTarget) -> Result<ClickOutcome> {
        self.check()?;
        self.calls.push(format!(
            "click {} #{} in {}",
            target.selector.expression, target.index, target.scope
        ));
        match self.links.get(&target.selector.expression).cloned() {
            Some(url) => {
                self.visit(&url);
                Ok(ClickOutcome { navigated: true })
            }
            None => Ok(ClickOutcome { navigated: false }),
        }
    }

    async fn mark_clicked(&mut self, target: &ElementTarget) -> Result<()> {
        self.calls.push(format!(
            "mark {} #{}",
            target.selector.expression, target.index
        ));
        Ok(())
    }

    async fn type_text(&mut self, target: &ElementTarget, text: &str) -> Result<()> {
        self.check()?;
        self.calls
            .push(format!("type {} {}", target.selector.expression, text));
        Ok(())
    }

    async fn set_value(&mut self, target: &ElementTarget, text: &str) -> Result<()> {
        self.check()?;
        self.calls
            .push(format!("fill {} {}", target.selector.expression, text));
        Ok(())
    }

    async fn select_option(&mut self, target: &ElementTarget, value: &str) -> Result<String> {
        self.check()?;
        self.calls
            .push(format!("select {} {}", target.selector.expression, value));
        Ok(value.to_lowercase())
    }

    async fn press_key(&mut self, target: Option<&ElementTarget>, key: &str) -> Result<()> {
        self.check()?;
        match target {
            Some(target) => self
                .calls
                .push(format!("press {} on {}", key, target.selector.expression)),
            None => self.calls.push(format!("press {}", key)),
        }
        if key == "Enter" {
            if let Some(url) = self.submit_to.clone() {
                self.visit(&url);
            }
        }
        Ok(())
    }

    async fn wait_for(
        &mut self,
        _scope: &FrameScope,
        selector: &SelectorSpec,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()> {
        self.check()?;
        let attached = self.elements.contains_key(&selector.expression);
        if state.is_satisfied(attached, attached) {
            Ok(())
        } else {
            Err(ConsoleError::Timeout(format!(
                "{} did not become {} within {}ms",
                selector,
                state.as_str(),
                timeout.as_millis()
            )))
        }
    }

    async fn evaluate(&mut self, scope: &FrameScope, expression: &str) -> Result<Option<Value>> {
        self.check()?;
        self.calls.push(format!("eval {} in {}", expression, scope));
        if let Some(url) = expression.strip_prefix("location.href = ") {
            let url = url.trim_matches('\'').to_string();
            self.visit(&url);
            return Ok(Some(Value::String(url)));
        }
        match expression {
            "1 + 1" => Ok(Some(Value::from(2))),
            "undefined" => Ok(None),
            e if e.starts_with("throw") => Err(ConsoleError::JavaScriptError(
                "Error: boom".to_string(),
            )),
            _ => Ok(Some(Value::String(expression.to_string()))),
        }
    }

    async fn serialize_dom(&mut self, scope: &FrameScope) -> Result<String> {
        self.check()?;
        Ok(match scope {
            FrameScope::Main => self.html.clone(),
            FrameScope::Child(frame) => format!("<html><body>{}</body></html>", frame.name),
        })
    }

    fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.console)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
