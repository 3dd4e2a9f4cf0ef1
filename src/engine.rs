//! The browser capability set the shell drives.
//!
//! Everything the interpreter needs from a browser goes through [`Engine`].
//! The shipped implementation speaks the Chrome DevTools Protocol
//! ([`crate::browser::CdpEngine`]); tests substitute a scripted one.
//!
//! Handles crossing this boundary are plain values. An [`ElementTarget`] is
//! re-resolved by the engine on every call, so a navigation between two
//! commands can never leave the shell holding a dangling element.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shell::{SelectorSpec, WaitState};

/// Engine-assigned identifier of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub String);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the page's frame list. Index 0 is always the main frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: usize,
    pub id: FrameId,
    pub name: String,
    pub url: String,
}

/// Which document DOM operations run against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameScope {
    #[default]
    Main,
    Child(FrameInfo),
}

impl FrameScope {
    pub fn index(&self) -> usize {
        match self {
            FrameScope::Main => 0,
            FrameScope::Child(frame) => frame.index,
        }
    }

    /// Whether `frame` is the frame this scope selects, matched by id so
    /// indexes shifting after the selection do not matter.
    pub fn is(&self, frame: &FrameInfo) -> bool {
        match self {
            FrameScope::Main => frame.index == 0,
            FrameScope::Child(active) => active.id == frame.id,
        }
    }
}

impl fmt::Display for FrameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameScope::Main => f.write_str("main frame"),
            FrameScope::Child(frame) if frame.name.is_empty() => {
                write!(f, "frame {} ({})", frame.index, frame.url)
            }
            FrameScope::Child(frame) => write!(f, "frame {} '{}'", frame.index, frame.name),
        }
    }
}

/// The nth match of a selector inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub scope: FrameScope,
    pub selector: SelectorSpec,
    pub index: usize,
}

/// A match returned by [`Engine::query`], described for display.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementSummary {
    pub index: usize,
    pub tag: String,
    pub description: String,
}

/// Result of a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    /// The main frame started a new document as a result of the click
    pub navigated: bool,
}

/// A message the page logged through its console API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
}

#[async_trait]
pub trait Engine: Send {
    /// Navigate the page and wait for it to settle
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Returns false when there is no previous history entry
    async fn go_back(&mut self) -> Result<bool>;

    /// Returns false when there is no next history entry
    async fn go_forward(&mut self) -> Result<bool>;

    async fn reload(&mut self) -> Result<()>;

    async fn title(&mut self) -> Result<String>;

    async fn current_url(&mut self) -> Result<String>;

    /// Frames of the page, main frame first
    async fn frames(&mut self) -> Result<Vec<FrameInfo>>;

    /// Up to `limit` matches of `selector` in `scope`, in document order
    async fn query(
        &mut self,
        scope: &FrameScope,
        selector: &SelectorSpec,
        limit: usize,
    ) -> Result<Vec<ElementSummary>>;

    async fn click(&mut self, target: &ElementTarget) -> Result<ClickOutcome>;

    /// Tag an element with the clicked marker attribute and an outline
    async fn mark_clicked(&mut self, target: &ElementTarget) -> Result<()>;

    /// Clear the field, focus it and type `text` as key events
    async fn type_text(&mut self, target: &ElementTarget, text: &str) -> Result<()>;

    /// Set the field value directly and fire input/change
    async fn set_value(&mut self, target: &ElementTarget, text: &str) -> Result<()>;

    /// Select an option by value or visible label; returns the selected value
    async fn select_option(&mut self, target: &ElementTarget, value: &str) -> Result<String>;

    /// Press a key, focusing `target` first when given
    async fn press_key(&mut self, target: Option<&ElementTarget>, key: &str) -> Result<()>;

    async fn wait_for(
        &mut self,
        scope: &FrameScope,
        selector: &SelectorSpec,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()>;

    /// Evaluate an expression; `None` stands for `undefined`
    async fn evaluate(
        &mut self,
        scope: &FrameScope,
        expression: &str,
    ) -> Result<Option<serde_json::Value>>;

    /// Serialized DOM of the frame's document
    async fn serialize_dom(&mut self, scope: &FrameScope) -> Result<String>;

    /// Drain console messages logged since the last call
    fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        Vec::new()
    }

    async fn close(&mut self) -> Result<()>;
}
