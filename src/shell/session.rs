//! Session state and command execution.
//!
//! [`Session`] is the only mutable state of a shell run. The REPL owns it and
//! passes it, together with the engine, into [`Session::execute`] for every
//! parsed command. A command either fully succeeds, possibly updating the
//! session, or fails before touching it.

use std::time::Duration;

use crate::engine::{Engine, FrameScope};
use crate::error::{ConsoleError, Result};

use super::command::{Command, HELP};
use super::frames;
use super::render::ViewMode;
use super::selector::{self, SelectorSpec};

/// The element tagged by the last successful non-navigating click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickMarker {
    pub scope: FrameScope,
    pub selector: SelectorSpec,
    pub index: usize,
}

/// Defaults for arguments a command may omit.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub wait_for_timeout: Duration,
    pub list_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            wait_for_timeout: Duration::from_millis(30_000),
            list_limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    /// URL of the page as of the last page-affecting command
    pub page_url: String,
    pub active_frame: FrameScope,
    pub view_mode: ViewMode,
    pub last_clicked: Option<ClickMarker>,
    options: SessionOptions,
}

/// What a command produced for the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Nothing,
    /// Short success confirmation
    Done(String),
    /// Not a failure, but worth pointing out
    Notice(String),
    /// Result text: titles, URLs, listings, script values
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: Output,
    pub exit: bool,
}

impl Outcome {
    fn done(message: impl Into<String>) -> Self {
        Self {
            output: Output::Done(message.into()),
            exit: false,
        }
    }

    fn notice(message: impl Into<String>) -> Self {
        Self {
            output: Output::Notice(message.into()),
            exit: false,
        }
    }

    fn text(text: impl Into<String>) -> Self {
        Self {
            output: Output::Text(text.into()),
            exit: false,
        }
    }

    fn nothing() -> Self {
        Self {
            output: Output::Nothing,
            exit: false,
        }
    }

    fn exit() -> Self {
        Self {
            output: Output::Nothing,
            exit: true,
        }
    }
}

impl Session {
    pub fn new(view_mode: ViewMode, options: SessionOptions) -> Self {
        Self {
            page_url: "about:blank".to_string(),
            active_frame: FrameScope::Main,
            view_mode,
            last_clicked: None,
            options,
        }
    }

    pub async fn execute<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        command: Command,
    ) -> Result<Outcome> {
        tracing::debug!("executing {}", command.name());
        let refresh_url = command.affects_page();

        let outcome = match command {
            Command::Goto { url } => {
                let url = normalize_url(&url)?;
                engine.navigate(&url).await?;
                self.after_navigation(engine).await?;
                Outcome::done(format!("Navigated to {}", self.page_url))
            }
            Command::Back => {
                if engine.go_back().await? {
                    self.after_navigation(engine).await?;
                    Outcome::done(format!("Back to {}", self.page_url))
                } else {
                    Outcome::notice("No previous page in history")
                }
            }
            Command::Forward => {
                if engine.go_forward().await? {
                    self.after_navigation(engine).await?;
                    Outcome::done(format!("Forward to {}", self.page_url))
                } else {
                    Outcome::notice("No forward page in history")
                }
            }
            Command::Reload => {
                engine.reload().await?;
                self.after_navigation(engine).await?;
                Outcome::done(format!("Reloaded {}", self.page_url))
            }
            Command::Click { selector } => {
                let target = selector::resolve(engine, &self.active_frame, &selector).await?;
                let clicked = engine.click(&target).await?;
                if clicked.navigated {
                    self.after_navigation(engine).await?;
                    Outcome::done(format!("click {} (navigated)", selector))
                } else {
                    // The click itself succeeded; a failed highlight is cosmetic
                    if let Err(e) = engine.mark_clicked(&target).await {
                        tracing::warn!("Failed to mark clicked element: {}", e);
                    }
                    self.last_clicked = Some(ClickMarker {
                        scope: target.scope.clone(),
                        selector: target.selector.clone(),
                        index: target.index,
                    });
                    Outcome::done(format!("click {}", selector))
                }
            }
            Command::Type { selector, text } => {
                let target = selector::resolve(engine, &self.active_frame, &selector).await?;
                engine.type_text(&target, &text).await?;
                Outcome::done(format!("typed into {}: {}", selector, text))
            }
            Command::Fill { selector, text } => {
                let target = selector::resolve(engine, &self.active_frame, &selector).await?;
                engine.set_value(&target, &text).await?;
                Outcome::done(format!("filled {}: {}", selector, text))
            }
            Command::Select { selector, value } => {
                let target = selector::resolve(engine, &self.active_frame, &selector).await?;
                let selected = engine.select_option(&target, &value).await?;
                Outcome::done(format!("selected '{}' in {}", selected, selector))
            }
            Command::Press { selector, key } => match selector {
                Some(selector) => {
                    let target =
                        selector::resolve(engine, &self.active_frame, &selector).await?;
                    engine.press_key(Some(&target), &key).await?;
                    Outcome::done(format!("pressed {} on {}", key, selector))
                }
                None => {
                    engine.press_key(None, &key).await?;
                    Outcome::done(format!("pressed {}", key))
                }
            },
            Command::WaitFor {
                selector,
                state,
                timeout,
            } => {
                let timeout = timeout.unwrap_or(self.options.wait_for_timeout);
                engine
                    .wait_for(&self.active_frame, &selector, state, timeout)
                    .await?;
                Outcome::done(format!("{} is {}", selector, state.as_str()))
            }
            Command::List { selector, limit } => {
                let limit = limit.unwrap_or(self.options.list_limit);
                let matches = selector::list(engine, &self.active_frame, &selector, limit).await?;
                if matches.is_empty() {
                    return Ok(Outcome::notice(format!(
                        "No matches for {} in {}",
                        selector, self.active_frame
                    )));
                }
                let lines: Vec<String> = matches
                    .iter()
                    .map(|m| format!("[{}] {}", m.index, m.description))
                    .collect();
                Outcome::text(lines.join("\n"))
            }
            Command::Eval { script } => {
                let value = engine.evaluate(&self.active_frame, &script).await?;
                Outcome::text(format_value(value.as_ref()))
            }
            Command::View { mode: None } => {
                Outcome::text(format!("Render mode: {}", self.view_mode))
            }
            Command::View { mode: Some(mode) } => {
                self.view_mode = mode;
                Outcome::done(format!("Render mode set to {}", mode))
            }
            Command::Wait { duration } => {
                tokio::time::sleep(duration).await;
                Outcome::nothing()
            }
            Command::Title => Outcome::text(engine.title().await?),
            Command::Url => Outcome::text(engine.current_url().await?),
            Command::Frames => {
                let frames = engine.frames().await?;
                Outcome::text(frames::describe(&frames, &self.active_frame).join("\n"))
            }
            Command::UseFrame { reference } => {
                let frames = engine.frames().await?;
                let frame = reference.resolve(&frames)?;
                self.active_frame = frames::scope_for(frame);
                Outcome::done(format!("Using {}", self.active_frame))
            }
            Command::UseMainFrame => {
                self.active_frame = FrameScope::Main;
                Outcome::done("Using main frame")
            }
            Command::Help => Outcome::text(HELP),
            Command::Exit => Outcome::exit(),
        };

        if refresh_url {
            self.follow_page(engine).await;
        }

        Ok(outcome)
    }

    /// Catch up with a document replaced by something other than an explicit
    /// navigation command, such as a submitting Enter or a script assigning
    /// `location`.
    async fn follow_page<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        if let FrameScope::Child(active) = &self.active_frame {
            let id = active.id.clone();
            match engine.frames().await {
                Ok(frames) if !frames.iter().any(|f| f.id == id) => {
                    tracing::debug!("{} is gone, falling back to main frame", self.active_frame);
                    self.active_frame = FrameScope::Main;
                    self.last_clicked = None;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Could not refresh frame list: {}", e),
            }
        }

        match engine.current_url().await {
            Ok(url) => {
                if without_fragment(&url) != without_fragment(&self.page_url) {
                    self.last_clicked = None;
                }
                self.page_url = url;
            }
            Err(e) => tracing::debug!("Could not refresh page URL: {}", e),
        }
    }

    /// A new document invalidates frame selection and click marks.
    async fn after_navigation<E: Engine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        self.active_frame = FrameScope::Main;
        self.last_clicked = None;
        self.page_url = engine.current_url().await?;
        Ok(())
    }
}

fn without_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

fn format_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Give scheme-less input an https:// prefix; anything with a scheme passes.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(ConsoleError::InvalidArgument {
            command: "goto",
            reason: "empty URL".to_string(),
        });
    }

    if let Some(rest) = trimmed.strip_prefix("//") {
        return Ok(format!("https://{}", rest));
    }

    if trimmed.contains("://") {
        return Ok(trimmed.to_string());
    }

    if is_host_port_with_optional_path(trimmed) {
        return Ok(format!("https://{}", trimmed));
    }

    if has_explicit_scheme(trimmed) {
        return Ok(trimmed.to_string());
    }

    Ok(format!("https://{}", trimmed))
}

fn is_host_port_with_optional_path(input: &str) -> bool {
    let boundary = input.find(['/', '?', '#']).unwrap_or(input.len());
    let authority = &input[..boundary];

    match authority.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// `about:blank`, `data:...`, `mailto:...`
fn has_explicit_scheme(input: &str) -> bool {
    let mut chars = input.chars();
    if !matches!(chars.next(), Some(c) if c.is_ascii_alphabetic()) {
        return false;
    }
    for c in chars {
        if c == ':' {
            return true;
        }
        if !(c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            return false;
        }
    }
    false
}
