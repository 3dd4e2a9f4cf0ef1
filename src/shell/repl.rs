use std::io::Write;

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::engine::Engine;
use crate::error::{ConsoleError, Result};

use super::command::{self, Command};
use super::render::{Rendered, Renderer};
use super::session::{Output, Session};

/// How one input line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Ok,
    /// The error was printed; the loop goes on
    Failed,
    Exit,
}

/// Drives a [`Session`] from text input, printing results to `out`.
///
/// Only fatal errors (the browser is gone) escape as `Err`; every other
/// failure is printed and reported as [`LineStatus::Failed`].
pub struct Repl<E: Engine, W: Write> {
    engine: E,
    session: Session,
    renderer: Renderer,
    auto_render: bool,
    out: W,
}

impl<E: Engine, W: Write> Repl<E, W> {
    pub fn new(engine: E, session: Session, renderer: Renderer, out: W) -> Self {
        Self {
            engine,
            session,
            renderer,
            auto_render: true,
            out,
        }
    }

    /// Render the page after every page-affecting command (default on)
    pub fn with_auto_render(mut self, auto_render: bool) -> Self {
        self.auto_render = auto_render;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_parts(self) -> (E, W) {
        (self.engine, self.out)
    }

    pub fn prompt(&self) -> String {
        format!("browser[{}]> ", self.session.page_url)
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<LineStatus> {
        match command::parse(line) {
            Ok(Some(command)) => self.execute_command(command).await,
            Ok(None) => Ok(LineStatus::Ok),
            Err(e) => {
                self.report_error(&e)?;
                Ok(LineStatus::Failed)
            }
        }
    }

    pub async fn execute_command(&mut self, command: Command) -> Result<LineStatus> {
        let render_after = self.auto_render && command.affects_page();

        let status = match self.session.execute(&mut self.engine, command).await {
            Ok(outcome) => {
                self.print_output(&outcome.output)?;
                if outcome.exit {
                    return Ok(LineStatus::Exit);
                }
                if render_after {
                    self.render().await?;
                }
                LineStatus::Ok
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.report_error(&e)?;
                LineStatus::Failed
            }
        };

        self.relay_console()?;
        Ok(status)
    }

    /// Render the active frame. Only fatal failures are returned.
    pub async fn render(&mut self) -> Result<()> {
        match self.renderer.render(&mut self.engine, &self.session).await {
            Ok(rendered) => self.print_rendered(&rendered),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => self.report_error(&e),
        }
    }

    /// Read lines until `exit`, end of input or Ctrl-C.
    pub async fn run_interactive<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();

        loop {
            write!(self.out, "{}", self.prompt())?;
            self.out.flush()?;

            // None on end of input
            let step = async {
                match lines.next_line().await? {
                    Some(line) => self.handle_line(&line).await.map(Some),
                    None => Ok(None),
                }
            };

            let status = tokio::select! {
                status = step => status?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("Interrupted");
                    None
                }
            };

            match status {
                Some(LineStatus::Exit) => return Ok(()),
                Some(_) => {}
                None => {
                    writeln!(self.out)?;
                    return Ok(());
                }
            }
        }
    }

    /// Execute a single line; returns whether it succeeded.
    pub async fn run_once(&mut self, line: &str) -> Result<bool> {
        Ok(self.handle_line(line).await? != LineStatus::Failed)
    }

    fn print_output(&mut self, output: &Output) -> Result<()> {
        match output {
            Output::Nothing => {}
            Output::Done(message) => writeln!(self.out, "{} {}", "✓".green(), message)?,
            Output::Notice(message) => writeln!(self.out, "{} {}", "!".yellow(), message)?,
            Output::Text(text) => writeln!(self.out, "{}", text)?,
        }
        Ok(())
    }

    fn print_rendered(&mut self, rendered: &Rendered) -> Result<()> {
        let header = match &rendered.frame {
            Some(frame) => format!("URL: {} ({})", rendered.url, frame),
            None => format!("URL: {}", rendered.url),
        };
        writeln!(self.out, "{}", header.cyan())?;
        writeln!(self.out, "{}", rendered.body)?;
        if rendered.is_truncated() {
            writeln!(
                self.out,
                "{}",
                format!("[... clipped {} chars ...]", rendered.clipped).yellow()
            )?;
        }
        Ok(())
    }

    fn relay_console(&mut self) -> Result<()> {
        for message in self.engine.take_console_messages() {
            writeln!(
                self.out,
                "{}",
                format!("[page:console] {} - {}", message.level, message.text).dimmed()
            )?;
        }
        Ok(())
    }

    fn report_error(&mut self, error: &ConsoleError) -> Result<()> {
        tracing::debug!("command failed ({:?}): {}", error.kind(), error);
        writeln!(self.out, "{} {}", "error:".red(), error)?;
        Ok(())
    }
}
