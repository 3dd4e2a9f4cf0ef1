use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use crate::browser::CdpEngine;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::shell::{Command, Renderer, Repl, Session, SessionOptions, ViewMode};

/// Interactive console for a headless browser
#[derive(Parser, Debug)]
#[command(name = "console-browser")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Navigate here before reading commands
    #[arg(long, env = "CONSOLE_BROWSER_URL")]
    pub url: Option<String>,

    /// Execute one command line, print the result and exit
    #[arg(long, value_name = "COMMAND")]
    pub once: Option<String>,

    /// Truncate rendered pages to this many characters
    #[arg(long, env = "CONSOLE_BROWSER_MAX_CHARS")]
    pub max_chars: Option<usize>,

    /// Browser profile directory (cookies, storage) kept between runs
    #[arg(long, env = "CONSOLE_BROWSER_USER_DATA_DIR")]
    pub user_data_dir: Option<String>,

    /// Initial render mode
    #[arg(long, value_enum, env = "CONSOLE_BROWSER_RENDER_MODE")]
    pub render: Option<ViewMode>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Browser executable path (overrides auto-discovery)
    #[arg(long, env = "CONSOLE_BROWSER_BROWSER_PATH")]
    pub browser_path: Option<String>,

    /// Remote debugging port for the launched browser
    #[arg(long, env = "CONSOLE_BROWSER_CDP_PORT")]
    pub cdp_port: Option<u16>,

    /// Configuration file (default: <config dir>/console-browser/config.toml)
    #[arg(long, env = "CONSOLE_BROWSER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Fold command-line flags over the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_chars) = self.max_chars {
            config.render.max_chars = max_chars;
        }
        if let Some(ref dir) = self.user_data_dir {
            config.browser.user_data_dir = Some(dir.clone());
        }
        if let Some(mode) = self.render {
            config.render.mode = mode;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(ref path) = self.browser_path {
            config.browser.executable = Some(path.clone());
        }
        if let Some(port) = self.cdp_port {
            config.browser.cdp_port = port;
        }
    }

    pub async fn run(&self) -> Result<ExitCode> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        tracing::debug!("Effective config: {:?}", config);

        // Dropping an unfinished launch kills the half-started browser
        let Some(engine) =
            until_interrupted(CdpEngine::launch(&config), tokio::signal::ctrl_c()).await?
        else {
            return Ok(interrupted());
        };
        let mut repl = build_repl(engine, &config);

        let result = self.drive(&mut repl).await;

        let (mut engine, _) = repl.into_parts();
        if let Err(e) = engine.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }

        result
    }

    async fn drive<E: Engine>(&self, repl: &mut Repl<E, std::io::Stdout>) -> Result<ExitCode> {
        if let Some(ref url) = self.url {
            let goto = repl.execute_command(Command::Goto { url: url.clone() });
            match until_interrupted(goto, tokio::signal::ctrl_c()).await? {
                Some(status) => tracing::debug!("Initial navigation: {:?}", status),
                None => return Ok(interrupted()),
            }
        }

        match self.once {
            Some(ref line) => {
                match until_interrupted(repl.run_once(line), tokio::signal::ctrl_c()).await? {
                    Some(true) => Ok(ExitCode::SUCCESS),
                    Some(false) => Ok(ExitCode::FAILURE),
                    None => Ok(interrupted()),
                }
            }
            None => {
                println!(
                    "{} Type {} for commands, {} to quit.",
                    "console-browser".bold(),
                    "help".cyan(),
                    "exit".cyan()
                );
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                repl.run_interactive(stdin).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Run `work` to completion, or give up on it once `interrupt` fires.
///
/// `Ok(None)` means interrupted. The interactive loop handles Ctrl-C itself;
/// this covers startup and `--once`, so the caller still reaches the browser
/// shutdown instead of the process dying on the default signal handler.
async fn until_interrupted<T, W, I>(work: W, interrupt: I) -> Result<Option<T>>
where
    W: Future<Output = Result<T>>,
    I: Future<Output = std::io::Result<()>>,
{
    let interrupt = async {
        if let Err(e) = interrupt.await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        biased;
        result = work => result.map(Some),
        () = interrupt => {
            tracing::debug!("Interrupted");
            Ok(None)
        }
    }
}

fn interrupted() -> ExitCode {
    eprintln!("{}", "Interrupted".yellow());
    ExitCode::from(130)
}

fn build_repl<E: Engine>(engine: E, config: &Config) -> Repl<E, std::io::Stdout> {
    let session = Session::new(
        config.render.mode,
        SessionOptions {
            wait_for_timeout: std::time::Duration::from_millis(config.timeouts.wait_for_ms),
            list_limit: config.shell.list_limit,
        },
    );
    Repl::new(
        engine,
        session,
        Renderer::new(config.render.max_chars),
        std::io::stdout(),
    )
    .with_auto_render(config.render.auto)
}
