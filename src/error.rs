use thiserror::Error;

/// Broad classes of failure, used by the REPL to decide whether to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input line; nothing was executed.
    Parse,
    /// A selector or frame reference matched nothing.
    Resolution,
    /// The browser rejected or failed an operation.
    Engine,
    /// The browser is gone or never came up. Ends the session.
    Fatal,
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Unknown command: {0} (type 'help' for a list)")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid argument for '{command}': {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },

    #[error("Unterminated quote in input")]
    UnterminatedQuote,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Frame not found: {0}")]
    FrameNotFound(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("CDP error: {0}")]
    CdpError(String),

    #[error("Browser not found. Please install Chrome, Chromium, Brave, or Edge.")]
    BrowserNotFound,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("CDP connection failed: {0}")]
    CdpConnectionFailed(String),

    #[error("Browser connection lost: {0}")]
    BrowserGone(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::UnknownCommand(_)
            | ConsoleError::Usage(_)
            | ConsoleError::InvalidArgument { .. }
            | ConsoleError::UnterminatedQuote => ErrorKind::Parse,

            ConsoleError::ElementNotFound(_) | ConsoleError::FrameNotFound(_) => {
                ErrorKind::Resolution
            }

            ConsoleError::NavigationFailed(_)
            | ConsoleError::JavaScriptError(_)
            | ConsoleError::Timeout(_)
            | ConsoleError::CdpError(_)
            | ConsoleError::JsonError(_) => ErrorKind::Engine,

            ConsoleError::BrowserNotFound
            | ConsoleError::BrowserLaunchFailed(_)
            | ConsoleError::CdpConnectionFailed(_)
            | ConsoleError::BrowserGone(_)
            | ConsoleError::ConfigError(_)
            | ConsoleError::IoError(_)
            | ConsoleError::NetworkError(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
