//! Console shell for a headless Chromium-family browser.
//!
//! Lines like `goto example.com`, `click a.next 2` or `eval document.title`
//! are parsed into [`shell::Command`]s and run against an [`engine::Engine`].
//! [`browser::CdpEngine`] is the DevTools-backed engine used by the binary.

pub mod browser;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod shell;

pub use error::{ConsoleError, ErrorKind, Result};
