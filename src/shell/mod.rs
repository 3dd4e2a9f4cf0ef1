//! The interpreter core: parsing, selector and frame resolution, session
//! state, rendering and the read-eval-print loop.

mod command;
mod frames;
mod render;
mod repl;
mod selector;
mod session;

pub use command::{parse, Command, WaitState, HELP};
pub use frames::FrameReference;
pub use render::{truncate, Formatter, PlainTextFormatter, Rendered, Renderer, ViewMode};
pub use repl::{LineStatus, Repl};
pub use selector::{classify, SelectorKind, SelectorSpec};
pub use session::{normalize_url, ClickMarker, Outcome, Output, Session, SessionOptions};
