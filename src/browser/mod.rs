mod cdp;
mod cdp_engine;
mod discovery;
mod keys;
mod launcher;
mod scripts;

pub use cdp::{CdpConnection, EventState};
pub use cdp_engine::{flatten_frame_tree, CdpEngine};
pub use discovery::{discover_browser, BrowserInfo, BrowserKind};
pub use keys::KeyDefinition;
pub use launcher::{BrowserLauncher, BrowserProcess};
