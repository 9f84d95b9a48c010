//! Command-line front end for streamscope.
//!
//! Every command runs a real in-process pipeline: a page with instrumented primitives, the
//! bridge, the tab forwarder and a panel client, ending in a [`PanelSession`] that is
//! rendered to stdout.
//!
//! [`PanelSession`]: streamscope_panel::PanelSession

pub mod config;
pub mod handlers;
pub mod http;
pub mod pipeline;
pub mod render;

pub use config::{Config, LoggingConfig};
pub use handlers::replay::{replay_bytes, replay_file, ReplayFetch, REPLAY_URL};
pub use handlers::watch::{watch, WatchRequest};
pub use http::{HttpEventSource, HttpFetch};
pub use pipeline::{Pipeline, LOCAL_TAB};
pub use render::{render_groups, OutputFormat};
