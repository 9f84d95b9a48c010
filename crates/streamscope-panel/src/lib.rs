//! Panel-side state: the session log, request grouping and the language preference.

pub mod error;
pub mod grouper;
pub mod language;
pub mod session;

pub use error::{PanelError, Result};
pub use grouper::{GroupKey, RequestGroup, RequestGrouper};
pub use language::{
    resolve_language, set_language, FilePreferenceStore, Language, MemoryPreferenceStore,
    PreferenceStore, LANGUAGE_KEY,
};
pub use session::PanelSession;
