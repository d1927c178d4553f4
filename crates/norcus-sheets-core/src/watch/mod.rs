//! Watching the library and reacting to changes
//!
//! [`LibraryWatcher`] turns filesystem notifications into a stream of
//! [`FileChangeEvent`]s, [`EventDispatcher`] applies the conversion rules to
//! them and [`WatchGate`] lets bulk operations silence both.

mod dispatcher;
mod event;
mod gate;
mod watcher;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use event::FileChangeEvent;
pub use gate::{PauseGuard, WatchGate};
pub use watcher::{EventCoalescer, EventFilter, LibraryWatcher, DEFAULT_DEBOUNCE_MS};
