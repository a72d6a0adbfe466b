// src/watch/mod.rs

//! File watching.
//!
//! Wires up a cross-platform filesystem watcher (`notify`) on the configured
//! artifact directories and turns file creations into runtime events. It
//! knows nothing about servers or rounds; routing happens in the runtime.

pub mod event_handler;
pub mod path_utils;
pub mod watcher;

pub use watcher::{spawn_watcher, spawn_watcher_with_fs, WatcherHandle};
