// src/watch/mod.rs

//! File watching glue.
//!
//! Turns `notify` events under the source directory into [`FileChange`]s for
//! the filer. It knows nothing about builds or the dependency graph.
//!
//! [`FileChange`]: crate::filer::FileChange

pub mod path_utils;
pub mod watcher;

pub use watcher::{classify, spawn_watcher, WatcherHandle};
