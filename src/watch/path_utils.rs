// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Lexically normalise a path: drop `.` components and fold `..` into the
/// preceding component where possible. Does not touch the filesystem, so it
/// works for paths that no longer exist (e.g. a file already moved away).
///
/// Both configured watch directories and event paths go through this, which
/// is what makes directory lookups agree regardless of how either was
/// spelled (`./demos/`, `demos`, `demos/../demos`).
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Absolute, cleaned form of `path`. Relative paths are resolved against
/// the current directory without touching the filesystem, so they compare
/// equal to the absolute paths the watcher reports.
pub fn absolute_path(path: &Path) -> PathBuf {
    match std::path::absolute(path) {
        Ok(abs) => clean_path(&abs),
        Err(_) => clean_path(path),
    }
}
