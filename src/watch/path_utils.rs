// src/watch/path_utils.rs

//! Mapping watcher paths onto source ids.

use std::path::Path;

use crate::paths::{join_path, to_path_string, SourceId};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a direct `strip_prefix(root)` first, then canonicalizes both paths
/// (symlinked temp dirs on macOS report `/private/var/...`). Returns `None`
/// if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_path_string(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_path_string(rel));
        }
    }

    None
}

/// Source id of `path`, expressed under `source_dir` exactly as the filer
/// spells it.
pub fn to_source_id(source_dir: &str, path: &Path) -> Option<SourceId> {
    let rel = relative_str(Path::new(source_dir), path)?;
    if rel.is_empty() {
        return None;
    }
    Some(join_path(source_dir, &rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_paths_under_source_dir() {
        assert_eq!(
            to_source_id("/p/src", Path::new("/p/src/lib/a.ts")).as_deref(),
            Some("/p/src/lib/a.ts")
        );
        assert_eq!(to_source_id("/p/src", Path::new("/p/src")), None);
        assert_eq!(to_source_id("/p/src", Path::new("/nowhere/a.ts")), None);
    }
}
