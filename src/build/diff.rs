// src/build/diff.rs

use std::collections::BTreeMap;

use crate::build::{BuildDependency, BuildFile};
use crate::paths::BuildId;

/// Edges gained and lost between two generations of one source's outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDiff {
    pub added: Vec<BuildDependency>,
    pub removed: Vec<BuildDependency>,
}

/// Union of the dependencies of `files`, keyed by build id.
pub fn aggregate_dependencies(files: &[BuildFile]) -> BTreeMap<&BuildId, &BuildDependency> {
    files
        .iter()
        .flat_map(|file| file.dependencies.iter())
        .collect()
}

/// Compare the dependency sets of `new` and `old`. `None` when they are equal.
pub fn diff_dependencies(new: &[BuildFile], old: &[BuildFile]) -> Option<DependencyDiff> {
    let new_deps = aggregate_dependencies(new);
    let old_deps = aggregate_dependencies(old);

    let added: Vec<BuildDependency> = new_deps
        .iter()
        .filter(|(id, dep)| !same_edge(&old_deps, id, dep))
        .map(|(_, dep)| (*dep).clone())
        .collect();
    let removed: Vec<BuildDependency> = old_deps
        .iter()
        .filter(|(id, dep)| !same_edge(&new_deps, id, dep))
        .map(|(_, dep)| (*dep).clone())
        .collect();

    if added.is_empty() && removed.is_empty() {
        None
    } else {
        Some(DependencyDiff { added, removed })
    }
}

// An import that starts or stops resolving keeps its build id but changes its
// edge, so it counts as both removed and added.
fn same_edge(
    other: &BTreeMap<&BuildId, &BuildDependency>,
    id: &BuildId,
    dep: &BuildDependency,
) -> bool {
    other
        .get(id)
        .is_some_and(|o| o.source_id == dep.source_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::BuildConfig;
    use crate::source::Contents;

    fn file_with_deps(ids: &[&str]) -> BuildFile {
        let config = Arc::new(BuildConfig::node("node", Vec::new()));
        let mut file = BuildFile::new(
            "/p/.gro/dev/node/a.js".into(),
            Contents::Text(String::new()),
            "/p/src/a.ts".into(),
            config,
        );
        for id in ids {
            file.dependencies.insert(
                id.to_string(),
                BuildDependency {
                    specifier: id.to_string(),
                    mapped_specifier: id.to_string(),
                    build_id: id.to_string(),
                    source_id: None,
                    external: false,
                },
            );
        }
        file
    }

    #[test]
    fn equal_sets_have_no_diff() {
        let a = [file_with_deps(&["x", "y"])];
        let b = [file_with_deps(&["y"]), file_with_deps(&["x"])];
        assert_eq!(diff_dependencies(&a, &b), None);
        assert_eq!(diff_dependencies(&[], &[]), None);
    }

    #[test]
    fn reports_added_and_removed() {
        let new = [file_with_deps(&["x", "z"])];
        let old = [file_with_deps(&["x", "y"])];

        let diff = diff_dependencies(&new, &old).unwrap();
        let added: Vec<_> = diff.added.iter().map(|d| d.build_id.as_str()).collect();
        let removed: Vec<_> = diff.removed.iter().map(|d| d.build_id.as_str()).collect();
        assert_eq!(added, vec!["z"]);
        assert_eq!(removed, vec!["y"]);
    }

    #[test]
    fn resolution_change_is_an_edge_change() {
        let unresolved = [file_with_deps(&["x"])];
        let mut resolved = file_with_deps(&["x"]);
        if let Some(dep) = resolved.dependencies.get_mut("x") {
            dep.source_id = Some("/p/src/x.ts".into());
        }

        let diff = diff_dependencies(&[resolved], &unresolved).unwrap();
        assert_eq!(diff.added[0].source_id.as_deref(), Some("/p/src/x.ts"));
        assert_eq!(diff.removed[0].source_id, None);
    }

    #[test]
    fn first_build_adds_everything() {
        let diff = diff_dependencies(&[file_with_deps(&["x"])], &[]).unwrap();
        assert_eq!(diff.added.len(), 1);
        assert!(diff.removed.is_empty());
    }
}
