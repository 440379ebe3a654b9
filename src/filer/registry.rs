// src/filer/registry.rs

//! In-memory source registry and the dependency graph between its files.
//!
//! Everything here is synchronous and free of IO: the async shell in
//! [`crate::filer`] holds the registry behind a mutex and turns the values
//! returned by these methods into builds and disk operations.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::trace;

use crate::build::{BuildDependency, DependencyDiff};
use crate::paths::{BuildId, SourceId};
use crate::source::{DependencyMap, SourceFile};

/// Outputs of one source dropped from one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub source_id: SourceId,
    pub build_name: String,
    pub outputs: Vec<BuildId>,
}

/// Graph changes caused by applying a dependency diff.
#[derive(Debug, Default)]
pub struct Linked {
    /// Sources that gained a dependent and must join the build.
    pub added: Vec<SourceId>,
    /// Sources left without dependents; they have been removed from the build.
    pub removals: Vec<Removal>,
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    files: HashMap<SourceId, SourceFile>,
}

fn insert_edge(map: &mut DependencyMap, build_name: &str, other: &str, dep: &BuildDependency) {
    map.entry(build_name.to_string())
        .or_default()
        .entry(other.to_string())
        .or_default()
        .insert(dep.build_id.clone(), dep.clone());
}

fn remove_edge(map: &mut DependencyMap, build_name: &str, other: &str, build_id: &str) {
    let Some(by_source) = map.get_mut(build_name) else {
        return;
    };
    if let Some(edges) = by_source.get_mut(other) {
        edges.remove(build_id);
        if edges.is_empty() {
            by_source.remove(other);
        }
    }
    if by_source.is_empty() {
        map.remove(build_name);
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SourceFile> {
        self.files.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SourceFile> {
        self.files.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.contains_key(id)
    }

    pub fn insert(&mut self, file: SourceFile) -> Option<SourceFile> {
        self.files.insert(file.id.clone(), file)
    }

    pub fn remove(&mut self, id: &str) -> Option<SourceFile> {
        self.files.remove(id)
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// All source ids, sorted.
    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.files.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Record `from -> dep.source_id` in both directions. Returns `false` when
    /// the dependency does not name a known source.
    pub fn add_edge(&mut self, build_name: &str, from: &str, dep: &BuildDependency) -> bool {
        let Some(to) = dep.source_id.as_deref() else {
            return false;
        };
        if !self.files.contains_key(to) || !self.files.contains_key(from) {
            return false;
        }
        if let Some(file) = self.files.get_mut(from) {
            insert_edge(&mut file.dependencies, build_name, to, dep);
        }
        if let Some(file) = self.files.get_mut(to) {
            insert_edge(&mut file.dependents, build_name, from, dep);
        }
        trace!(build = build_name, from, to, "added edge");
        true
    }

    pub fn remove_edge(&mut self, build_name: &str, from: &str, dep: &BuildDependency) {
        let Some(to) = dep.source_id.as_deref() else {
            return;
        };
        if let Some(file) = self.files.get_mut(from) {
            remove_edge(&mut file.dependencies, build_name, to, &dep.build_id);
        }
        if let Some(file) = self.files.get_mut(to) {
            remove_edge(&mut file.dependents, build_name, from, &dep.build_id);
        }
    }

    /// Apply a dependency diff of `source_id`'s outputs in `build_name`.
    pub fn link(&mut self, build_name: &str, source_id: &str, diff: &DependencyDiff) -> Linked {
        let mut linked = Linked::default();

        for dep in &diff.added {
            if self.add_edge(build_name, source_id, dep) {
                if let Some(target) = &dep.source_id {
                    if !linked.added.contains(target) {
                        linked.added.push(target.clone());
                    }
                }
            }
        }

        let mut detached = false;
        for dep in &diff.removed {
            self.remove_edge(build_name, source_id, dep);
            let Some(target) = dep.source_id.as_deref() else {
                continue;
            };
            detached = true;
            if self.is_orphaned(target, build_name) {
                linked.removals.extend(self.detach(target, build_name));
            }
        }
        if detached {
            linked
                .removals
                .extend(self.remove_unreachable(build_name));
        }

        linked
    }

    /// Member of the build only through dependents it no longer has.
    fn is_orphaned(&self, id: &str, build_name: &str) -> bool {
        self.files.get(id).is_some_and(|file| {
            file.build_configs.contains(build_name)
                && !file.is_input_to(build_name)
                && !file.has_dependents_in(build_name)
        })
    }

    /// Take `source_id` out of `build_name`, along with every member of the
    /// build that is no longer reachable from one of its inputs.
    pub fn remove_from_build(&mut self, source_id: &str, build_name: &str) -> Vec<Removal> {
        let mut removals = self.detach(source_id, build_name);
        removals.extend(self.remove_unreachable(build_name));
        removals
    }

    /// Remove members of `build_name` that no input imports, directly or
    /// transitively. Collects import cycles that lost their last importer.
    pub fn remove_unreachable(&mut self, build_name: &str) -> Vec<Removal> {
        let mut reached: BTreeSet<SourceId> = self
            .files
            .values()
            .filter(|f| f.build_configs.contains(build_name) && f.is_input_to(build_name))
            .map(|f| f.id.clone())
            .collect();
        let mut queue: VecDeque<SourceId> = reached.iter().cloned().collect();
        while let Some(id) = queue.pop_front() {
            for dependency in self.direct_dependencies(&id, Some(build_name)) {
                if reached.insert(dependency.clone()) {
                    queue.push_back(dependency);
                }
            }
        }

        let mut unreachable: Vec<SourceId> = self
            .files
            .values()
            .filter(|f| f.build_configs.contains(build_name) && !reached.contains(&f.id))
            .map(|f| f.id.clone())
            .collect();
        unreachable.sort();

        let mut removals = Vec::new();
        for id in unreachable {
            removals.extend(self.detach(&id, build_name));
        }
        removals
    }

    /// Take `source_id` out of `build_name`, cascading to dependencies left
    /// without dependents. Cycles are left to [`Self::remove_unreachable`].
    fn detach(&mut self, source_id: &str, build_name: &str) -> Vec<Removal> {
        let mut removals = Vec::new();
        let mut queue = VecDeque::from([source_id.to_string()]);

        while let Some(id) = queue.pop_front() {
            let Some(file) = self.files.get_mut(&id) else {
                continue;
            };
            if !file.build_configs.remove(build_name) {
                continue;
            }
            file.input_to.remove(build_name);
            file.outdated.remove(build_name);
            let outputs: Vec<BuildId> = file
                .build_files
                .remove(build_name)
                .map(|files| files.iter().map(|f| f.id.clone()).collect())
                .unwrap_or_default();
            let dependencies = file.dependencies.remove(build_name).unwrap_or_default();
            let dependents = file.dependents.remove(build_name).unwrap_or_default();

            for (dependent, edges) in dependents {
                if let Some(dependent) = self.files.get_mut(&dependent) {
                    for build_id in edges.keys() {
                        remove_edge(&mut dependent.dependencies, build_name, &id, build_id);
                    }
                }
            }

            for (target, edges) in dependencies {
                if let Some(target_file) = self.files.get_mut(&target) {
                    for build_id in edges.keys() {
                        remove_edge(&mut target_file.dependents, build_name, &id, build_id);
                    }
                }
                if self.is_orphaned(&target, build_name) {
                    queue.push_back(target);
                }
            }

            trace!(source_id = %id, build = build_name, "removed from build");
            removals.push(Removal {
                source_id: id,
                build_name: build_name.to_string(),
                outputs,
            });
        }

        removals
    }

    /// Direct dependents of `source_id`, in one build or across all of them.
    pub fn direct_dependents(&self, source_id: &str, build_name: Option<&str>) -> BTreeSet<SourceId> {
        let Some(file) = self.files.get(source_id) else {
            return BTreeSet::new();
        };
        file.dependents
            .iter()
            .filter(|(name, _)| build_name.is_none_or(|b| b == name.as_str()))
            .flat_map(|(_, by_source)| by_source.keys().cloned())
            .collect()
    }

    /// Direct dependencies of `source_id`, in one build or across all of them.
    pub fn direct_dependencies(
        &self,
        source_id: &str,
        build_name: Option<&str>,
    ) -> BTreeSet<SourceId> {
        let Some(file) = self.files.get(source_id) else {
            return BTreeSet::new();
        };
        file.dependencies
            .iter()
            .filter(|(name, _)| build_name.is_none_or(|b| b == name.as_str()))
            .flat_map(|(_, by_source)| by_source.keys().cloned())
            .collect()
    }

    /// Transitive dependents of `source_id` accepted by `filter`.
    ///
    /// Cycles are fine; each file is visited once. The starting file is never
    /// part of the result. Dependents rejected by `filter` are not traversed.
    pub fn filter_dependents<F>(
        &self,
        source_id: &str,
        build_name: Option<&str>,
        filter: F,
    ) -> BTreeSet<SourceId>
    where
        F: Fn(&SourceFile) -> bool,
    {
        let mut visited = BTreeSet::from([source_id.to_string()]);
        let mut result = BTreeSet::new();
        let mut queue = VecDeque::from([source_id.to_string()]);

        while let Some(id) = queue.pop_front() {
            for dependent in self.direct_dependents(&id, build_name) {
                if !visited.insert(dependent.clone()) {
                    continue;
                }
                let Some(file) = self.files.get(&dependent) else {
                    continue;
                };
                if filter(file) {
                    result.insert(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }

        result
    }

    /// Sources with a local import that did not resolve, per build.
    pub fn unresolved_importers(&self) -> Vec<(SourceId, String)> {
        let mut found = Vec::new();
        for file in self.files.values() {
            for (build_name, outputs) in &file.build_files {
                let unresolved = outputs.iter().any(|output| {
                    output
                        .dependencies
                        .values()
                        .any(|dep| !dep.external && dep.source_id.is_none())
                });
                if unresolved {
                    found.push((file.id.clone(), build_name.clone()));
                }
            }
        }
        found.sort();
        found
    }
}
