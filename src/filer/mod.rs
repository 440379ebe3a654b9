// src/filer/mod.rs

//! The filer: incremental builds over a source tree.
//!
//! The filer owns a [`SourceRegistry`] (pure core, behind a mutex) and drives
//! builders around it:
//!
//! 1. a change or the initial scan produces build *jobs* (source, build name);
//! 2. jobs are prepared under the registry lock: skipped, hydrated from the
//!    meta cache, or turned into a build of an immutable snapshot;
//! 3. builds run concurrently, bounded by a semaphore, with no lock held;
//! 4. each result is applied in one critical section (outputs, graph edges,
//!    staged disk and cache writes) unless a newer version superseded it;
//! 5. newly discovered dependencies become the next wave of jobs.
//!
//! Disk writes are enqueued on keyed writers inside the critical section and
//! drained after it, so the newest operation for any path always wins.

pub mod graph;
pub mod registry;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::build::{
    diff_dependencies, postprocess, reconstruct_build_files, BuildContext, BuildFile,
    BuilderRegistry,
};
use crate::cache::{SourceMetaCache, ThrottledWriter, WriteLease, WriteOp};
use crate::config::{BuildConfig, ConfigFile};
use crate::errors::{FilerError, Result};
use crate::fs::FileSystem;
use crate::paths::{extension_of, split_id, to_path_string, BuildMode, Paths, SourceId};
use crate::source::{infer_encoding, read_contents, FilerFile, ModuleKind, SourceFile, SourceSnapshot};

pub use registry::{Removal, SourceRegistry};

const DEFAULT_CACHE_WRITE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A change to one file under the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub id: SourceId,
}

impl FileChange {
    pub fn new(kind: ChangeKind, id: impl Into<SourceId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// What handling one change did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Whether any builder ran.
    pub rebuilt: bool,
    /// Number of builder invocations whose results were applied.
    pub builds: usize,
    /// Transitive dependents of the changed file, across all builds.
    pub dependents: BTreeSet<SourceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub files: usize,
    pub built: usize,
    pub hydrated: usize,
    /// Cache entries removed because their source is gone.
    pub cleaned: Vec<SourceId>,
    pub cycles: Vec<Vec<SourceId>>,
}

pub struct FilerOptions {
    pub fs: Arc<dyn FileSystem>,
    pub paths: Paths,
    pub mode: BuildMode,
    pub build_configs: Vec<Arc<BuildConfig>>,
    pub builders: BuilderRegistry,
    pub externals_prefix: Option<String>,
    pub cache_write_delay: Duration,
    pub max_concurrency: usize,
}

impl FilerOptions {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        paths: Paths,
        mode: BuildMode,
        build_configs: Vec<Arc<BuildConfig>>,
        builders: BuilderRegistry,
    ) -> Self {
        Self {
            fs,
            paths,
            mode,
            build_configs,
            builders,
            externals_prefix: None,
            cache_write_delay: DEFAULT_CACHE_WRITE_DELAY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn from_config(config: &ConfigFile, fs: Arc<dyn FileSystem>, builders: BuilderRegistry) -> Self {
        Self {
            fs,
            paths: config.paths.clone(),
            mode: config.filer.mode(),
            build_configs: config.build_configs.clone(),
            builders,
            externals_prefix: config.filer.externals_prefix.clone(),
            cache_write_delay: config.filer.cache_write_delay(),
            max_concurrency: config.filer.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    /// Join the build, as a direct input or as somebody's dependency.
    Add { is_input: bool },
    /// Build again for a build the file already belongs to.
    Rebuild,
}

#[derive(Debug, Clone)]
struct Job {
    source_id: SourceId,
    build_name: String,
    kind: JobKind,
}

impl Job {
    fn add(source_id: &str, build_name: &str, is_input: bool) -> Self {
        Self {
            source_id: source_id.to_string(),
            build_name: build_name.to_string(),
            kind: JobKind::Add { is_input },
        }
    }

    fn rebuild(source_id: &str, build_name: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            build_name: build_name.to_string(),
            kind: JobKind::Rebuild,
        }
    }
}

enum Prepared {
    Skip,
    Hydrated(Staged),
    Build {
        snapshot: SourceSnapshot,
        config: Arc<BuildConfig>,
    },
}

/// Follow-up work produced inside a critical section.
#[derive(Default)]
struct Staged {
    jobs: Vec<Job>,
    leases: Vec<WriteLease>,
}

impl Staged {
    fn lease(&mut self, lease: Option<WriteLease>) {
        self.leases.extend(lease);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RunStats {
    built: usize,
    hydrated: usize,
}

type BuildResult = Result<(Job, u64, Vec<BuildFile>)>;

struct FilerInner {
    fs: Arc<dyn FileSystem>,
    paths: Paths,
    configs: Vec<Arc<BuildConfig>>,
    builders: BuilderRegistry,
    cache: SourceMetaCache,
    outputs: ThrottledWriter,
    registry: Mutex<SourceRegistry>,
    ctx: BuildContext,
    semaphore: Semaphore,
}

impl FilerInner {
    fn registry(&self) -> MutexGuard<'_, SourceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self, name: &str) -> Option<&Arc<BuildConfig>> {
        self.configs.iter().find(|c| c.name == name)
    }
}

/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Filer {
    inner: Arc<FilerInner>,
}

impl Filer {
    pub fn new(options: FilerOptions) -> Self {
        let span = info_span!("filer", mode = %options.mode);
        let ctx = BuildContext::new(Arc::clone(&options.fs), options.paths.clone(), options.mode)
            .with_externals_prefix(options.externals_prefix)
            .with_span(span);
        let cache = SourceMetaCache::new(
            Arc::clone(&options.fs),
            options.paths.clone(),
            options.mode,
            options.cache_write_delay,
        );
        let outputs = ThrottledWriter::new(Arc::clone(&options.fs), Duration::ZERO);

        Self {
            inner: Arc::new(FilerInner {
                fs: options.fs,
                paths: options.paths,
                configs: options.build_configs,
                builders: options.builders,
                cache,
                outputs,
                registry: Mutex::new(SourceRegistry::new()),
                ctx,
                semaphore: Semaphore::new(options.max_concurrency.max(1)),
            }),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.inner.paths
    }

    pub fn mode(&self) -> BuildMode {
        self.inner.ctx.mode
    }

    pub fn build_configs(&self) -> &[Arc<BuildConfig>] {
        &self.inner.configs
    }

    pub fn cache(&self) -> &SourceMetaCache {
        &self.inner.cache
    }

    /// Load the cache, discover and build every input, then sweep the cache.
    pub async fn init(&self) -> Result<InitSummary> {
        let span = self.inner.ctx.span.clone();
        self.init_inner().instrument(span).await
    }

    async fn init_inner(&self) -> Result<InitSummary> {
        let inner = &self.inner;
        inner.cache.init().await?;

        let mut ids: Vec<SourceId> = inner
            .fs
            .find_files(Path::new(inner.paths.source()))?
            .iter()
            .map(|p| to_path_string(p))
            .collect();
        for config in &inner.configs {
            for input in config.input_paths() {
                if !ids.iter().any(|id| id == input) {
                    ids.push(input.to_string());
                }
            }
        }
        ids.sort();

        let mut loaded = Vec::with_capacity(ids.len());
        for id in &ids {
            loaded.push(self.load_source(id)?);
        }
        {
            let mut reg = inner.registry();
            for file in loaded {
                reg.insert(file);
            }
        }

        let mut jobs = Vec::new();
        for config in &inner.configs {
            for id in &ids {
                if config.matches(id, &inner.paths) {
                    jobs.push(Job::add(id, &config.name, true));
                }
            }
        }

        let stats = self.run_jobs(jobs).await?;
        self.release_unclaimed(&ids).await?;
        let cleaned = inner.cache.clean().await?;
        let cycles = self.import_cycles(None);
        for cycle in &cycles {
            warn!(?cycle, "import cycle");
        }

        let summary = InitSummary {
            files: ids.len(),
            built: stats.built,
            hydrated: stats.hydrated,
            cleaned,
            cycles,
        };
        info!(
            files = summary.files,
            built = summary.built,
            hydrated = summary.hydrated,
            cleaned = summary.cleaned.len(),
            "filer initialized"
        );
        Ok(summary)
    }

    /// Read a source from disk, restoring cached outputs when its contents
    /// match the cache.
    fn load_source(&self, id: &str) -> Result<SourceFile> {
        let inner = &self.inner;
        let (_, filename) = split_id(id);
        let contents = read_contents(
            inner.fs.as_ref(),
            Path::new(id),
            infer_encoding(extension_of(filename)),
        )?;

        let meta = inner.cache.get(id);
        let mut file = SourceFile::new(
            id.to_string(),
            contents,
            meta.as_ref().map(|m| m.data.content_hash.as_str()),
        );
        if let Some(meta) = meta.filter(|_| !file.dirty) {
            match reconstruct_build_files(inner.fs.as_ref(), &meta, &inner.configs)? {
                Some(build_files) => file.build_files = build_files,
                None => file.dirty = true,
            }
        }
        Ok(file)
    }

    /// Handle one change and every build it causes.
    pub async fn on_change(&self, change: FileChange) -> Result<ChangeOutcome> {
        let span = info_span!(parent: &self.inner.ctx.span, "change", id = %change.id, kind = ?change.kind);
        async {
            if !self.is_tracked_path(&change.id) {
                debug!("ignoring change outside the source dir");
                return Ok(ChangeOutcome::default());
            }
            match change.kind {
                ChangeKind::Delete => self.delete_source(&change.id).await,
                ChangeKind::Create | ChangeKind::Update => {
                    if !self.inner.fs.is_file(Path::new(&change.id)) {
                        self.delete_source(&change.id).await
                    } else if self.inner.registry().contains(&change.id) {
                        self.update_source(&change.id).await
                    } else {
                        self.create_source(&change.id).await
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    fn is_tracked_path(&self, id: &str) -> bool {
        self.inner.paths.is_source_id(id)
            || self
                .inner
                .configs
                .iter()
                .any(|c| c.input_paths().any(|p| p == id))
    }

    async fn create_source(&self, id: &str) -> Result<ChangeOutcome> {
        let file = self.load_source(id)?;
        let jobs = {
            let mut reg = self.inner.registry();
            reg.insert(file);

            let mut jobs: Vec<Job> = self
                .inner
                .configs
                .iter()
                .filter(|c| c.matches(id, &self.inner.paths))
                .map(|c| Job::add(id, &c.name, true))
                .collect();
            // Imports that failed to resolve may point at the new file.
            jobs.extend(
                reg.unresolved_importers()
                    .into_iter()
                    .map(|(source_id, build_name)| Job::rebuild(&source_id, &build_name)),
            );
            jobs
        };
        debug!(jobs = jobs.len(), "created source");

        let stats = self.run_jobs(jobs).await?;
        self.release_unclaimed(&[id.to_string()]).await?;
        Ok(ChangeOutcome {
            rebuilt: stats.built > 0,
            builds: stats.built,
            dependents: BTreeSet::new(),
        })
    }

    async fn update_source(&self, id: &str) -> Result<ChangeOutcome> {
        let encoding = {
            let reg = self.inner.registry();
            match reg.get(id) {
                Some(file) => file.encoding(),
                None => return Err(FilerError::SourceNotFound(id.to_string())),
            }
        };
        let contents = read_contents(self.inner.fs.as_ref(), Path::new(id), encoding)?;

        let (jobs, dependents) = {
            let mut reg = self.inner.registry();
            let Some(file) = reg.get_mut(id) else {
                return Err(FilerError::SourceNotFound(id.to_string()));
            };
            if !file.update_contents(contents) {
                debug!("contents unchanged");
                return Ok(ChangeOutcome::default());
            }
            let jobs: Vec<Job> = file
                .build_configs
                .iter()
                .map(|name| Job::rebuild(id, name))
                .collect();
            (jobs, reg.filter_dependents(id, None, |_| true))
        };

        let stats = self.run_jobs(jobs).await?;
        Ok(ChangeOutcome {
            rebuilt: stats.built > 0,
            builds: stats.built,
            dependents,
        })
    }

    async fn delete_source(&self, id: &str) -> Result<ChangeOutcome> {
        let (staged, dependents) = {
            let mut reg = self.inner.registry();
            let mut staged = Staged::default();
            let mut dependents = BTreeSet::new();

            if let Some(file) = reg.get(id) {
                let build_names: Vec<String> = file.build_configs.iter().cloned().collect();
                dependents = reg.filter_dependents(id, None, |_| true);

                for name in &build_names {
                    for dependent in reg.direct_dependents(id, Some(name)) {
                        staged.jobs.push(Job::rebuild(&dependent, name));
                    }
                }

                let mut removals = Vec::new();
                for name in &build_names {
                    removals.extend(reg.remove_from_build(id, name));
                }
                reg.remove(id);
                self.stage_removals(&mut reg, removals, &mut staged)?;
            }
            staged.lease(self.inner.cache.stage_delete(id));
            (staged, dependents)
        };
        debug!(dependents = dependents.len(), "deleted source");

        self.drain(staged.leases).await?;
        let stats = self.run_jobs(staged.jobs).await?;
        Ok(ChangeOutcome {
            rebuilt: stats.built > 0,
            builds: stats.built,
            dependents,
        })
    }

    /// Drop outputs restored from the cache for builds the file did not
    /// rejoin, together with their files on disk and meta cache entries.
    async fn release_unclaimed(&self, ids: &[SourceId]) -> Result<()> {
        let mut staged = Staged::default();
        {
            let mut reg = self.inner.registry();
            for id in ids {
                let Some(file) = reg.get_mut(id) else {
                    continue;
                };
                let unclaimed: Vec<String> = file
                    .build_files
                    .keys()
                    .filter(|name| !file.build_configs.contains(*name))
                    .cloned()
                    .collect();
                if unclaimed.is_empty() {
                    continue;
                }

                let mut removals = Vec::new();
                for name in unclaimed {
                    let outputs = file
                        .build_files
                        .remove(&name)
                        .map(|files| files.iter().map(|f| f.id.clone()).collect())
                        .unwrap_or_default();
                    removals.push(Removal {
                        source_id: id.clone(),
                        build_name: name,
                        outputs,
                    });
                }
                self.stage_removals(&mut reg, removals, &mut staged)?;
            }
        }
        self.drain(staged.leases).await
    }

    async fn drain(&self, leases: Vec<WriteLease>) -> Result<()> {
        let mut writes = JoinSet::new();
        for lease in leases {
            writes.spawn(lease.run());
        }
        while let Some(joined) = writes.join_next().await {
            joined??;
        }
        Ok(())
    }

    /// Run jobs wave by wave until no new jobs appear.
    async fn run_jobs(&self, jobs: Vec<Job>) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut queue = jobs;

        while !queue.is_empty() {
            let mut builds: JoinSet<BuildResult> = JoinSet::new();
            let mut writes: JoinSet<Result<()>> = JoinSet::new();
            let mut next = Vec::new();

            for job in std::mem::take(&mut queue) {
                match self.prepare(&job)? {
                    Prepared::Skip => {}
                    Prepared::Hydrated(staged) => {
                        stats.hydrated += 1;
                        next.extend(staged.jobs);
                        for lease in staged.leases {
                            writes.spawn(lease.run());
                        }
                    }
                    Prepared::Build { snapshot, config } => {
                        self.spawn_build(&mut builds, job, snapshot, config);
                    }
                }
            }

            while let Some(joined) = builds.join_next().await {
                let (job, version, files) = joined??;
                let staged = self.apply_build(&job, version, files)?;
                stats.built += 1;
                next.extend(staged.jobs);
                for lease in staged.leases {
                    writes.spawn(lease.run());
                }
            }

            while let Some(joined) = writes.join_next().await {
                joined??;
            }
            queue = next;
        }

        Ok(stats)
    }

    fn spawn_build(
        &self,
        builds: &mut JoinSet<BuildResult>,
        job: Job,
        snapshot: SourceSnapshot,
        config: Arc<BuildConfig>,
    ) {
        let inner = Arc::clone(&self.inner);
        let span = info_span!(
            parent: &inner.ctx.span,
            "build",
            source = %snapshot.id,
            build = %config.name
        );
        builds.spawn(
            async move {
                let _permit = inner
                    .semaphore
                    .acquire()
                    .await
                    .map_err(anyhow::Error::from)?;
                let builder = Arc::clone(inner.builders.for_source(&snapshot)?);
                let files = builder.build(&snapshot, &config, &inner.ctx).await?;
                let files = postprocess(files, &snapshot, &inner.ctx)?;
                debug!(builder = builder.name(), outputs = files.len(), "built");
                Ok::<_, FilerError>((job, snapshot.version, files))
            }
            .instrument(span),
        );
    }

    fn prepare(&self, job: &Job) -> Result<Prepared> {
        let inner = &self.inner;
        let Some(config) = inner.config(&job.build_name) else {
            return Ok(Prepared::Skip);
        };
        let name = &config.name;
        let mut reg = inner.registry();
        let Some(file) = reg.get_mut(&job.source_id) else {
            return Ok(Prepared::Skip);
        };

        match job.kind {
            JobKind::Add { is_input } => {
                if is_input {
                    file.input_to.insert(name.clone());
                } else if !file.is_input_to(name) && !file.has_dependents_in(name) {
                    // The import that pulled it in is already gone.
                    return Ok(Prepared::Skip);
                }
                if !file.build_configs.insert(name.clone()) {
                    return Ok(Prepared::Skip);
                }
                let cached = if file.dirty {
                    None
                } else {
                    file.build_files.get(name).cloned()
                };

                if let Some(cached) = cached {
                    let resolvable = cached
                        .iter()
                        .flat_map(|f| f.dependencies.values())
                        .filter_map(|dep| dep.source_id.as_deref())
                        .all(|source_id| reg.contains(source_id));
                    if resolvable {
                        let staged = self.link_outputs(&mut reg, &job.source_id, name, &cached, &[])?;
                        debug!(source_id = %job.source_id, build = %name, "hydrated from cache");
                        return Ok(Prepared::Hydrated(staged));
                    }
                    debug!(
                        source_id = %job.source_id,
                        build = %name,
                        "cached dependency missing; rebuilding"
                    );
                }

                let Some(file) = reg.get_mut(&job.source_id) else {
                    return Ok(Prepared::Skip);
                };
                // Unlinked outputs must not be diffed against.
                file.build_files.remove(name);
                file.outdated.insert(name.clone());
                Ok(Prepared::Build {
                    snapshot: file.snapshot(),
                    config: Arc::clone(config),
                })
            }
            JobKind::Rebuild => {
                if !file.build_configs.contains(name) {
                    return Ok(Prepared::Skip);
                }
                file.outdated.insert(name.clone());
                Ok(Prepared::Build {
                    snapshot: file.snapshot(),
                    config: Arc::clone(config),
                })
            }
        }
    }

    /// Apply one build result in a single critical section.
    fn apply_build(&self, job: &Job, version: u64, files: Vec<BuildFile>) -> Result<Staged> {
        let inner = &self.inner;
        let name = &job.build_name;
        let mut reg = inner.registry();
        let mut staged = Staged::default();

        let Some(file) = reg.get_mut(&job.source_id) else {
            debug!(source_id = %job.source_id, "discarding build of deleted source");
            return Ok(staged);
        };
        if file.version != version || !file.build_configs.contains(name) {
            debug!(
                source_id = %job.source_id,
                build = %name,
                version,
                current = file.version,
                "discarding superseded build"
            );
            return Ok(staged);
        }

        let new: Arc<[BuildFile]> = Arc::from(files);
        let old = file
            .build_files
            .insert(name.clone(), Arc::clone(&new))
            .unwrap_or_else(|| Arc::from(Vec::new()));
        file.outdated.remove(name);

        for output in new.iter() {
            staged.lease(inner.outputs.enqueue(
                &output.id,
                WriteOp::Write(output.contents.as_bytes().to_vec()),
            ));
        }
        for output in old.iter().filter(|o| !new.iter().any(|n| n.id == o.id)) {
            staged.lease(inner.outputs.enqueue(&output.id, WriteOp::Remove));
        }

        let linked = self.link_outputs(&mut reg, &job.source_id, name, &new, &old)?;
        staged.jobs.extend(linked.jobs);
        staged.leases.extend(linked.leases);
        self.stage_meta(&mut reg, &job.source_id, &mut staged)?;
        Ok(staged)
    }

    /// Update graph edges for a new generation of outputs.
    fn link_outputs(
        &self,
        reg: &mut SourceRegistry,
        source_id: &str,
        build_name: &str,
        new: &[BuildFile],
        old: &[BuildFile],
    ) -> Result<Staged> {
        let mut staged = Staged::default();
        let Some(diff) = diff_dependencies(new, old) else {
            return Ok(staged);
        };

        let linked = reg.link(build_name, source_id, &diff);
        staged.jobs.extend(
            linked
                .added
                .iter()
                .map(|target| Job::add(target, build_name, false)),
        );
        self.stage_removals(reg, linked.removals, &mut staged)?;
        Ok(staged)
    }

    fn stage_removals(
        &self,
        reg: &mut SourceRegistry,
        removals: Vec<Removal>,
        staged: &mut Staged,
    ) -> Result<()> {
        for removal in removals {
            debug!(
                source_id = %removal.source_id,
                build = %removal.build_name,
                outputs = removal.outputs.len(),
                "removed from build"
            );
            for output in &removal.outputs {
                staged.lease(self.inner.outputs.enqueue(output, WriteOp::Remove));
            }
            self.stage_meta(reg, &removal.source_id, staged)?;
        }
        Ok(())
    }

    /// Queue the meta cache write for `source_id`'s current outputs.
    fn stage_meta(&self, reg: &mut SourceRegistry, source_id: &str, staged: &mut Staged) -> Result<()> {
        let Some(file) = reg.get_mut(source_id) else {
            return Ok(());
        };
        let current: Vec<Arc<BuildConfig>> = self
            .inner
            .configs
            .iter()
            .filter(|c| !file.outdated.contains(&c.name))
            .cloned()
            .collect();
        staged.lease(self.inner.cache.stage_update(file, &current)?);
        if file.outdated.is_empty() {
            file.dirty = false;
        }
        Ok(())
    }

    // Queries.

    /// A source file, or a build output, by id.
    pub fn find_by_id(&self, id: &str) -> Option<FilerFile> {
        let reg = self.inner.registry();
        if let Some(file) = reg.get(id) {
            return Some(FilerFile::Source(file.clone()));
        }
        reg.files()
            .flat_map(|f| f.build_files.values())
            .flat_map(|outputs| outputs.iter())
            .find(|output| output.id == id)
            .map(|output| FilerFile::Build(output.clone()))
    }

    pub fn source_file(&self, id: &str) -> Option<SourceFile> {
        self.inner.registry().get(id).cloned()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.inner.registry().ids()
    }

    pub fn build_files(&self, source_id: &str, build_name: &str) -> Vec<BuildFile> {
        self.inner
            .registry()
            .get(source_id)
            .and_then(|f| f.build_files.get(build_name))
            .map(|outputs| outputs.to_vec())
            .unwrap_or_default()
    }

    pub fn dependencies_of(&self, source_id: &str, build_name: &str) -> BTreeSet<SourceId> {
        self.inner
            .registry()
            .direct_dependencies(source_id, Some(build_name))
    }

    pub fn dependents_of(&self, source_id: &str, build_name: &str) -> BTreeSet<SourceId> {
        self.inner
            .registry()
            .direct_dependents(source_id, Some(build_name))
    }

    /// Transitive dependents of `source_id` accepted by `filter`.
    pub fn filter_dependents<F>(
        &self,
        source_id: &str,
        build_name: Option<&str>,
        filter: F,
    ) -> BTreeSet<SourceId>
    where
        F: Fn(&SourceFile) -> bool,
    {
        self.inner
            .registry()
            .filter_dependents(source_id, build_name, filter)
    }

    pub fn import_cycles(&self, build_name: Option<&str>) -> Vec<Vec<SourceId>> {
        graph::import_cycles(&self.inner.registry(), build_name)
    }

    pub fn source_ids_of_kind(&self, kind: ModuleKind) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self
            .inner
            .registry()
            .files()
            .filter(|f| f.kind == kind)
            .map(|f| f.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
