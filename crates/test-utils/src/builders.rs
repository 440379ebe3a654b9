#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filer::build::BuilderRegistry;
use filer::config::{load_build_configs, BuildConfig, BuildConfigPartial};
use filer::filer::{Filer, FilerOptions};
use filer::fs::mock::MockFileSystem;
use filer::fs::FileSystem;
use filer::paths::{BuildMode, Paths};

pub const PROJECT_ROOT: &str = "/p";

/// Builder for an in-memory project and the filer watching it.
///
/// Files are given relative to the source directory (`/p/src`).
pub struct ProjectBuilder {
    fs: MockFileSystem,
    paths: Paths,
    partials: Vec<BuildConfigPartial>,
    dev: bool,
    externals_prefix: Option<String>,
    cache_write_delay: Duration,
    max_concurrency: usize,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::with_fs(MockFileSystem::new())
    }

    /// Reuse an existing tree, e.g. to restart a filer over the same files.
    pub fn with_fs(fs: MockFileSystem) -> Self {
        Self {
            fs,
            paths: Paths::new(PROJECT_ROOT),
            partials: Vec::new(),
            dev: true,
            externals_prefix: None,
            cache_write_delay: Duration::ZERO,
            max_concurrency: 4,
        }
    }

    pub fn file(self, rel: &str, contents: &str) -> Self {
        self.fs.add_file(source_id(rel), contents);
        self
    }

    pub fn binary(self, rel: &str, contents: &[u8]) -> Self {
        self.fs.add_file(source_id(rel), contents.to_vec());
        self
    }

    pub fn build(mut self, name: &str, platform: &str, input: &[&str]) -> Self {
        self.partials
            .push(BuildConfigPartial::new(name, platform, input));
        self
    }

    pub fn prod(mut self) -> Self {
        self.dev = false;
        self
    }

    pub fn externals_prefix(mut self, prefix: &str) -> Self {
        self.externals_prefix = Some(prefix.to_string());
        self
    }

    pub fn cache_write_delay(mut self, delay: Duration) -> Self {
        self.cache_write_delay = delay;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn fs(&self) -> MockFileSystem {
        self.fs.clone()
    }

    pub fn build_configs(&self) -> Vec<Arc<BuildConfig>> {
        load_build_configs(&self.partials, self.dev, &self.paths, &self.fs)
            .expect("Failed to build valid configs from builder")
    }

    pub fn options(&self, builders: BuilderRegistry) -> FilerOptions {
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        let mut options = FilerOptions::new(
            fs,
            self.paths.clone(),
            BuildMode::from_dev(self.dev),
            self.build_configs(),
            builders,
        );
        options.externals_prefix = self.externals_prefix.clone();
        options.cache_write_delay = self.cache_write_delay;
        options.max_concurrency = self.max_concurrency;
        options
    }

    pub fn filer(&self, builders: BuilderRegistry) -> Filer {
        Filer::new(self.options(builders))
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `/p/src/<rel>`
pub fn source_id(rel: &str) -> String {
    format!("{PROJECT_ROOT}/src/{rel}")
}

/// `/p/.gro/dev/<build>/<rel>`
pub fn dev_build_id(build: &str, rel: &str) -> String {
    format!("{PROJECT_ROOT}/.gro/dev/{build}/{rel}")
}

/// `/p/.gro/dev_meta/<rel>.json`
pub fn dev_meta_path(rel: &str) -> String {
    format!("{PROJECT_ROOT}/.gro/dev_meta/{rel}.json")
}

pub fn read_text(fs: &MockFileSystem, path: &str) -> String {
    fs.read_to_string(Path::new(path))
        .unwrap_or_else(|e| panic!("reading {path}: {e}"))
}
