// src/build/mod.rs

//! Build outputs and everything that produces or post-processes them.
//!
//! - [`builder`] defines the `Builder` trait and the extension registry.
//! - [`imports`] lexes import specifiers out of generated JS.
//! - [`postprocess`] rewrites those specifiers and records dependencies.
//! - [`diff`] compares the dependency sets of two generations of outputs.
//! - [`store`] rebuilds `BuildFile`s from the meta cache and disk.

pub mod builder;
pub mod diff;
pub mod imports;
pub mod postprocess;
pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::fs::FileSystem;
use crate::paths::{extension_of, split_id, BuildId, BuildMode, Paths, SourceId};
use crate::source::{Contents, SourceSnapshot};

pub use builder::{Builder, BuilderRegistry, NoopBuilder};
pub use diff::{diff_dependencies, DependencyDiff};
pub use postprocess::postprocess;
pub use store::reconstruct_build_files;

/// One import edge out of a build file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildDependency {
    /// The specifier as written in the source.
    pub specifier: String,
    /// The specifier as written in the output.
    pub mapped_specifier: String,
    pub build_id: BuildId,
    /// Resolved source file; absent for externals and unresolved imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub external: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One compiled artifact of one source file for one build config.
#[derive(Debug, Clone)]
pub struct BuildFile {
    pub id: BuildId,
    pub filename: String,
    pub dir: String,
    pub extension: String,
    pub contents: Contents,
    pub source_id: SourceId,
    pub build_config: Arc<BuildConfig>,
    pub dependencies: BTreeMap<BuildId, BuildDependency>,
}

impl BuildFile {
    pub fn new(
        id: BuildId,
        contents: Contents,
        source_id: SourceId,
        build_config: Arc<BuildConfig>,
    ) -> Self {
        let (dir, filename) = split_id(&id);
        let (dir, filename) = (dir.to_string(), filename.to_string());
        let extension = extension_of(&filename).to_string();
        Self {
            id,
            filename,
            dir,
            extension,
            contents,
            source_id,
            build_config,
            dependencies: BTreeMap::new(),
        }
    }

    pub fn build_name(&self) -> &str {
        &self.build_config.name
    }
}

/// Everything a builder may consult besides the source and config.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub fs: Arc<dyn FileSystem>,
    pub paths: Paths,
    pub mode: BuildMode,
    /// Served prefix for bare imports in browser builds, e.g. `/externals`.
    pub externals_prefix: Option<String>,
    /// Parent span for everything logged on behalf of this filer.
    pub span: tracing::Span,
}

impl BuildContext {
    pub fn new(fs: Arc<dyn FileSystem>, paths: Paths, mode: BuildMode) -> Self {
        Self {
            fs,
            paths,
            mode,
            externals_prefix: None,
            span: tracing::Span::none(),
        }
    }

    pub fn with_externals_prefix(mut self, prefix: Option<String>) -> Self {
        self.externals_prefix = prefix;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn build_dir(&self, config: &BuildConfig) -> String {
        self.paths.build_dir(self.mode, &config.name)
    }

    /// Output id for a file named `filename` next to where `source` would
    /// land in `config`'s build directory.
    pub fn output_id(&self, source: &SourceSnapshot, config: &BuildConfig, filename: &str) -> BuildId {
        let base_dir = self
            .paths
            .source_base_path(&source.dir)
            .unwrap_or_default();
        let base = if base_dir.is_empty() {
            filename.to_string()
        } else {
            format!("{base_dir}/{filename}")
        };
        self.paths.to_build_out_path(self.mode, &config.name, &base)
    }
}
