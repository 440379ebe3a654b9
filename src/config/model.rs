// src/config/model.rs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::paths::{BuildMode, Paths, SourceId, DEFAULT_SOURCE_DIR};

/// Name of the build config injected in dev mode for tasks, tests and
/// generators.
pub const SYSTEM_BUILD_NAME: &str = "system";

/// Names user configs may not take.
pub const RESERVED_BUILD_NAMES: &[&str] = &["config"];

/// Inputs of the injected system build config.
pub const SYSTEM_BUILD_INPUTS: &[&str] = &["**/*.{task,test,config,gen}*.ts", "**/fixtures/**"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Node,
    Browser,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Node => "node",
            Platform::Browser => "browser",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Platform::Node),
            "browser" => Ok(Platform::Browser),
            other => Err(format!(
                "invalid platform: {other} (expected \"node\" or \"browser\")"
            )),
        }
    }
}

/// A build config as written by the user, e.g.
///
/// ```toml
/// [[build]]
/// name = "browser"
/// platform = "browser"
/// input = ["index.ts", "**/*.worker.ts"]
/// ```
///
/// `input` may also be a single string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BuildConfigPartial {
    pub name: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default)]
    pub input: InputSpec,
}

fn default_platform() -> String {
    Platform::Node.as_str().to_string()
}

impl BuildConfigPartial {
    pub fn new(name: &str, platform: &str, input: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            platform: platform.to_string(),
            input: InputSpec::Many(input.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputSpec {
    One(String),
    Many(Vec<String>),
}

impl Default for InputSpec {
    fn default() -> Self {
        InputSpec::Many(Vec::new())
    }
}

impl InputSpec {
    pub fn entries(&self) -> Vec<&str> {
        match self {
            InputSpec::One(entry) => vec![entry.as_str()],
            InputSpec::Many(entries) => entries.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// One normalized but not yet validated input entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBuildInput {
    /// A literal file, resolved against the source directory.
    Path(SourceId),
    /// A glob over paths relative to the source directory.
    Pattern(String),
}

/// A build config after normalization, before validation.
///
/// The platform is still the user's string so validation can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuildConfig {
    pub name: String,
    pub platform: String,
    pub input: Vec<RawBuildInput>,
}

/// Compiled glob filter over source base paths.
#[derive(Clone)]
pub struct InputFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for InputFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFilter")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl InputFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            builder.add(Glob::new(pat.as_ref())?);
        }
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: builder.build()?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `base_path` is relative to the source directory, e.g. `"lib/a.test.ts"`.
    pub fn matches(&self, base_path: &str) -> bool {
        self.set.is_match(base_path)
    }
}

#[derive(Debug, Clone)]
pub enum BuildConfigInput {
    Path(SourceId),
    Filter(InputFilter),
}

/// A validated build target.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub name: String,
    pub platform: Platform,
    pub input: Vec<BuildConfigInput>,
}

impl BuildConfig {
    pub fn new(name: &str, platform: Platform, input: Vec<BuildConfigInput>) -> Self {
        Self {
            name: name.to_string(),
            platform,
            input,
        }
    }

    pub fn node(name: &str, input: Vec<BuildConfigInput>) -> Self {
        Self::new(name, Platform::Node, input)
    }

    pub fn browser(name: &str, input: Vec<BuildConfigInput>) -> Self {
        Self::new(name, Platform::Browser, input)
    }

    pub fn is_system(&self) -> bool {
        self.name == SYSTEM_BUILD_NAME
    }

    /// Whether `source_id` is a direct input of this config.
    pub fn matches(&self, source_id: &str, paths: &Paths) -> bool {
        self.input.iter().any(|input| match input {
            BuildConfigInput::Path(path) => path == source_id,
            BuildConfigInput::Filter(filter) => paths
                .source_base_path(source_id)
                .is_some_and(|base| filter.matches(base)),
        })
    }

    pub fn input_paths(&self) -> impl Iterator<Item = &str> {
        self.input.iter().filter_map(|input| match input {
            BuildConfigInput::Path(path) => Some(path.as_str()),
            BuildConfigInput::Filter(_) => None,
        })
    }
}

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [filer]
/// source_dir = "src"
/// dev = true
///
/// [[build]]
/// name = "browser"
/// platform = "browser"
/// input = "index.ts"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub filer: FilerSection,

    #[serde(default)]
    pub build: Vec<BuildConfigPartial>,
}

/// `[filer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FilerSection {
    /// Source directory, relative to the config file's directory.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Dev builds get the injected system config and their own cache.
    #[serde(default = "default_dev")]
    pub dev: bool,

    /// Minimum spacing between two writes of the same cache file.
    #[serde(default = "default_cache_write_delay_ms")]
    pub cache_write_delay_ms: u64,

    /// Maximum number of builders running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Served path prefix for bare imports in browser builds.
    #[serde(default)]
    pub externals_prefix: Option<String>,

    /// Extensions handled by the copy-through builder.
    #[serde(default)]
    pub copy_extensions: Vec<String>,
}

fn default_source_dir() -> String {
    DEFAULT_SOURCE_DIR.to_string()
}

fn default_dev() -> bool {
    true
}

fn default_cache_write_delay_ms() -> u64 {
    100
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for FilerSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            dev: default_dev(),
            cache_write_delay_ms: default_cache_write_delay_ms(),
            max_concurrency: default_max_concurrency(),
            externals_prefix: None,
            copy_extensions: Vec::new(),
        }
    }
}

impl FilerSection {
    pub fn mode(&self) -> BuildMode {
        BuildMode::from_dev(self.dev)
    }

    pub fn cache_write_delay(&self) -> Duration {
        Duration::from_millis(self.cache_write_delay_ms)
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub root: PathBuf,
    pub paths: Paths,
    pub filer: FilerSection,
    pub build_configs: Vec<Arc<BuildConfig>>,
}
