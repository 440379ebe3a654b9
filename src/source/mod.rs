// src/source/mod.rs

//! Source files: the filer's view of everything under the source directory.
//!
//! A [`SourceFile`] owns its contents, its content hash, the build configs it
//! currently belongs to, the build outputs produced for each of those configs,
//! and both directions of the dependency graph. Builders never see the mutable
//! registry entry; they get an immutable [`SourceSnapshot`].

pub mod hash;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::build::{BuildDependency, BuildFile};
use crate::fs::FileSystem;
use crate::paths::{extension_of, split_id, BuildId, SourceId};

pub use hash::compute_content_hash;

/// Extensions read as UTF-8 text. Everything else is treated as binary.
const TEXT_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".mjs", ".cjs", ".jsx", ".json", ".css", ".svelte", ".html", ".md",
    ".txt", ".svg", ".map", ".xml", ".yaml", ".yml", ".toml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Binary,
}

impl Encoding {
    pub fn is_utf8(&self) -> bool {
        *self == Encoding::Utf8
    }
}

pub fn infer_encoding(extension: &str) -> Encoding {
    if TEXT_EXTENSIONS.contains(&extension) {
        Encoding::Utf8
    } else {
        Encoding::Binary
    }
}

/// Raw file contents, tagged with how they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    Text(String),
    Binary(Vec<u8>),
}

impl Contents {
    pub fn encoding(&self) -> Encoding {
        match self {
            Contents::Text(_) => Encoding::Utf8,
            Contents::Binary(_) => Encoding::Binary,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Contents::Text(text) => text.as_bytes(),
            Contents::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Contents::Text(text) => Some(text),
            Contents::Binary(_) => None,
        }
    }
}

/// Read a file with the given encoding.
pub fn read_contents(fs: &dyn FileSystem, path: &Path, encoding: Encoding) -> Result<Contents> {
    Ok(match encoding {
        Encoding::Utf8 => Contents::Text(fs.read_to_string(path)?),
        Encoding::Binary => Contents::Binary(fs.read(path)?),
    })
}

/// What a source module is for, decided once from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// `*.task.*`: a runnable task module.
    Task,
    /// `*.gen.*`: a code generator.
    Gen,
    /// `*.test.*`
    Test,
    Module,
}

impl ModuleKind {
    pub fn from_filename(filename: &str) -> Self {
        if filename.contains(".task.") {
            ModuleKind::Task
        } else if filename.contains(".gen.") {
            ModuleKind::Gen
        } else if filename.contains(".test.") {
            ModuleKind::Test
        } else {
            ModuleKind::Module
        }
    }
}

/// Edges from one source file to the build ids of one neighbour, de-duplicated
/// by build id.
pub type DependencyEdges = BTreeMap<BuildId, BuildDependency>;

/// `build_name -> neighbour source id -> edges`
pub type DependencyMap = HashMap<String, HashMap<SourceId, DependencyEdges>>;

/// Immutable view of one version of a source file, handed to builders.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub id: SourceId,
    pub filename: String,
    pub dir: String,
    pub extension: String,
    pub contents: Arc<Contents>,
    pub content_hash: String,
    pub version: u64,
}

impl SourceSnapshot {
    pub fn encoding(&self) -> Encoding {
        self.contents.encoding()
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: SourceId,
    pub filename: String,
    pub dir: String,
    pub extension: String,
    pub kind: ModuleKind,
    pub contents: Arc<Contents>,
    pub content_hash: String,
    /// True while the contents differ from what the meta cache last recorded.
    pub dirty: bool,
    /// Bumped on every content change.
    pub version: u64,
    /// Builds this file currently belongs to, as an input or a dependency.
    pub build_configs: BTreeSet<String>,
    /// Builds this file is a direct input of.
    pub input_to: BTreeSet<String>,
    /// Builds whose outputs predate the current contents.
    pub outdated: BTreeSet<String>,
    /// Outputs per build name. Always replaced wholesale.
    pub build_files: BTreeMap<String, Arc<[BuildFile]>>,
    pub dependencies: DependencyMap,
    pub dependents: DependencyMap,
}

impl SourceFile {
    /// Create a source file, comparing its hash against the cached one.
    pub fn new(id: SourceId, contents: Contents, cached_hash: Option<&str>) -> Self {
        let (dir, filename) = split_id(&id);
        let (dir, filename) = (dir.to_string(), filename.to_string());
        let extension = extension_of(&filename).to_string();
        let content_hash = compute_content_hash(contents.as_bytes());
        let dirty = cached_hash != Some(content_hash.as_str());

        Self {
            kind: ModuleKind::from_filename(&filename),
            id,
            filename,
            dir,
            extension,
            contents: Arc::new(contents),
            content_hash,
            dirty,
            version: 0,
            build_configs: BTreeSet::new(),
            input_to: BTreeSet::new(),
            outdated: BTreeSet::new(),
            build_files: BTreeMap::new(),
            dependencies: HashMap::new(),
            dependents: HashMap::new(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.contents.encoding()
    }

    pub fn snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            id: self.id.clone(),
            filename: self.filename.clone(),
            dir: self.dir.clone(),
            extension: self.extension.clone(),
            contents: Arc::clone(&self.contents),
            content_hash: self.content_hash.clone(),
            version: self.version,
        }
    }

    /// Replace the contents. Returns `false` (and changes nothing) when the
    /// new contents hash to the current hash.
    pub fn update_contents(&mut self, contents: Contents) -> bool {
        let content_hash = compute_content_hash(contents.as_bytes());
        if content_hash == self.content_hash {
            return false;
        }
        self.contents = Arc::new(contents);
        self.content_hash = content_hash;
        self.dirty = true;
        self.version += 1;

        // Outputs held for builds this file is not part of came from the cache
        // and describe the old contents.
        let members = &self.build_configs;
        self.build_files.retain(|name, _| members.contains(name));
        self.outdated = self.build_configs.clone();
        true
    }

    pub fn is_input_to(&self, build_name: &str) -> bool {
        self.input_to.contains(build_name)
    }

    pub fn has_dependents_in(&self, build_name: &str) -> bool {
        self.dependents
            .get(build_name)
            .is_some_and(|by_source| !by_source.is_empty())
    }
}

/// Any file the filer knows about.
#[derive(Debug, Clone)]
pub enum FilerFile {
    Source(SourceFile),
    Build(BuildFile),
}

impl FilerFile {
    pub fn id(&self) -> &str {
        match self {
            FilerFile::Source(file) => &file.id,
            FilerFile::Build(file) => &file.id,
        }
    }
}

/// Narrow a [`FilerFile`] to a source file.
///
/// # Panics
///
/// Panics with the file id when handed a build file; callers only use this
/// where the id is known to name a source.
pub fn assert_is_source_file(file: &FilerFile) -> &SourceFile {
    match file {
        FilerFile::Source(source) => source,
        FilerFile::Build(build) => panic!(
            "expected a source file but {} is a build file of source {}",
            build.id, build.source_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_iff_hash_differs_from_cache() {
        let cached = compute_content_hash(b"export const a = 1;");

        let clean = SourceFile::new(
            "/p/src/a.ts".into(),
            Contents::Text("export const a = 1;".into()),
            Some(&cached),
        );
        assert!(!clean.dirty);

        let changed = SourceFile::new(
            "/p/src/a.ts".into(),
            Contents::Text("export const a = 2;".into()),
            Some(&cached),
        );
        assert!(changed.dirty);

        let uncached =
            SourceFile::new("/p/src/a.ts".into(), Contents::Text("x".into()), None);
        assert!(uncached.dirty);
    }

    #[test]
    fn new_source_file_splits_id() {
        let file = SourceFile::new(
            "/p/src/lib/thing.task.ts".into(),
            Contents::Text(String::new()),
            None,
        );
        assert_eq!(file.dir, "/p/src/lib");
        assert_eq!(file.filename, "thing.task.ts");
        assert_eq!(file.extension, ".ts");
        assert_eq!(file.kind, ModuleKind::Task);
    }

    #[test]
    fn update_with_same_contents_is_noop() {
        let mut file = SourceFile::new("/p/src/a.ts".into(), Contents::Text("a".into()), None);
        file.dirty = false;

        assert!(!file.update_contents(Contents::Text("a".into())));
        assert!(!file.dirty);
        assert_eq!(file.version, 0);

        file.build_configs.insert("node".into());
        assert!(file.update_contents(Contents::Text("b".into())));
        assert!(file.dirty);
        assert_eq!(file.version, 1);
        assert!(file.outdated.contains("node"));
    }

    #[test]
    fn encoding_inference() {
        assert_eq!(infer_encoding(".ts"), Encoding::Utf8);
        assert_eq!(infer_encoding(".png"), Encoding::Binary);
        assert_eq!(infer_encoding(""), Encoding::Binary);
    }

    #[test]
    fn module_kinds() {
        assert_eq!(ModuleKind::from_filename("a.gen.json.ts"), ModuleKind::Gen);
        assert_eq!(ModuleKind::from_filename("a.test.ts"), ModuleKind::Test);
        assert_eq!(ModuleKind::from_filename("a.ts"), ModuleKind::Module);
    }

    #[test]
    #[should_panic(expected = "is a build file")]
    fn assert_is_source_file_rejects_build_files() {
        use crate::config::BuildConfig;

        let config = std::sync::Arc::new(BuildConfig::node("node", Vec::new()));
        let build = BuildFile::new(
            "/p/.gro/dev/node/a.js".into(),
            Contents::Text(String::new()),
            "/p/src/a.ts".into(),
            config,
        );
        assert_is_source_file(&FilerFile::Build(build));
    }
}
