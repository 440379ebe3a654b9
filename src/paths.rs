// src/paths.rs

//! Project layout and path-string helpers.
//!
//! Ids are forward-slash path strings. A source id looks like
//! `<root>/src/lib/util.ts`; the build outputs for it live under
//! `<root>/.gro/<dev|prod>/<build_name>/lib/util.js` and its cached metadata in
//! `<root>/.gro/<dev|prod>_meta/lib/util.ts.json`.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Id of a file under the source directory.
pub type SourceId = String;

/// Id of a build artifact (or of an external module for external deps).
pub type BuildId = String;

pub const BUILD_DIR_NAME: &str = ".gro";
pub const DEFAULT_SOURCE_DIR: &str = "src";

pub const JS_EXTENSION: &str = ".js";
pub const TS_EXTENSION: &str = ".ts";
pub const SVELTE_EXTENSION: &str = ".svelte";
pub const CSS_EXTENSION: &str = ".css";
pub const META_EXTENSION: &str = ".json";

/// Dev and prod builds never share outputs or cached metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Dev,
    Prod,
}

impl BuildMode {
    pub fn from_dev(dev: bool) -> Self {
        if dev { BuildMode::Dev } else { BuildMode::Prod }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Dev => "dev",
            BuildMode::Prod => "prod",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved directory layout of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: String,
    source: String,
    build: String,
}

impl Paths {
    /// Layout with the conventional `src` source directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_source_dir(root, DEFAULT_SOURCE_DIR)
    }

    /// Layout with a custom source directory, relative to `root` unless
    /// absolute.
    pub fn with_source_dir(root: impl AsRef<Path>, source_dir: impl AsRef<Path>) -> Self {
        let root = trim_trailing_slash(to_path_string(root.as_ref()));
        let source_dir = to_path_string(source_dir.as_ref());
        let source = if Path::new(&source_dir).is_absolute() {
            trim_trailing_slash(source_dir)
        } else {
            join_path(&root, &source_dir)
        };
        let build = join_path(&root, BUILD_DIR_NAME);
        Self {
            root,
            source,
            build,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    /// `<root>/.gro/<mode>/<build_name>`
    pub fn build_dir(&self, mode: BuildMode, build_name: &str) -> String {
        format!("{}/{}/{}", self.build, mode.as_str(), build_name)
    }

    /// `<root>/.gro/<mode>_meta`
    pub fn meta_dir(&self, mode: BuildMode) -> String {
        format!("{}/{}_meta", self.build, mode.as_str())
    }

    /// Path of `id` relative to the source directory, if it lives there.
    pub fn source_base_path<'a>(&self, id: &'a str) -> Option<&'a str> {
        id.strip_prefix(self.source.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    pub fn is_source_id(&self, id: &str) -> bool {
        self.source_base_path(id).is_some()
    }

    /// Resolve a user-supplied input path against the source directory.
    pub fn resolve_source_path(&self, path: &str) -> SourceId {
        if Path::new(path).is_absolute() {
            join_path(path, "")
        } else {
            join_path(&self.source, path)
        }
    }

    /// Build output id for a path relative to the source directory.
    pub fn to_build_out_path(&self, mode: BuildMode, build_name: &str, base_path: &str) -> BuildId {
        join_path(&self.build_dir(mode, build_name), base_path)
    }

    /// Cache file for one source id.
    pub fn to_meta_path(&self, mode: BuildMode, source_id: &str) -> Option<String> {
        let base = self.source_base_path(source_id)?;
        Some(format!("{}/{}{}", self.meta_dir(mode), base, META_EXTENSION))
    }
}

fn trim_trailing_slash(mut s: String) -> String {
    while s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Render a path as a forward-slash string.
pub fn to_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Join `rel` onto `dir`, resolving `.` and `..` segments.
pub fn join_path(dir: &str, rel: &str) -> String {
    let absolute = dir.starts_with('/');
    let leading_dot = dir == "." || dir.starts_with("./");
    let mut parts: Vec<&str> = Vec::new();

    for segment in dir.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if leading_dot && !joined.starts_with("..") {
        if joined.is_empty() {
            ".".to_string()
        } else {
            format!("./{joined}")
        }
    } else {
        joined
    }
}

/// Split an id into `(dir, filename)`.
pub fn split_id(id: &str) -> (&str, &str) {
    match id.rsplit_once('/') {
        Some(("", filename)) => ("/", filename),
        Some((dir, filename)) => (dir, filename),
        None => (".", id),
    }
}

/// Extension including the dot, or `""`. Dotfiles have no extension.
pub fn extension_of(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &filename[idx..],
    }
}

/// Map a source path's extension to the extension its build output uses.
///
/// `.ts` becomes `.js`, `.svelte` becomes `.svelte.js`, anything else passes
/// through unchanged.
pub fn to_build_extension(path: &str) -> String {
    if let Some(stem) = path.strip_suffix(TS_EXTENSION) {
        if !stem.ends_with(".d") {
            return format!("{stem}{JS_EXTENSION}");
        }
    }
    if path.ends_with(SVELTE_EXTENSION) {
        return format!("{path}{JS_EXTENSION}");
    }
    path.to_string()
}

/// Bare specifiers (`svelte`, `@scope/pkg/sub`) refer to packages, not files.
pub fn is_external_module(specifier: &str) -> bool {
    !(specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == "..")
}
