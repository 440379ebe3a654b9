#![allow(dead_code)]

use std::path::Path;

use filer::fs::FileSystem;
use filer::fs::mock::MockFileSystem;
use serde_json::Value;

pub use filer_test_utils::builders::{
    ProjectBuilder, dev_build_id, dev_meta_path, read_text, source_id,
};
pub use filer_test_utils::fake_builders::FakeBuilders;
pub use filer_test_utils::{init_tracing, with_timeout};

/// Parsed cache entry of `rel` (relative to the source dir).
pub fn meta_json(fs: &MockFileSystem, rel: &str) -> Value {
    let text = read_text(fs, &dev_meta_path(rel));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("parsing meta of {rel}: {e}"))
}

pub fn exists(fs: &MockFileSystem, path: &str) -> bool {
    fs.exists(Path::new(path))
}

/// `browser` build of `index.ts`, which imports `./util.ts`.
pub fn browser_project() -> ProjectBuilder {
    ProjectBuilder::new()
        .file(
            "index.ts",
            "import { greet } from './util.ts';\nconsole.log(greet('x'));\n",
        )
        .file(
            "util.ts",
            "export const greet = (name: string) => `hi ${name}`;\n",
        )
        .build("browser", "browser", &["index.ts"])
}
