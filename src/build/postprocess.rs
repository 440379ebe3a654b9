// src/build/postprocess.rs

//! Import rewriting and dependency extraction for freshly built files.

use std::path::Path;

use tracing::trace;

use crate::build::imports::parse_imports;
use crate::build::{BuildContext, BuildDependency, BuildFile};
use crate::config::Platform;
use crate::errors::Result;
use crate::paths::{
    extension_of, is_external_module, join_path, split_id, to_build_extension, CSS_EXTENSION,
    JS_EXTENSION, SVELTE_EXTENSION, TS_EXTENSION,
};
use crate::source::{Contents, SourceSnapshot};

/// Rewrite imports in every JS output of one builder invocation and record
/// their dependencies. Non-JS and binary outputs pass through untouched.
pub fn postprocess(
    mut files: Vec<BuildFile>,
    source: &SourceSnapshot,
    ctx: &BuildContext,
) -> Result<Vec<BuildFile>> {
    for file in files.iter_mut() {
        if file.extension == JS_EXTENSION {
            if let Contents::Text(code) = &file.contents {
                let code = code.clone();
                let rewritten = rewrite_imports(file, &code, source, ctx);
                file.contents = Contents::Text(rewritten);
            }
        }
    }

    if source.extension == SVELTE_EXTENSION {
        register_svelte_css(&mut files, ctx);
    }

    Ok(files)
}

fn rewrite_imports(
    file: &mut BuildFile,
    code: &str,
    source: &SourceSnapshot,
    ctx: &BuildContext,
) -> String {
    let imports = parse_imports(code);
    if imports.is_empty() {
        return code.to_string();
    }

    let mut rewritten = code.to_string();
    let mut dependencies = Vec::with_capacity(imports.len());
    for import in &imports {
        let dep = if is_external_module(&import.specifier) {
            map_external(&import.specifier, file, ctx)
        } else {
            map_local(&import.specifier, file, source, ctx)
        };
        dependencies.push((import.range.clone(), dep));
    }

    // Back to front so earlier ranges stay valid.
    for (range, dep) in dependencies.iter().rev() {
        if dep.mapped_specifier != dep.specifier {
            rewritten.replace_range(range.clone(), &dep.mapped_specifier);
        }
    }

    for (_, dep) in dependencies {
        trace!(
            build_id = %file.id,
            specifier = %dep.specifier,
            target = %dep.build_id,
            "recorded dependency"
        );
        file.dependencies.entry(dep.build_id.clone()).or_insert(dep);
    }

    rewritten
}

fn map_external(specifier: &str, file: &BuildFile, ctx: &BuildContext) -> BuildDependency {
    let prefix = match (&ctx.externals_prefix, file.build_config.platform) {
        (Some(prefix), Platform::Browser) => Some(prefix.trim_end_matches('/')),
        _ => None,
    };

    let (mapped_specifier, build_id) = match prefix {
        Some(prefix) => {
            let served = if specifier.ends_with(JS_EXTENSION) {
                format!("{prefix}/{specifier}")
            } else {
                format!("{prefix}/{specifier}{JS_EXTENSION}")
            };
            let build_id = join_path(&ctx.build_dir(&file.build_config), &served);
            (served, build_id)
        }
        None => (specifier.to_string(), specifier.to_string()),
    };

    BuildDependency {
        specifier: specifier.to_string(),
        mapped_specifier,
        build_id,
        source_id: None,
        external: true,
    }
}

fn map_local(
    specifier: &str,
    file: &BuildFile,
    source: &SourceSnapshot,
    ctx: &BuildContext,
) -> BuildDependency {
    let resolved = if specifier.starts_with('/') {
        join_path(specifier, "")
    } else {
        join_path(&source.dir, specifier)
    };

    let (source_id, mapped_specifier) = match resolve_source(&resolved, specifier, ctx) {
        Some((source_id, mapped)) => (Some(source_id), mapped),
        None => (None, to_build_extension(specifier)),
    };

    let build_id = if mapped_specifier.starts_with('/') {
        mapped_specifier.clone()
    } else {
        join_path(&file.dir, &mapped_specifier)
    };

    BuildDependency {
        specifier: specifier.to_string(),
        mapped_specifier,
        build_id,
        source_id,
        external: false,
    }
}

/// Find the source file a local specifier points at.
///
/// Returns the source id and the specifier as it must appear in the output.
fn resolve_source(resolved: &str, specifier: &str, ctx: &BuildContext) -> Option<(String, String)> {
    let (_, filename) = split_id(specifier);
    let extension = extension_of(filename);

    let mut candidates: Vec<(String, String)> = Vec::new();
    if extension.is_empty() {
        let trimmed = specifier.trim_end_matches('/');
        for suffix in [TS_EXTENSION, JS_EXTENSION, "/index.ts", "/index.js"] {
            candidates.push((
                format!("{}{suffix}", resolved.trim_end_matches('/')),
                to_build_extension(&format!("{trimmed}{suffix}")),
            ));
        }
    } else {
        candidates.push((resolved.to_string(), to_build_extension(specifier)));
        if let Some(stem) = resolved.strip_suffix(JS_EXTENSION) {
            candidates.push((format!("{stem}{TS_EXTENSION}"), specifier.to_string()));
        }
    }

    candidates
        .into_iter()
        .find(|(candidate, _)| ctx.fs.is_file(Path::new(candidate)))
}

/// Browser builds of Svelte components load their CSS through the runtime.
fn register_svelte_css(files: &mut [BuildFile], ctx: &BuildContext) {
    let Some(css) = files.iter().find(|f| f.extension == CSS_EXTENSION) else {
        return;
    };
    if css.build_config.platform != Platform::Browser {
        return;
    }

    let build_dir = ctx.build_dir(&css.build_config);
    let served = match css.id.strip_prefix(build_dir.as_str()) {
        Some(rel) => rel.to_string(),
        None => format!("/{}", css.filename),
    };

    for file in files.iter_mut() {
        if file.extension != JS_EXTENSION {
            continue;
        }
        if let Contents::Text(code) = &file.contents {
            let statement = format!(";globalThis.gro.registerCss('{served}');");
            file.contents = Contents::Text(insert_after_first_line(code, &statement));
        }
    }
}

fn insert_after_first_line(code: &str, line: &str) -> String {
    match code.find('\n') {
        Some(idx) => format!("{}\n{line}\n{}", &code[..idx], &code[idx + 1..]),
        None => format!("{code}\n{line}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::BuildConfig;
    use crate::fs::mock::MockFileSystem;
    use crate::paths::{BuildMode, Paths};
    use crate::source::SourceFile;

    fn ctx(fs: &MockFileSystem) -> BuildContext {
        BuildContext::new(Arc::new(fs.clone()), Paths::new("/p"), BuildMode::Dev)
            .with_externals_prefix(Some("/externals".into()))
    }

    fn js_output(config: &Arc<BuildConfig>, id: &str, source_id: &str, code: &str) -> BuildFile {
        BuildFile::new(
            id.into(),
            Contents::Text(code.into()),
            source_id.into(),
            Arc::clone(config),
        )
    }

    #[test]
    fn local_ts_import_is_rewritten_and_recorded() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/index.ts", "");
        fs.add_file("/p/src/util.ts", "");
        let config = Arc::new(BuildConfig::browser("browser", Vec::new()));
        let source =
            SourceFile::new("/p/src/index.ts".into(), Contents::Text(String::new()), None).snapshot();
        let out = js_output(
            &config,
            "/p/.gro/dev/browser/index.js",
            "/p/src/index.ts",
            "import {x} from './util.ts';\nconsole.log(x);\n",
        );

        let files = postprocess(vec![out], &source, &ctx(&fs)).unwrap();
        let file = &files[0];

        assert_eq!(
            file.contents.as_text(),
            Some("import {x} from './util.js';\nconsole.log(x);\n")
        );
        let dep = &file.dependencies["/p/.gro/dev/browser/util.js"];
        assert_eq!(dep.specifier, "./util.ts");
        assert_eq!(dep.mapped_specifier, "./util.js");
        assert_eq!(dep.source_id.as_deref(), Some("/p/src/util.ts"));
        assert!(!dep.external);
    }

    #[test]
    fn js_and_extensionless_specifiers_resolve_to_ts_sources() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/lib/a.ts", "");
        fs.add_file("/p/src/lib/b.ts", "");
        fs.add_file("/p/src/lib/c/index.ts", "");
        let config = Arc::new(BuildConfig::node("node", Vec::new()));
        let source =
            SourceFile::new("/p/src/main.ts".into(), Contents::Text(String::new()), None).snapshot();
        let out = js_output(
            &config,
            "/p/.gro/dev/node/main.js",
            "/p/src/main.ts",
            "import './lib/a.js';\nimport './lib/b';\nimport './lib/c';\nimport './missing';\n",
        );

        let files = postprocess(vec![out], &source, &ctx(&fs)).unwrap();
        let file = &files[0];

        assert_eq!(
            file.contents.as_text(),
            Some("import './lib/a.js';\nimport './lib/b.js';\nimport './lib/c/index.js';\nimport './missing';\n")
        );
        let sources: Vec<_> = file
            .dependencies
            .values()
            .map(|d| d.source_id.as_deref())
            .collect();
        assert!(sources.contains(&Some("/p/src/lib/a.ts")));
        assert!(sources.contains(&Some("/p/src/lib/b.ts")));
        assert!(sources.contains(&Some("/p/src/lib/c/index.ts")));
        assert!(sources.contains(&None));
    }

    #[test]
    fn externals_map_to_prefix_only_in_browser_builds() {
        let fs = MockFileSystem::new();
        let source =
            SourceFile::new("/p/src/index.ts".into(), Contents::Text(String::new()), None).snapshot();
        let code = "import {writable} from 'svelte/store';\n";

        let browser = Arc::new(BuildConfig::browser("browser", Vec::new()));
        let out = js_output(&browser, "/p/.gro/dev/browser/index.js", &source.id, code);
        let files = postprocess(vec![out], &source, &ctx(&fs)).unwrap();
        assert_eq!(
            files[0].contents.as_text(),
            Some("import {writable} from '/externals/svelte/store.js';\n")
        );
        let dep = files[0].dependencies.values().next().unwrap();
        assert!(dep.external);
        assert_eq!(dep.build_id, "/p/.gro/dev/browser/externals/svelte/store.js");

        let node = Arc::new(BuildConfig::node("node", Vec::new()));
        let out = js_output(&node, "/p/.gro/dev/node/index.js", &source.id, code);
        let files = postprocess(vec![out], &source, &ctx(&fs)).unwrap();
        assert_eq!(files[0].contents.as_text(), Some(code));
        assert!(files[0].dependencies.contains_key("svelte/store"));
    }

    #[test]
    fn template_literal_imports_are_untouched() {
        let fs = MockFileSystem::new();
        let config = Arc::new(BuildConfig::node("node", Vec::new()));
        let source =
            SourceFile::new("/p/src/a.ts".into(), Contents::Text(String::new()), None).snapshot();
        let code = "const m = await import(`./${name}.ts`);\n";
        let out = js_output(&config, "/p/.gro/dev/node/a.js", &source.id, code);

        let files = postprocess(vec![out], &source, &ctx(&fs)).unwrap();
        assert_eq!(files[0].contents.as_text(), Some(code));
        assert!(files[0].dependencies.is_empty());
    }

    #[test]
    fn svelte_css_is_registered_in_browser_builds() {
        let fs = MockFileSystem::new();
        let config = Arc::new(BuildConfig::browser("browser", Vec::new()));
        let source = SourceFile::new(
            "/p/src/lib/App.svelte".into(),
            Contents::Text(String::new()),
            None,
        )
        .snapshot();
        let js = js_output(
            &config,
            "/p/.gro/dev/browser/lib/App.svelte.js",
            &source.id,
            "import 'svelte/internal';\nexport default {};\n",
        );
        let css = BuildFile::new(
            "/p/.gro/dev/browser/lib/App.css".into(),
            Contents::Text("h1 {}".into()),
            source.id.clone(),
            Arc::clone(&config),
        );

        let files = postprocess(vec![js, css], &source, &BuildContext::new(
            Arc::new(fs),
            Paths::new("/p"),
            BuildMode::Dev,
        ))
        .unwrap();

        assert_eq!(
            files[0].contents.as_text(),
            Some("import 'svelte/internal';\n;globalThis.gro.registerCss('/lib/App.css');\nexport default {};\n")
        );
        assert_eq!(files[1].contents.as_text(), Some("h1 {}"));
    }
}
