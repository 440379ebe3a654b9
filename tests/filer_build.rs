// tests/filer_build.rs

mod common;
use crate::common::*;

use std::collections::BTreeSet;

use filer::errors::FilerError;
use filer::source::{FilerFile, ModuleKind};

#[tokio::test]
async fn browser_build_links_index_to_util() {
    init_tracing();
    let project = browser_project();
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());

    let summary = with_timeout(filer.init()).await.unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.built, 2);
    assert_eq!(summary.hydrated, 0);
    assert!(summary.cycles.is_empty());

    let index = source_id("index.ts");
    let util = source_id("util.ts");
    assert_eq!(
        filer.dependencies_of(&index, "browser"),
        BTreeSet::from([util.clone()])
    );
    assert_eq!(
        filer.dependents_of(&util, "browser"),
        BTreeSet::from([index.clone()])
    );

    let outputs = filer.build_files(&index, "browser");
    assert_eq!(outputs.len(), 1);
    let util_js = dev_build_id("browser", "util.js");
    let deps: Vec<&str> = outputs[0].dependencies.keys().map(String::as_str).collect();
    assert_eq!(deps, vec![util_js.as_str()]);

    let fs = project.fs();
    let index_js = read_text(&fs, &dev_build_id("browser", "index.js"));
    assert!(index_js.contains("from './util.js'"), "{index_js}");
    assert!(exists(&fs, &util_js));

    // Two cache entries whose dependencies point at each other's outputs.
    let index_meta = meta_json(&fs, "index.ts");
    let util_meta = meta_json(&fs, "util.ts");
    assert_eq!(index_meta["source_id"], index.as_str());
    assert_eq!(
        index_meta["builds"][0]["dependencies"][0]["build_id"],
        util_meta["builds"][0]["id"]
    );
    assert_eq!(
        index_meta["builds"][0]["dependencies"][0]["source_id"],
        util.as_str()
    );
    assert_eq!(util_meta["builds"][0]["build_name"], "browser");
    assert!(util_meta["builds"][0].get("dependencies").is_none());
}

#[tokio::test]
async fn single_line_module_with_url_string_keeps_its_import() {
    init_tracing();
    let project = ProjectBuilder::new()
        .file(
            "index.ts",
            "const u = 'https://x.dev'; import { greet } from './util.ts'; greet(u);",
        )
        .file("util.ts", "export const greet = (s: string) => s;\n")
        .build("browser", "browser", &["index.ts"]);
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());
    filer.init().await.unwrap();

    assert_eq!(
        filer.dependencies_of(&source_id("index.ts"), "browser"),
        BTreeSet::from([source_id("util.ts")])
    );
    let fs = project.fs();
    let index_js = read_text(&fs, &dev_build_id("browser", "index.js"));
    assert_eq!(
        index_js,
        "const u = 'https://x.dev'; import { greet } from './util.js'; greet(u);"
    );
    assert!(exists(&fs, &dev_build_id("browser", "util.js")));
}

#[tokio::test]
async fn each_source_builds_once_per_config() {
    init_tracing();
    let project = browser_project().build("server", "node", &["index.ts"]);
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());

    let summary = filer.init().await.unwrap();
    assert_eq!(summary.built, 4);

    let mut calls = builders.ts.log.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            (source_id("index.ts"), "browser".to_string()),
            (source_id("index.ts"), "server".to_string()),
            (source_id("util.ts"), "browser".to_string()),
            (source_id("util.ts"), "server".to_string()),
        ]
    );

    let fs = project.fs();
    let meta = meta_json(&fs, "index.ts");
    let names: Vec<&str> = meta["builds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["build_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["browser", "server"]);
}

#[tokio::test]
async fn externals_are_served_from_prefix_in_browser_builds() {
    init_tracing();
    let project = ProjectBuilder::new()
        .file("index.ts", "import { writable } from 'svelte/store';\n")
        .build("browser", "browser", &["index.ts"])
        .build("server", "node", &["index.ts"])
        .externals_prefix("/externals");
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());
    filer.init().await.unwrap();

    let fs = project.fs();
    let browser = read_text(&fs, &dev_build_id("browser", "index.js"));
    assert!(browser.contains("from '/externals/svelte/store.js'"), "{browser}");
    let server = read_text(&fs, &dev_build_id("server", "index.js"));
    assert!(server.contains("from 'svelte/store'"), "{server}");

    let outputs = filer.build_files(&source_id("index.ts"), "browser");
    let dep = outputs[0].dependencies.values().next().unwrap();
    assert!(dep.external);
    assert_eq!(dep.source_id, None);
    assert!(filer.dependencies_of(&source_id("index.ts"), "browser").is_empty());
}

#[tokio::test]
async fn svelte_component_registers_its_css() {
    init_tracing();
    let project = ProjectBuilder::new()
        .file("App.svelte", "import { greet } from './util.ts';\n")
        .file("util.ts", "export const greet = () => 'hi';\n")
        .build("browser", "browser", &["App.svelte"]);
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());
    filer.init().await.unwrap();

    assert_eq!(builders.svelte.log.count(), 1);
    let fs = project.fs();
    let js = read_text(&fs, &dev_build_id("browser", "App.svelte.js"));
    let lines: Vec<&str> = js.lines().collect();
    assert_eq!(lines[0], "// App.svelte");
    assert_eq!(lines[1], ";globalThis.gro.registerCss('/App.svelte.css');");
    assert!(js.contains("from './util.js'"));
    assert!(exists(&fs, &dev_build_id("browser", "App.svelte.css")));
    assert_eq!(
        filer.dependencies_of(&source_id("App.svelte"), "browser"),
        BTreeSet::from([source_id("util.ts")])
    );
}

#[tokio::test]
async fn import_cycles_build_and_are_reported() {
    init_tracing();
    let project = ProjectBuilder::new()
        .file("a.ts", "import { b } from './b.ts';\nexport const a = 1;\n")
        .file("b.ts", "import { a } from './a.ts';\nexport const b = 2;\n")
        .build("browser", "browser", &["a.ts"]);
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());

    let summary = with_timeout(filer.init()).await.unwrap();
    assert_eq!(builders.ts.log.count(), 2);
    let cycle = vec![source_id("a.ts"), source_id("b.ts")];
    assert_eq!(summary.cycles, vec![cycle.clone()]);
    assert_eq!(filer.import_cycles(Some("browser")), vec![cycle]);

    let dependents = filer.filter_dependents(&source_id("a.ts"), Some("browser"), |_| true);
    assert_eq!(dependents, BTreeSet::from([source_id("b.ts")]));
}

#[tokio::test]
async fn system_build_only_exists_in_dev() {
    init_tracing();
    let dev = ProjectBuilder::new()
        .file("index.ts", "export {};\n")
        .file("lib/math.test.ts", "import './helpers.ts';\n")
        .file("lib/helpers.ts", "export {};\n")
        .build("browser", "browser", &["index.ts"]);
    let builders = FakeBuilders::new();
    let filer = dev.filer(builders.registry());
    filer.init().await.unwrap();

    assert_eq!(filer.build_configs()[0].name, "system");
    let test_file = source_id("lib/math.test.ts");
    assert_eq!(filer.build_files(&test_file, "system").len(), 1);
    assert_eq!(
        filer.dependencies_of(&test_file, "system"),
        BTreeSet::from([source_id("lib/helpers.ts")])
    );
    assert_eq!(filer.source_ids_of_kind(ModuleKind::Test), vec![test_file.clone()]);
    assert!(exists(&dev.fs(), &dev_build_id("system", "lib/math.test.js")));

    let prod = ProjectBuilder::with_fs(dev.fs())
        .build("browser", "browser", &["index.ts"])
        .prod();
    let builders = FakeBuilders::new();
    let filer = prod.filer(builders.registry());
    filer.init().await.unwrap();
    assert!(filer.build_configs().iter().all(|c| c.name != "system"));
    assert!(filer.build_files(&test_file, "system").is_empty());
    assert!(exists(&dev.fs(), "/p/.gro/prod/browser/index.js"));
}

#[tokio::test]
async fn find_by_id_returns_sources_and_outputs() {
    init_tracing();
    let project = browser_project();
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());
    filer.init().await.unwrap();

    let index = source_id("index.ts");
    match filer.find_by_id(&index) {
        Some(FilerFile::Source(file)) => {
            assert!(file.is_input_to("browser"));
            assert!(!file.dirty);
        }
        other => panic!("expected source file, got {other:?}"),
    }

    let util_js = dev_build_id("browser", "util.js");
    match filer.find_by_id(&util_js) {
        Some(FilerFile::Build(file)) => {
            assert_eq!(file.source_id, source_id("util.ts"));
            assert_eq!(file.build_name(), "browser");
        }
        other => panic!("expected build file, got {other:?}"),
    }
    assert!(filer.find_by_id("/p/src/missing.ts").is_none());
}

#[tokio::test]
async fn unhandled_extension_fails_init() {
    init_tracing();
    let project = ProjectBuilder::new()
        .binary("logo.png", &[0x89, 0x50, 0x4e, 0x47])
        .build("browser", "browser", &["logo.png"]);
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());

    let err = filer.init().await.unwrap_err();
    assert!(
        matches!(err, FilerError::UnhandledExtension { ref extension, .. } if extension == ".png"),
        "{err:?}"
    );
}

#[tokio::test]
async fn files_outside_every_build_are_not_built() {
    init_tracing();
    let project = browser_project().file("notes.md", "# notes\n");
    let builders = FakeBuilders::new();
    let filer = project.filer(builders.registry());

    let summary = filer.init().await.unwrap();
    assert_eq!(summary.files, 3);
    assert_eq!(summary.built, 2);
    let notes = filer.source_file(&source_id("notes.md")).unwrap();
    assert!(notes.build_configs.is_empty());
    assert!(!exists(&project.fs(), &dev_meta_path("notes.md")));
}
