// tests/properties.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use filer::build::{diff_dependencies, BuildDependency, BuildFile};
use filer::cache::{SourceMetaBuild, SourceMetaData};
use filer::config::BuildConfig;
use filer::filer::SourceRegistry;
use filer::source::{compute_content_hash, Contents, Encoding, SourceFile};

fn dep(target: &str) -> BuildDependency {
    BuildDependency {
        specifier: format!("./{target}"),
        mapped_specifier: format!("./{target}"),
        build_id: format!("/p/.gro/dev/node/{target}.js"),
        source_id: Some(format!("/p/src/{target}.ts")),
        external: false,
    }
}

fn build_file(targets: &BTreeSet<String>) -> BuildFile {
    let config = Arc::new(BuildConfig::node("node", Vec::new()));
    let mut file = BuildFile::new(
        "/p/.gro/dev/node/a.js".into(),
        Contents::Text(String::new()),
        "/p/src/a.ts".into(),
        config,
    );
    for target in targets {
        let dep = dep(target);
        file.dependencies.insert(dep.build_id.clone(), dep);
    }
    file
}

fn targets() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set("[a-h]", 0..6)
}

proptest! {
    #[test]
    fn diff_of_identical_outputs_is_none(deps in targets()) {
        let files = [build_file(&deps)];
        prop_assert_eq!(diff_dependencies(&files, &files), None);
    }

    #[test]
    fn diff_reports_exact_set_differences(new in targets(), old in targets()) {
        let diff = diff_dependencies(&[build_file(&new)], &[build_file(&old)]);
        let expected_added: BTreeSet<String> =
            new.difference(&old).map(|t| dep(t).build_id).collect();
        let expected_removed: BTreeSet<String> =
            old.difference(&new).map(|t| dep(t).build_id).collect();

        match diff {
            None => prop_assert_eq!(&new, &old),
            Some(diff) => {
                let added: BTreeSet<String> = diff.added.iter().map(|d| d.build_id.clone()).collect();
                let removed: BTreeSet<String> = diff.removed.iter().map(|d| d.build_id.clone()).collect();
                prop_assert_eq!(added.len(), diff.added.len());
                prop_assert_eq!(&added, &expected_added);
                prop_assert_eq!(&removed, &expected_removed);
                prop_assert!(added.is_disjoint(&removed));
            }
        }
    }

    #[test]
    fn dirty_iff_hash_differs(cached in ".{0,32}", current in ".{0,32}") {
        let hash = compute_content_hash(cached.as_bytes());
        let file = SourceFile::new("/p/src/a.ts".into(), Contents::Text(current.clone()), Some(&hash));
        prop_assert_eq!(file.dirty, cached != current);
    }

    #[test]
    fn meta_json_round_trips(
        names in proptest::collection::vec("[a-z]{1,6}", 1..4),
        with_deps in any::<bool>(),
        binary in any::<bool>(),
    ) {
        let builds = names
            .iter()
            .map(|name| SourceMetaBuild {
                id: format!("/p/.gro/dev/{name}/a.js"),
                build_name: name.clone(),
                dependencies: with_deps.then(|| vec![dep("b")]),
                encoding: if binary { Encoding::Binary } else { Encoding::Utf8 },
            })
            .collect();
        let data = SourceMetaData {
            source_id: "/p/src/a.ts".into(),
            content_hash: compute_content_hash(b"a"),
            builds,
        };

        let json = data.to_json().unwrap();
        prop_assert_eq!(SourceMetaData::from_json(&json).unwrap(), data.clone());
        prop_assert_eq!(json.contains("\"encoding\""), binary);
        prop_assert_eq!(json.contains("\"dependencies\""), with_deps);
    }

    #[test]
    fn filter_dependents_visits_each_file_once(
        edges in proptest::collection::vec((0usize..6, 0usize..6), 0..20),
    ) {
        let ids: Vec<String> = (0..6).map(|i| format!("/p/src/f{i}.ts")).collect();
        let mut reg = SourceRegistry::new();
        for id in &ids {
            reg.insert(SourceFile::new(id.clone(), Contents::Text(String::new()), None));
        }
        for (from, to) in &edges {
            let mut d = dep(&format!("f{to}"));
            d.source_id = Some(ids[*to].clone());
            reg.add_edge("node", &ids[*from], &d);
        }

        // Reference answer: reverse reachability from f0.
        let mut expected = BTreeSet::new();
        let mut frontier = vec![0usize];
        while let Some(current) = frontier.pop() {
            for (from, to) in &edges {
                if *to == current && *from != 0 && expected.insert(ids[*from].clone()) {
                    frontier.push(*from);
                }
            }
        }

        let found = reg.filter_dependents(&ids[0], Some("node"), |_| true);
        prop_assert!(!found.contains(&ids[0]));
        prop_assert_eq!(found, expected);
    }
}
