// src/filer/graph.rs

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::filer::registry::SourceRegistry;
use crate::paths::SourceId;

/// Import cycles among registered sources, each sorted, in sorted order.
///
/// With `build_name`, only edges of that build are considered.
pub fn import_cycles(registry: &SourceRegistry, build_name: Option<&str>) -> Vec<Vec<SourceId>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for file in registry.files() {
        graph.add_node(file.id.as_str());
        for (name, by_source) in &file.dependencies {
            if build_name.is_some_and(|b| b != name) {
                continue;
            }
            for target in by_source.keys() {
                graph.add_edge(file.id.as_str(), target.as_str(), ());
            }
        }
    }

    let mut cycles: Vec<Vec<SourceId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut ids: Vec<SourceId> = scc.into_iter().map(String::from).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}
