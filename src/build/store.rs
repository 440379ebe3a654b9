// src/build/store.rs

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::build::BuildFile;
use crate::cache::SourceMeta;
use crate::config::BuildConfig;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::source::read_contents;

/// Outputs per build name, as held by a source file.
pub type BuildFilesByConfig = BTreeMap<String, Arc<[BuildFile]>>;

/// Rebuild a source's outputs from its cache entry and the files on disk.
///
/// Builds whose config no longer exists are dropped. Returns `Ok(None)` when
/// any remaining output is missing on disk, meaning the source must be
/// rebuilt.
pub fn reconstruct_build_files(
    fs: &dyn FileSystem,
    meta: &SourceMeta,
    configs: &[Arc<BuildConfig>],
) -> Result<Option<BuildFilesByConfig>> {
    let mut grouped: BTreeMap<String, Vec<BuildFile>> = BTreeMap::new();

    for build in &meta.data.builds {
        let Some(config) = configs.iter().find(|c| c.name == build.build_name) else {
            debug!(
                source_id = %meta.data.source_id,
                build_name = %build.build_name,
                "dropping cached build for unknown config"
            );
            continue;
        };

        let path = Path::new(&build.id);
        if !fs.is_file(path) {
            debug!(build_id = %build.id, "cached build output missing on disk");
            return Ok(None);
        }

        let contents = read_contents(fs, path, build.encoding)?;
        let mut file = BuildFile::new(
            build.id.clone(),
            contents,
            meta.data.source_id.clone(),
            Arc::clone(config),
        );
        if let Some(deps) = &build.dependencies {
            file.dependencies = deps
                .iter()
                .map(|dep| (dep.build_id.clone(), dep.clone()))
                .collect();
        }
        grouped.entry(build.build_name.clone()).or_default().push(file);
    }

    Ok(Some(
        grouped
            .into_iter()
            .map(|(name, files)| (name, Arc::from(files)))
            .collect(),
    ))
}
