// src/cache/source_meta.rs

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::throttle::{ThrottledWriter, WriteLease, WriteOp};
use crate::cache::{SourceMeta, SourceMetaBuild, SourceMetaData};
use crate::config::BuildConfig;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::paths::{to_path_string, BuildMode, Paths, SourceId, META_EXTENSION};
use crate::source::SourceFile;

/// In-memory index of the meta cache plus its write path.
///
/// Only this type writes under the meta directory, always through its
/// throttled writer.
#[derive(Debug)]
pub struct SourceMetaCache {
    fs: Arc<dyn FileSystem>,
    paths: Paths,
    mode: BuildMode,
    entries: Mutex<HashMap<SourceId, SourceMeta>>,
    writer: ThrottledWriter,
}

impl SourceMetaCache {
    pub fn new(fs: Arc<dyn FileSystem>, paths: Paths, mode: BuildMode, write_delay: Duration) -> Self {
        let writer = ThrottledWriter::new(Arc::clone(&fs), write_delay);
        Self {
            fs,
            paths,
            mode,
            entries: Mutex::new(HashMap::new()),
            writer,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SourceId, SourceMeta>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cache_dir(&self) -> String {
        self.paths.meta_dir(self.mode)
    }

    /// Load every cache file under the mode's meta directory.
    ///
    /// A missing directory is a cold start. Files that fail to parse are
    /// skipped and treated as cache misses.
    pub async fn init(&self) -> Result<usize> {
        let dir = self.cache_dir();
        let files = self.fs.find_files(Path::new(&dir))?;

        let mut loaded = HashMap::new();
        for path in files {
            let cache_id = to_path_string(&path);
            if !cache_id.ends_with(META_EXTENSION) {
                continue;
            }
            let parsed = self
                .fs
                .read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| SourceMetaData::from_json(&json).map_err(|e| e.to_string()));
            match parsed {
                Ok(data) => {
                    loaded.insert(data.source_id.clone(), SourceMeta { cache_id, data });
                }
                Err(error) => {
                    warn!(cache_id = %cache_id, %error, "skipping unreadable source meta");
                }
            }
        }

        let count = loaded.len();
        *self.entries() = loaded;
        info!(dir = %dir, count, "loaded source meta cache");
        Ok(count)
    }

    pub fn get(&self, source_id: &str) -> Option<SourceMeta> {
        self.entries().get(source_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.entries().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Recompute `file`'s entry from its current outputs and queue the write.
    ///
    /// Outputs are listed in the order of `active_configs`. An entry left with
    /// no builds is deleted.
    ///
    /// Builds outside `active_configs` are kept only while the cached content
    /// hash equals `file.content_hash`; otherwise they are dropped.
    pub fn stage_update(
        &self,
        file: &SourceFile,
        active_configs: &[Arc<BuildConfig>],
    ) -> Result<Option<WriteLease>> {
        let Some(cache_id) = self.paths.to_meta_path(self.mode, &file.id) else {
            debug!(source_id = %file.id, "source outside the source dir; not cached");
            return Ok(None);
        };

        let mut builds = Vec::new();
        for config in active_configs {
            let Some(outputs) = file.build_files.get(&config.name) else {
                continue;
            };
            for output in outputs.iter() {
                builds.push(SourceMetaBuild {
                    id: output.id.clone(),
                    build_name: config.name.clone(),
                    dependencies: if output.dependencies.is_empty() {
                        None
                    } else {
                        Some(output.dependencies.values().cloned().collect())
                    },
                    encoding: output.contents.encoding(),
                });
            }
        }

        let active_names: BTreeSet<&str> = active_configs.iter().map(|c| c.name.as_str()).collect();
        let mut entries = self.entries();
        if let Some(old) = entries.get(&file.id) {
            if old.data.content_hash == file.content_hash {
                builds.extend(
                    old.data
                        .builds
                        .iter()
                        .filter(|b| !active_names.contains(b.build_name.as_str()))
                        .cloned(),
                );
            }
        }

        if builds.is_empty() {
            drop(entries);
            return Ok(self.stage_delete(&file.id));
        }

        let data = SourceMetaData {
            source_id: file.id.clone(),
            content_hash: file.content_hash.clone(),
            builds,
        };
        if entries.get(&file.id).is_some_and(|old| old.data == data) {
            return Ok(None);
        }

        let json = data.to_json()?;
        entries.insert(
            file.id.clone(),
            SourceMeta {
                cache_id: cache_id.clone(),
                data,
            },
        );
        debug!(source_id = %file.id, cache_id = %cache_id, "staged source meta update");
        Ok(self.writer.enqueue(cache_id, WriteOp::Write(json.into_bytes())))
    }

    pub async fn update(&self, file: &SourceFile, active_configs: &[Arc<BuildConfig>]) -> Result<()> {
        if let Some(lease) = self.stage_update(file, active_configs)? {
            lease.run().await?;
        }
        Ok(())
    }

    /// Drop `source_id`'s entry and queue removal of its file. Idempotent.
    pub fn stage_delete(&self, source_id: &str) -> Option<WriteLease> {
        let removed = self.entries().remove(source_id);
        let cache_id = match removed {
            Some(meta) => meta.cache_id,
            None => {
                let path = self.paths.to_meta_path(self.mode, source_id)?;
                if !self.fs.exists(Path::new(&path)) {
                    return None;
                }
                path
            }
        };
        debug!(source_id, cache_id = %cache_id, "staged source meta delete");
        self.writer.enqueue(cache_id, WriteOp::Remove)
    }

    pub async fn delete(&self, source_id: &str) -> Result<()> {
        if let Some(lease) = self.stage_delete(source_id) {
            lease.run().await?;
        }
        Ok(())
    }

    /// Delete every entry whose source file no longer exists.
    pub async fn clean(&self) -> Result<Vec<SourceId>> {
        let stale: Vec<SourceId> = self
            .source_ids()
            .into_iter()
            .filter(|id| !self.fs.exists(Path::new(id)))
            .collect();

        for id in &stale {
            self.delete(id).await?;
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "removed stale source meta entries");
        }
        Ok(stale)
    }

    /// Whether some cache write is still queued or in flight.
    pub fn has_pending_writes(&self) -> bool {
        self.writer.has_pending()
    }
}
