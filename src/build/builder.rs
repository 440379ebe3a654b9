// src/build/builder.rs

//! Pluggable per-extension compilers.
//!
//! The filer talks to a `Builder` instead of a concrete compiler, so tests can
//! swap in fakes and real toolchains stay outside this crate. Builders only
//! produce `BuildFile`s; dependency discovery happens in the postprocessor.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::build::{BuildContext, BuildFile};
use crate::config::BuildConfig;
use crate::errors::{FilerError, Result};
use crate::source::SourceSnapshot;

pub type BuildFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<BuildFile>>> + Send + 'a>>;

pub trait Builder: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Compile one source file for one build config.
    ///
    /// Implementations may emit several files (e.g. JS plus CSS) and should
    /// return [`FilerError::UnhandledEncoding`] for contents they cannot read.
    fn build<'a>(
        &'a self,
        source: &'a SourceSnapshot,
        config: &'a Arc<BuildConfig>,
        ctx: &'a BuildContext,
    ) -> BuildFuture<'a>;
}

/// Maps source extensions to the one builder that claims them.
#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    by_extension: HashMap<String, Arc<dyn Builder>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `extension` (with the dot, e.g. `.ts`) for `builder`.
    pub fn register(&mut self, extension: &str, builder: Arc<dyn Builder>) -> Result<()> {
        if self.by_extension.contains_key(extension) {
            return Err(FilerError::DuplicateBuilder(extension.to_string()));
        }
        debug!(extension, builder = builder.name(), "registered builder");
        self.by_extension.insert(extension.to_string(), builder);
        Ok(())
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn Builder>> {
        self.by_extension.get(extension)
    }

    pub fn for_source(&self, source: &SourceSnapshot) -> Result<&Arc<dyn Builder>> {
        self.get(&source.extension)
            .ok_or_else(|| FilerError::UnhandledExtension {
                id: source.id.clone(),
                extension: source.extension.clone(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

/// Copies the source through unchanged, under the same filename.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBuilder;

impl Builder for NoopBuilder {
    fn name(&self) -> &str {
        "noop"
    }

    fn build<'a>(
        &'a self,
        source: &'a SourceSnapshot,
        config: &'a Arc<BuildConfig>,
        ctx: &'a BuildContext,
    ) -> BuildFuture<'a> {
        Box::pin(async move {
            let id = ctx.output_id(source, config, &source.filename);
            Ok(vec![BuildFile::new(
                id,
                (*source.contents).clone(),
                source.id.clone(),
                Arc::clone(config),
            )])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::paths::{BuildMode, Paths};
    use crate::source::{Contents, SourceFile};

    #[test]
    fn one_builder_per_extension() {
        let mut registry = BuilderRegistry::new();
        registry.register(".css", Arc::new(NoopBuilder)).unwrap();

        let err = registry.register(".css", Arc::new(NoopBuilder)).unwrap_err();
        assert!(matches!(err, FilerError::DuplicateBuilder(ext) if ext == ".css"));
    }

    #[test]
    fn unclaimed_extension_is_an_error() {
        let registry = BuilderRegistry::new();
        let source =
            SourceFile::new("/p/src/a.png".into(), Contents::Binary(vec![1]), None).snapshot();

        let err = registry.for_source(&source).unwrap_err();
        assert!(matches!(
            err,
            FilerError::UnhandledExtension { ref extension, .. } if extension == ".png"
        ));
    }

    #[tokio::test]
    async fn noop_builder_copies_through() {
        let ctx = BuildContext::new(
            Arc::new(MockFileSystem::new()),
            Paths::new("/p"),
            BuildMode::Dev,
        );
        let config = Arc::new(BuildConfig::node("node", Vec::new()));
        let source = SourceFile::new(
            "/p/src/styles/site.css".into(),
            Contents::Text("body {}".into()),
            None,
        )
        .snapshot();

        let files = NoopBuilder.build(&source, &config, &ctx).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "/p/.gro/dev/node/styles/site.css");
        assert_eq!(files[0].contents, Contents::Text("body {}".into()));
        assert_eq!(files[0].source_id, "/p/src/styles/site.css");
    }
}
