#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use filer::build::builder::BuildFuture;
use filer::build::{BuildContext, BuildFile, Builder, BuilderRegistry, NoopBuilder};
use filer::config::BuildConfig;
use filer::errors::FilerError;
use filer::paths::to_build_extension;
use filer::source::{Contents, SourceSnapshot};

/// Records every invocation as `(source id, build name)`.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<(String, String)>>,
    count: AtomicUsize,
}

impl CallLog {
    fn record(&self, source: &SourceSnapshot, config: &BuildConfig) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((source.id.clone(), config.name.clone()));
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of builds of `source_id`, across all build configs.
    pub fn count_for(&self, source_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == source_id)
            .count()
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.calls.lock().unwrap().clear();
    }
}

/// Stand-in for a TypeScript compiler: `.ts` in, `.js` out, code unchanged.
#[derive(Debug, Default)]
pub struct FakeTsBuilder {
    pub log: CallLog,
}

impl Builder for FakeTsBuilder {
    fn name(&self) -> &str {
        "fake-ts"
    }

    fn build<'a>(
        &'a self,
        source: &'a SourceSnapshot,
        config: &'a Arc<BuildConfig>,
        ctx: &'a BuildContext,
    ) -> BuildFuture<'a> {
        Box::pin(async move {
            self.log.record(source, config);
            transpile(self.name(), source, config, ctx)
        })
    }
}

fn transpile(
    builder: &str,
    source: &SourceSnapshot,
    config: &Arc<BuildConfig>,
    ctx: &BuildContext,
) -> Result<Vec<BuildFile>, FilerError> {
    let Contents::Text(code) = source.contents.as_ref() else {
        return Err(FilerError::UnhandledEncoding {
            id: source.id.clone(),
            encoding: source.encoding(),
            builder: builder.to_string(),
        });
    };
    let filename = to_build_extension(&source.filename);
    let id = ctx.output_id(source, config, &filename);
    Ok(vec![BuildFile::new(
        id,
        Contents::Text(code.clone()),
        source.id.clone(),
        Arc::clone(config),
    )])
}

/// Like [`FakeTsBuilder`], but once armed, the next build parks until
/// [`GatedBuilder::release`] is called.
#[derive(Debug, Default)]
pub struct GatedBuilder {
    pub log: CallLog,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedBuilder {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the armed build has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl Builder for GatedBuilder {
    fn name(&self) -> &str {
        "gated-ts"
    }

    fn build<'a>(
        &'a self,
        source: &'a SourceSnapshot,
        config: &'a Arc<BuildConfig>,
        ctx: &'a BuildContext,
    ) -> BuildFuture<'a> {
        Box::pin(async move {
            self.log.record(source, config);
            // Output reflects the contents this build started from.
            let files = transpile(self.name(), source, config, ctx);
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            files
        })
    }
}

/// Stand-in for a Svelte compiler: emits `X.svelte.js` and `X.svelte.css`.
#[derive(Debug, Default)]
pub struct FakeSvelteBuilder {
    pub log: CallLog,
}

impl Builder for FakeSvelteBuilder {
    fn name(&self) -> &str {
        "fake-svelte"
    }

    fn build<'a>(
        &'a self,
        source: &'a SourceSnapshot,
        config: &'a Arc<BuildConfig>,
        ctx: &'a BuildContext,
    ) -> BuildFuture<'a> {
        Box::pin(async move {
            self.log.record(source, config);
            let Contents::Text(code) = source.contents.as_ref() else {
                return Err(FilerError::UnhandledEncoding {
                    id: source.id.clone(),
                    encoding: source.encoding(),
                    builder: self.name().to_string(),
                });
            };
            let js_id = ctx.output_id(source, config, &format!("{}.js", source.filename));
            let css_id = ctx.output_id(source, config, &format!("{}.css", source.filename));
            Ok(vec![
                BuildFile::new(
                    js_id,
                    Contents::Text(format!("// {}\n{code}", source.filename)),
                    source.id.clone(),
                    Arc::clone(config),
                ),
                BuildFile::new(
                    css_id,
                    Contents::Text(".component {}\n".to_string()),
                    source.id.clone(),
                    Arc::clone(config),
                ),
            ])
        })
    }
}

/// Builders wired into a registry, with handles kept for assertions.
pub struct FakeBuilders {
    pub ts: Arc<FakeTsBuilder>,
    pub svelte: Arc<FakeSvelteBuilder>,
}

impl FakeBuilders {
    pub fn new() -> Self {
        Self {
            ts: Arc::new(FakeTsBuilder::default()),
            svelte: Arc::new(FakeSvelteBuilder::default()),
        }
    }

    /// `.ts` and `.svelte` go to the fakes; `.js`, `.json` and `.css` are
    /// copied through.
    pub fn registry(&self) -> BuilderRegistry {
        let mut registry = BuilderRegistry::new();
        registry
            .register(".ts", self.ts.clone())
            .expect("register .ts");
        registry
            .register(".svelte", self.svelte.clone())
            .expect("register .svelte");
        for ext in [".js", ".json", ".css"] {
            registry
                .register(ext, Arc::new(NoopBuilder))
                .expect("register copy-through builder");
        }
        registry
    }

    pub fn total_calls(&self) -> usize {
        self.ts.log.count() + self.svelte.log.count()
    }

    pub fn reset(&self) {
        self.ts.log.reset();
        self.svelte.log.reset();
    }
}

impl Default for FakeBuilders {
    fn default() -> Self {
        Self::new()
    }
}
