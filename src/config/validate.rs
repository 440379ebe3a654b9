// src/config/validate.rs

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{
    BuildConfig, BuildConfigInput, BuildConfigPartial, ConfigFile, FilerSection, InputFilter,
    Platform, RawBuildConfig, RawBuildInput, RawConfigFile, RESERVED_BUILD_NAMES,
    SYSTEM_BUILD_INPUTS, SYSTEM_BUILD_NAME,
};
use crate::errors::{BuildConfigError, FilerError, Result};
use crate::fs::FileSystem;
use crate::paths::Paths;

const GLOB_META_CHARS: &[char] = &['*', '?', '[', '{'];

fn is_pattern(entry: &str) -> bool {
    entry.contains(GLOB_META_CHARS)
}

/// Convert user partials into canonical form.
///
/// Literal inputs are resolved against the source directory. In dev mode a
/// `system` config for tasks, tests and generators is prepended unless one is
/// already present.
pub fn normalize(partials: &[BuildConfigPartial], dev: bool, paths: &Paths) -> Vec<RawBuildConfig> {
    let mut configs: Vec<RawBuildConfig> = partials
        .iter()
        .map(|partial| RawBuildConfig {
            name: partial.name.clone(),
            platform: partial.platform.clone(),
            input: partial
                .input
                .entries()
                .into_iter()
                .map(|entry| {
                    if is_pattern(entry) {
                        RawBuildInput::Pattern(entry.to_string())
                    } else {
                        RawBuildInput::Path(paths.resolve_source_path(entry))
                    }
                })
                .collect(),
        })
        .collect();

    if dev && !configs.iter().any(|c| c.name == SYSTEM_BUILD_NAME) {
        configs.insert(0, system_build_config());
    }

    configs
}

fn system_build_config() -> RawBuildConfig {
    RawBuildConfig {
        name: SYSTEM_BUILD_NAME.to_string(),
        platform: Platform::Node.as_str().to_string(),
        input: SYSTEM_BUILD_INPUTS
            .iter()
            .map(|p| RawBuildInput::Pattern(p.to_string()))
            .collect(),
    }
}

/// Check a normalized set of build configs. Returns the first violation.
pub fn validate(
    configs: &[RawBuildConfig],
    dev: bool,
    fs: &dyn FileSystem,
) -> std::result::Result<(), BuildConfigError> {
    validate_names(configs)?;
    validate_system_config(configs, dev)?;
    validate_unique_names(configs)?;
    validate_platforms(configs)?;
    validate_patterns(configs)?;
    validate_input_paths(configs, fs)?;
    Ok(())
}

fn validate_names(configs: &[RawBuildConfig]) -> std::result::Result<(), BuildConfigError> {
    for config in configs {
        let reason = if config.name.is_empty() {
            Some("must not be empty")
        } else if config.name.contains(['/', '\\']) {
            Some("must not contain path separators")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(BuildConfigError::InvalidName {
                name: config.name.clone(),
                reason: reason.to_string(),
            });
        }
        if RESERVED_BUILD_NAMES.contains(&config.name.as_str()) {
            return Err(BuildConfigError::ReservedName(config.name.clone()));
        }
    }
    Ok(())
}

fn validate_system_config(
    configs: &[RawBuildConfig],
    dev: bool,
) -> std::result::Result<(), BuildConfigError> {
    if !dev && configs.iter().any(|c| c.name == SYSTEM_BUILD_NAME) {
        return Err(BuildConfigError::SystemConfigInProd(
            SYSTEM_BUILD_NAME.to_string(),
        ));
    }
    Ok(())
}

fn validate_unique_names(configs: &[RawBuildConfig]) -> std::result::Result<(), BuildConfigError> {
    let mut seen = HashSet::new();
    for config in configs {
        if !seen.insert(config.name.as_str()) {
            return Err(BuildConfigError::DuplicateName(config.name.clone()));
        }
    }
    Ok(())
}

fn validate_platforms(configs: &[RawBuildConfig]) -> std::result::Result<(), BuildConfigError> {
    for config in configs {
        if config.platform.parse::<Platform>().is_err() {
            return Err(BuildConfigError::InvalidPlatform {
                name: config.name.clone(),
                platform: config.platform.clone(),
            });
        }
    }
    Ok(())
}

fn validate_patterns(configs: &[RawBuildConfig]) -> std::result::Result<(), BuildConfigError> {
    for config in configs {
        for input in &config.input {
            if let RawBuildInput::Pattern(pattern) = input {
                if let Err(e) = globset::Glob::new(pattern) {
                    return Err(BuildConfigError::InvalidPattern {
                        name: config.name.clone(),
                        pattern: pattern.clone(),
                        reason: e.kind().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_input_paths(
    configs: &[RawBuildConfig],
    fs: &dyn FileSystem,
) -> std::result::Result<(), BuildConfigError> {
    for config in configs {
        for input in &config.input {
            if let RawBuildInput::Path(path) = input {
                if !fs.exists(Path::new(path)) {
                    return Err(BuildConfigError::MissingInput {
                        name: config.name.clone(),
                        path: path.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

impl TryFrom<RawBuildConfig> for BuildConfig {
    type Error = BuildConfigError;

    fn try_from(raw: RawBuildConfig) -> std::result::Result<Self, Self::Error> {
        let platform = raw
            .platform
            .parse::<Platform>()
            .map_err(|_| BuildConfigError::InvalidPlatform {
                name: raw.name.clone(),
                platform: raw.platform.clone(),
            })?;

        let mut input = Vec::new();
        let mut patterns = Vec::new();
        for entry in raw.input {
            match entry {
                RawBuildInput::Path(path) => input.push(BuildConfigInput::Path(path)),
                RawBuildInput::Pattern(pattern) => patterns.push(pattern),
            }
        }
        if !patterns.is_empty() {
            let filter =
                InputFilter::new(&patterns).map_err(|e| BuildConfigError::InvalidPattern {
                    name: raw.name.clone(),
                    pattern: e.glob().unwrap_or_default().to_string(),
                    reason: e.kind().to_string(),
                })?;
            input.push(BuildConfigInput::Filter(filter));
        }

        Ok(BuildConfig::new(&raw.name, platform, input))
    }
}

/// Normalize, validate and compile a set of build configs.
pub fn load_build_configs(
    partials: &[BuildConfigPartial],
    dev: bool,
    paths: &Paths,
    fs: &dyn FileSystem,
) -> std::result::Result<Vec<Arc<BuildConfig>>, BuildConfigError> {
    let configs = normalize(partials, dev, paths);
    validate(&configs, dev, fs)?;

    let configs = configs
        .into_iter()
        .map(|raw| BuildConfig::try_from(raw).map(Arc::new))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(
        names = ?configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        "loaded build configs"
    );
    Ok(configs)
}

fn validate_filer_section(filer: &FilerSection) -> Result<()> {
    if filer.max_concurrency == 0 {
        return Err(FilerError::ConfigError(
            "[filer].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    for ext in &filer.copy_extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(FilerError::ConfigError(format!(
                "[filer].copy_extensions entries must look like \".ext\" (got '{ext}')"
            )));
        }
    }
    Ok(())
}

impl ConfigFile {
    /// Validate a raw config whose relative paths are anchored at `root`.
    pub fn from_raw(raw: RawConfigFile, root: &Path, fs: &dyn FileSystem) -> Result<Self> {
        validate_filer_section(&raw.filer)?;

        let paths = Paths::with_source_dir(root, &raw.filer.source_dir);
        let build_configs = load_build_configs(&raw.build, raw.filer.dev, &paths, fs)?;

        Ok(ConfigFile {
            root: root.to_path_buf(),
            paths,
            filer: raw.filer,
            build_configs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn project() -> (Paths, MockFileSystem) {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/index.ts", "export {};");
        (Paths::new("/p"), fs)
    }

    fn check(partials: &[BuildConfigPartial], dev: bool) -> std::result::Result<(), BuildConfigError> {
        let (paths, fs) = project();
        validate(&normalize(partials, dev, &paths), dev, &fs)
    }

    #[test]
    fn normalize_prepends_system_config_in_dev() {
        let paths = Paths::new("/p");
        let partials = [BuildConfigPartial::new("browser", "browser", &["index.ts"])];

        let dev = normalize(&partials, true, &paths);
        assert_eq!(dev.len(), 2);
        assert_eq!(dev[0].name, SYSTEM_BUILD_NAME);
        assert_eq!(dev[1].name, "browser");
        assert_eq!(dev[1].input, vec![RawBuildInput::Path("/p/src/index.ts".into())]);

        let prod = normalize(&partials, false, &paths);
        assert_eq!(prod.len(), 1);
    }

    #[test]
    fn normalize_keeps_user_system_config() {
        let paths = Paths::new("/p");
        let partials = [
            BuildConfigPartial::new("a", "node", &["**/*.ts"]),
            BuildConfigPartial::new(SYSTEM_BUILD_NAME, "node", &["x.ts"]),
        ];
        let configs = normalize(&partials, true, &paths);
        let names: Vec<_> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", SYSTEM_BUILD_NAME]);
        assert_eq!(configs[0].input, vec![RawBuildInput::Pattern("**/*.ts".into())]);
    }

    #[test]
    fn valid_configs_pass() {
        let partials = [
            BuildConfigPartial::new("browser", "browser", &["index.ts"]),
            BuildConfigPartial::new("node", "node", &["**/*.server.ts"]),
        ];
        assert_eq!(check(&partials, true), Ok(()));
        assert_eq!(check(&partials, false), Ok(()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let partials = [
            BuildConfigPartial::new("a", "node", &["index.ts"]),
            BuildConfigPartial::new("a", "browser", &["index.ts"]),
        ];
        assert_eq!(
            check(&partials, true),
            Err(BuildConfigError::DuplicateName("a".into()))
        );
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let partials = [BuildConfigPartial::new("a", "deno", &["index.ts"])];
        assert_eq!(
            check(&partials, true),
            Err(BuildConfigError::InvalidPlatform {
                name: "a".into(),
                platform: "deno".into()
            })
        );
    }

    #[test]
    fn reserved_and_invalid_names_are_rejected() {
        let reserved = [BuildConfigPartial::new("config", "node", &["index.ts"])];
        assert_eq!(
            check(&reserved, true),
            Err(BuildConfigError::ReservedName("config".into()))
        );

        let slash = [BuildConfigPartial::new("a/b", "node", &["index.ts"])];
        assert!(matches!(
            check(&slash, true),
            Err(BuildConfigError::InvalidName { .. })
        ));

        let empty = [BuildConfigPartial::new("", "node", &["index.ts"])];
        assert!(matches!(
            check(&empty, true),
            Err(BuildConfigError::InvalidName { .. })
        ));
    }

    #[test]
    fn system_config_only_in_dev() {
        let partials = [BuildConfigPartial::new(SYSTEM_BUILD_NAME, "node", &["index.ts"])];
        assert_eq!(check(&partials, true), Ok(()));
        assert_eq!(
            check(&partials, false),
            Err(BuildConfigError::SystemConfigInProd(SYSTEM_BUILD_NAME.into()))
        );
    }

    #[test]
    fn missing_literal_input_is_rejected() {
        let partials = [BuildConfigPartial::new("a", "node", &["missing.ts"])];
        assert_eq!(
            check(&partials, true),
            Err(BuildConfigError::MissingInput {
                name: "a".into(),
                path: "/p/src/missing.ts".into()
            })
        );
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let partials = [BuildConfigPartial::new("a", "node", &["lib/[a.ts"])];
        assert!(matches!(
            check(&partials, true),
            Err(BuildConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn load_build_configs_compiles_inputs() {
        let (paths, fs) = project();
        let partials = [BuildConfigPartial::new(
            "browser",
            "browser",
            &["index.ts", "**/*.worker.ts"],
        )];

        let configs = load_build_configs(&partials, false, &paths, &fs).unwrap();
        assert_eq!(configs.len(), 1);
        let browser = &configs[0];
        assert_eq!(browser.platform, Platform::Browser);
        assert!(browser.matches("/p/src/index.ts", &paths));
        assert!(browser.matches("/p/src/lib/a.worker.ts", &paths));
        assert!(!browser.matches("/p/src/lib/a.ts", &paths));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let (_, fs) = project();
        let mut raw = RawConfigFile::default();
        raw.filer.max_concurrency = 0;
        let err = ConfigFile::from_raw(raw, Path::new("/p"), &fs).unwrap_err();
        assert!(matches!(err, FilerError::ConfigError(_)));
    }
}
