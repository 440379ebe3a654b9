// src/config/mod.rs

//! Build configs and the `filer.toml` configuration file.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{
    BuildConfig, BuildConfigInput, BuildConfigPartial, ConfigFile, FilerSection, InputFilter,
    InputSpec, Platform, RawBuildConfig, RawBuildInput, RawConfigFile, SYSTEM_BUILD_NAME,
};
pub use validate::{load_build_configs, normalize, validate};
