//! Storage for configuration and runtime settings.

pub mod config;
pub mod paths;
pub mod settings_store;

pub use config::{
    Config, ConfigOverrides, ConfigSource, ConfigSources, Endpoints, ResolvedConfig, ENV_BIND,
    ENV_CONFIG, ENV_PUBLIC_URL, ENV_SETTINGS_FILE, ENV_TIMEOUT,
};
pub use paths::AppPaths;
pub use settings_store::{JsonFileStore, MemoryStore, SettingsStore, StoreHandle, keys};
