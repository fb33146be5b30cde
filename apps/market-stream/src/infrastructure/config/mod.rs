//! Configuration Module
//!
//! Stream configuration and credential lookup.

mod settings;

pub use settings::{
    API_KEY_ENV, CONFIG_PATH_ENV, ConfigError, CredentialLookup, DEFAULT_ENDPOINT, FileSettings,
    StreamConfig, default_config_path,
};
