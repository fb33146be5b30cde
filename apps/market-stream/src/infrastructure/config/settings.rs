//! Stream Configuration Settings
//!
//! Connection intent for one stream, plus credential lookup from the
//! environment and the local config file.
//!
//! # Credential Lookup Order
//!
//! 1. Explicit value (command line flag)
//! 2. `MASSIVE_API_KEY` environment variable (a `.env` file is loaded first)
//! 3. `api_key` in the config file (`MARKET_STREAM_CONFIG`, or
//!    `$HOME/.config/market-stream/config.toml`)

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::application::ports::CredentialSource;
use crate::domain::subscription::{AssetClass, Channel, SubscriptionError, SymbolSelection};
use crate::infrastructure::stream::auth::{AuthError, AuthStyle, Credential};

/// Production streaming endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://socket.massive.com";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "MASSIVE_API_KEY";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "MARKET_STREAM_CONFIG";

// =============================================================================
// Errors
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No credential in any source.
    #[error(
        "no API key found: pass --api-key, set {API_KEY_ENV}, or add api_key to the config file"
    )]
    MissingCredential,

    /// Credential was present but unusable.
    #[error("invalid credential: {0}")]
    Credential(#[from] AuthError),

    /// Asset class, channel or symbol selection is invalid.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Config file could not be read or parsed.
    #[error("config file error: {0}")]
    File(#[from] config::ConfigError),
}

// =============================================================================
// Stream Configuration
// =============================================================================

/// Immutable connection intent for one stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    credential: Credential,
    endpoint: String,
    asset_class: AssetClass,
    channel: Channel,
    symbols: SymbolSelection,
    auth_style: AuthStyle,
}

impl StreamConfig {
    /// Create a configuration against the default endpoint.
    ///
    /// The channel is validated against the asset class and the auth style
    /// is resolved from the lookup table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Subscription` if the asset class does not
    /// offer the channel.
    pub fn new(
        credential: Credential,
        asset_class: AssetClass,
        channel: &str,
        symbols: SymbolSelection,
    ) -> Result<Self, ConfigError> {
        let channel = asset_class.channel(channel)?;
        Ok(Self {
            credential,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            asset_class,
            channel,
            auth_style: AuthStyle::resolve(asset_class, &channel),
            symbols,
        })
    }

    /// Use a different endpoint. An empty value keeps the default.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the auth style from the lookup table.
    #[must_use]
    pub const fn with_auth_style(mut self, auth_style: AuthStyle) -> Self {
        self.auth_style = auth_style;
        self
    }

    /// Effective endpoint, without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint
        }
    }

    /// Credential used for authentication.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Asset class of the stream.
    #[must_use]
    pub const fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    /// Channel of the stream.
    #[must_use]
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Symbols subscribed at connect time.
    #[must_use]
    pub const fn symbols(&self) -> &SymbolSelection {
        &self.symbols
    }

    /// Authentication style for the connection.
    #[must_use]
    pub const fn auth_style(&self) -> AuthStyle {
        self.auth_style
    }

    /// Connection URL: `<endpoint>/<asset_class>/<channel>`, plus
    /// `?apiKey=<credential>` for the query credential style.
    #[must_use]
    pub fn connection_url(&self) -> String {
        self.url_with_key(self.credential.expose())
    }

    /// Connection URL safe for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        self.url_with_key("[REDACTED]")
    }

    fn url_with_key(&self, key: &str) -> String {
        let base = format!(
            "{}/{}/{}",
            self.endpoint(),
            self.asset_class.as_str(),
            self.channel.code()
        );
        match self.auth_style {
            AuthStyle::QueryCredential => format!("{base}?apiKey={key}"),
            AuthStyle::ChallengeAccept => base,
        }
    }
}

// =============================================================================
// Credential Lookup
// =============================================================================

/// Keys read from the local config file.
#[derive(Debug, Default, Deserialize)]
pub struct FileSettings {
    /// API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Streaming endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl FileSettings {
    /// Load settings from `path`. A missing file yields empty settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but can not be parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Default config file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("market-stream")
            .join("config.toml")
    })
}

/// Credential lookup across flag, environment and config file.
#[derive(Debug, Clone, Default)]
pub struct CredentialLookup {
    explicit: Option<String>,
    env_var: Option<String>,
    config_path: Option<PathBuf>,
}

impl CredentialLookup {
    /// Lookup reading `MASSIVE_API_KEY` and the default config file.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            explicit: None,
            env_var: Some(API_KEY_ENV.to_string()),
            config_path: default_config_path(),
        }
    }

    /// Prefer an explicit value over every other source.
    #[must_use]
    pub fn with_explicit(mut self, value: Option<String>) -> Self {
        self.explicit = value;
        self
    }

    /// Read the config file from `path` instead.
    #[must_use]
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read a different environment variable, or none.
    #[must_use]
    pub fn with_env_var(mut self, name: Option<String>) -> Self {
        self.env_var = name;
        self
    }
}

impl CredentialSource for CredentialLookup {
    fn credential(&self) -> Result<Credential, ConfigError> {
        if let Some(value) = non_empty(self.explicit.as_deref()) {
            return Ok(Credential::new(value)?);
        }

        if let Some(name) = &self.env_var
            && let Ok(value) = std::env::var(name)
            && let Some(value) = non_empty(Some(value.as_str()))
        {
            tracing::debug!(source = %name, "Using API key from environment");
            return Ok(Credential::new(value)?);
        }

        if let Some(path) = &self.config_path {
            let file = FileSettings::load(path)?;
            if let Some(value) = non_empty(file.api_key.as_deref()) {
                tracing::debug!(path = %path.display(), "Using API key from config file");
                return Ok(Credential::new(value)?);
            }
        }

        Err(ConfigError::MissingCredential)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn credential() -> Credential {
        Credential::new("key123").unwrap()
    }

    fn symbols(list: &[&str]) -> SymbolSelection {
        SymbolSelection::parse(list).unwrap()
    }

    #[test]
    fn options_quote_url_path() {
        let config =
            StreamConfig::new(credential(), AssetClass::Options, "Q", symbols(&["*"])).unwrap();
        assert_eq!(config.connection_url(), "wss://socket.massive.com/options/Q");
        assert!(config.connection_url().ends_with("/options/Q"));
    }

    #[test]
    fn query_credential_url() {
        let config = StreamConfig::new(credential(), AssetClass::Stocks, "FMV", symbols(&["AAPL"]))
            .unwrap()
            .with_endpoint("wss://business.example.com/");
        assert_eq!(
            config.connection_url(),
            "wss://business.example.com/stocks/FMV?apiKey=key123"
        );
        assert_eq!(
            config.redacted_url(),
            "wss://business.example.com/stocks/FMV?apiKey=[REDACTED]"
        );
    }

    #[test]
    fn empty_endpoint_falls_back() {
        let config = StreamConfig::new(credential(), AssetClass::Crypto, "XT", symbols(&["*"]))
            .unwrap()
            .with_endpoint("  ");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn auth_style_override() {
        let config = StreamConfig::new(credential(), AssetClass::Stocks, "T", symbols(&["MSFT"]))
            .unwrap()
            .with_auth_style(AuthStyle::QueryCredential);
        assert!(config.connection_url().contains("?apiKey="));
    }

    #[test]
    fn unsupported_channel_is_config_error() {
        let result = StreamConfig::new(credential(), AssetClass::Indices, "Q", symbols(&["*"]));
        assert!(matches!(result, Err(ConfigError::Subscription(_))));
    }

    #[test]
    fn explicit_credential_wins() {
        let lookup = CredentialLookup::default().with_explicit(Some(" flag-key ".to_string()));
        assert_eq!(lookup.credential().unwrap().expose(), "flag-key");
    }

    #[test]
    fn credential_from_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "api_key = \"file-key\"").unwrap();

        let lookup = CredentialLookup::default()
            .with_env_var(None)
            .with_config_path(Some(file.path().to_path_buf()));
        assert_eq!(lookup.credential().unwrap().expose(), "file-key");
    }

    #[test]
    fn missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = CredentialLookup::default()
            .with_env_var(None)
            .with_config_path(Some(dir.path().join("absent.toml")));
        assert!(matches!(
            lookup.credential(),
            Err(ConfigError::MissingCredential)
        ));
    }

    #[test]
    fn file_settings_reads_endpoint() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "endpoint = \"wss://delayed.example.com\"").unwrap();

        let settings = FileSettings::load(file.path()).unwrap();
        assert_eq!(settings.endpoint.as_deref(), Some("wss://delayed.example.com"));
        assert!(settings.api_key.is_none());
    }
}
