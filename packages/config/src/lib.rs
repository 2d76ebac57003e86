#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Run configuration for group scout.
//!
//! A single TOML file describes where to search (`[[locations]]`), what to
//! search for (`search_keys`, `radius`), how fast to talk to the remote API
//! (`api_rate_limit`, `max_retries`), which filters to apply (`[filters.*]`)
//! and which outputs to produce (`[output]`).
//!
//! ```toml
//! search_keys = ["hiking", "walking"]
//! radius = 25
//! api_rate_limit = 1.0
//!
//! [geocoder]
//! username = "demo"
//!
//! [[locations]]
//! country = "GB"
//! cities = ["London", "Manchester"]
//!
//! [filters.member]
//! enabled = true
//! min_members = 50
//! ```
//!
//! [`Settings::load`] validates everything before any remote call is made.

pub mod filters;

use std::path::{Path, PathBuf};

use group_scout_group_models::Location;
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

pub use filters::{FilterConfig, MAX_PERIOD_MONTHS, PeriodWindow};

use crate::filters::FilterSection;

/// Longest accepted pause between remote calls, in seconds.
pub const MAX_RATE_LIMIT_SECS: f64 = 3600.0;

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Could not read config file {}: {source}", .path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected shape.
    #[error("Config file {} is not valid: {source}", .path.display())]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Parser diagnostic, including line and column.
        source: toml::de::Error,
    },

    /// A setting has an unusable value.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong with the setting.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// How duplicate groups are detected in the final result set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DedupePolicy {
    /// Two groups are duplicates when every attribute is equal.
    #[default]
    Structural,
    /// Two groups are duplicates when their ids are equal.
    Id,
}

/// Output formats produced at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputKind {
    /// Aligned text table printed to stdout.
    Table,
    /// CSV file written to `output.csv_path`.
    Csv,
}

/// One `[[locations]]` entry: a country and the cities to search in it.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryLocations {
    pub country: String,
    pub cities: Vec<String>,
}

/// `[remote]`: the group discovery API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// GraphQL endpoint.
    pub base_api_url: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Records requested per page for paginated queries.
    pub page_size: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_api_url: "https://api.meetup.com/gql".to_string(),
            token_env: "GROUP_SCOUT_TOKEN".to_string(),
            page_size: 50,
            timeout_secs: 30,
        }
    }
}

/// `[geocoder]`: city to coordinate lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderSettings {
    /// GeoNames `searchJSON` endpoint.
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    /// GeoNames account name.
    pub username: String,
}

fn default_geocoder_url() -> String {
    "http://api.geonames.org/searchJSON".to_string()
}

/// `[output]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub types: Vec<OutputKind>,
    pub csv_path: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            types: vec![OutputKind::Table],
            csv_path: None,
        }
    }
}

/// A complete run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Keywords OR'd together for the remote search and used by the name
    /// filter.
    pub search_keys: Vec<String>,
    /// Search radius around each location, in miles.
    pub radius: u32,
    /// Seconds to wait after every quota-consuming remote call.
    pub api_rate_limit: f64,
    /// Extra attempts for transient HTTP failures before giving up.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub dedupe: DedupePolicy,
    /// Overrides the default `<config>.store.json` group store location.
    #[serde(default)]
    pub datastore: Option<PathBuf>,
    pub locations: Vec<CountryLocations>,
    #[serde(default)]
    pub remote: RemoteSettings,
    pub geocoder: GeocoderSettings,
    #[serde(default)]
    filters: FilterSection,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(skip)]
    filter_config: FilterConfig,
}

impl Settings {
    /// Reads, parses, and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::parse(&contents, path)?;
        log::debug!(
            "Loaded config {}: {} location(s), filters [{}]",
            path.display(),
            settings.locations().len(),
            settings.filters().enabled_names().join(", ")
        );
        Ok(settings)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or fails
    /// validation.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, Path::new("<inline>"))
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut settings: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        settings.filter_config = settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<FilterConfig, ConfigError> {
        if self.search_keys.is_empty() {
            return Err(ConfigError::invalid("search_keys must not be empty"));
        }
        if self.search_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid("search_keys must not contain blanks"));
        }
        if self.radius == 0 {
            return Err(ConfigError::invalid("radius must be greater than zero"));
        }
        if !(0.0..=MAX_RATE_LIMIT_SECS).contains(&self.api_rate_limit) {
            return Err(ConfigError::invalid(format!(
                "api_rate_limit must be between 0 and {MAX_RATE_LIMIT_SECS} seconds, got {}",
                self.api_rate_limit
            )));
        }
        if self.locations.iter().all(|l| l.cities.is_empty()) {
            return Err(ConfigError::invalid(
                "locations must list at least one city",
            ));
        }
        if self.geocoder.username.trim().is_empty() {
            return Err(ConfigError::invalid("geocoder.username must not be empty"));
        }
        if self.remote.page_size == 0 {
            return Err(ConfigError::invalid("remote.page_size must be at least 1"));
        }
        if self.output.types.contains(&OutputKind::Csv) && self.output.csv_path.is_none() {
            return Err(ConfigError::invalid(
                "output.csv_path is required when csv output is selected",
            ));
        }
        self.filters.validate()
    }

    /// Validated filter settings.
    #[must_use]
    pub const fn filters(&self) -> &FilterConfig {
        &self.filter_config
    }

    /// Flattens `[[locations]]` into `(city, country)` pairs in file order.
    ///
    /// A city name listed under two countries yields two locations.
    #[must_use]
    pub fn locations(&self) -> Vec<Location> {
        self.locations
            .iter()
            .flat_map(|entry| {
                entry
                    .cities
                    .iter()
                    .map(move |city| Location::new(city.clone(), entry.country.clone()))
            })
            .collect()
    }

    /// Where the group store for this configuration lives.
    ///
    /// Uses `datastore` if set, otherwise `<config_path>.store.json`.
    #[must_use]
    pub fn datastore_path(&self, config_path: &Path) -> PathBuf {
        self.datastore.clone().unwrap_or_else(|| {
            let mut name = config_path.as_os_str().to_os_string();
            name.push(".store.json");
            PathBuf::from(name)
        })
    }
}
