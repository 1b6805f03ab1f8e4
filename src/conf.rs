//! Bridge configuration.
//!
//! [`BridgeConfig`] is the single host-supplied settings surface: database
//! settings per alias, model include/exclude patterns, engine-map overrides,
//! and per-alias pool overrides. Defaults mirror the owning ORM's settings
//! conventions; any key the host leaves out falls back to its default.

use crate::error::{BridgeError, BridgeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connection settings for a single database alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
	/// Owning-ORM backend identifier (e.g. `postgresql`, `mysql`, `sqlite3`).
	pub engine: String,
	/// Database name, or file path for sqlite (`:memory:` supported).
	pub name: String,
	#[serde(default)]
	pub user: String,
	#[serde(default)]
	pub password: String,
	#[serde(default = "default_host")]
	pub host: String,
	/// `None` picks the backend's conventional port.
	#[serde(default)]
	pub port: Option<u16>,
}

fn default_host() -> String {
	"localhost".to_string()
}

impl DatabaseSettings {
	pub fn new(engine: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			engine: engine.into(),
			name: name.into(),
			user: String::new(),
			password: String::new(),
			host: default_host(),
			port: None,
		}
	}

	/// Settings for an in-memory sqlite database.
	pub fn sqlite_memory() -> Self {
		Self::new("sqlite3", ":memory:")
	}

	pub fn with_user(mut self, user: impl Into<String>) -> Self {
		self.user = user.into();
		self
	}

	pub fn with_password(mut self, password: impl Into<String>) -> Self {
		self.password = password.into();
		self
	}

	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = host.into();
		self
	}

	pub fn with_port(mut self, port: u16) -> Self {
		self.port = Some(port);
		self
	}
}

/// Pool sizing and timeouts for one alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
	pub min_connections: u32,
	pub max_connections: u32,
	/// Timeout for acquiring a connection, in seconds.
	pub acquire_timeout_secs: u64,
	/// Maximum idle time before a connection is closed (None = no limit).
	pub idle_timeout_secs: Option<u64>,
	/// Maximum lifetime of a connection (None = no limit).
	pub max_lifetime_secs: Option<u64>,
}

impl Default for PoolSettings {
	fn default() -> Self {
		Self {
			min_connections: 1,
			max_connections: 10,
			acquire_timeout_secs: 30,
			idle_timeout_secs: Some(600),
			max_lifetime_secs: Some(1800),
		}
	}
}

impl PoolSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_connections(mut self, min: u32, max: u32) -> Self {
		self.min_connections = min;
		self.max_connections = max;
		self
	}

	pub fn with_acquire_timeout(mut self, secs: u64) -> Self {
		self.acquire_timeout_secs = secs;
		self
	}

	pub fn validate(&self) -> BridgeResult<()> {
		if self.max_connections < self.min_connections {
			return Err(BridgeError::Configuration(
				"max_connections must be >= min_connections".to_string(),
			));
		}
		Ok(())
	}
}

/// Top-level bridge settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
	/// Database settings keyed by alias; `default` is the conventional alias.
	pub databases: IndexMap<String, DatabaseSettings>,
	/// Shell-glob patterns over `app_label.ModelName`. `None` includes all.
	pub include_models: Option<Vec<String>>,
	/// Shell-glob patterns over `app_label.ModelName`. `None` excludes none.
	pub exclude_models: Option<Vec<String>>,
	/// Owning-backend → async-scheme overrides, merged over the built-in map.
	pub db_engine_map: HashMap<String, String>,
	/// Per-alias pool overrides; aliases not listed use [`PoolSettings::default`].
	pub connection_pool: HashMap<String, PoolSettings>,
}

impl BridgeConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_database(mut self, alias: impl Into<String>, settings: DatabaseSettings) -> Self {
		self.databases.insert(alias.into(), settings);
		self
	}

	pub fn with_include_models<I, S>(mut self, patterns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.include_models = Some(patterns.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_exclude_models<I, S>(mut self, patterns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.exclude_models = Some(patterns.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_engine_mapping(
		mut self,
		engine: impl Into<String>,
		scheme: impl Into<String>,
	) -> Self {
		self.db_engine_map.insert(engine.into(), scheme.into());
		self
	}

	pub fn with_pool_settings(mut self, alias: impl Into<String>, pool: PoolSettings) -> Self {
		self.connection_pool.insert(alias.into(), pool);
		self
	}

	/// Pool settings for an alias, falling back to the defaults.
	pub fn pool_for(&self, alias: &str) -> PoolSettings {
		self.connection_pool.get(alias).cloned().unwrap_or_default()
	}

	/// Parse a TOML settings document.
	pub fn from_toml_str(input: &str) -> BridgeResult<Self> {
		let config: Self = toml::from_str(input)
			.map_err(|e| BridgeError::Configuration(format!("invalid settings TOML: {e}")))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> BridgeResult<()> {
		for (alias, pool) in &self.connection_pool {
			pool.validate().map_err(|e| {
				BridgeError::Configuration(format!("pool settings for alias '{alias}': {e}"))
			})?;
		}
		Ok(())
	}
}
