//! Connection lifecycle management.
//!
//! Translates the owning ORM's database settings into sqlx `AnyPool`s, one
//! per alias in active use, behind a small state machine:
//!
//! ```text
//! UNINITIALIZED -> INITIALIZING -> READY -> CLOSED
//! ```
//!
//! `init` and `close` are idempotent; concurrent first queries coordinate
//! through a single-flight guard so the pools open exactly once, and a
//! cancelled in-flight `init` rolls the state back to UNINITIALIZED so the
//! next caller retries cleanly. Querying after `close` lazily re-initializes.

use crate::conf::{BridgeConfig, PoolSettings};
use crate::error::{BridgeError, BridgeResult};
use parking_lot::RwLock;
use sqlx::pool::PoolOptions;
use sqlx::{Any, AnyPool};
use std::collections::{HashMap, HashSet};
use std::sync::Once;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Built-in owning-backend identifier to URL-scheme map; config overrides
/// merge over it.
const DEFAULT_ENGINE_MAP: &[(&str, &str)] = &[
	("postgresql", "postgres"),
	("mysql", "mysql"),
	("sqlite3", "sqlite"),
];

/// URL scheme family of one alias, driving SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
	Sqlite,
	Postgres,
	MySql,
}

impl Backend {
	fn from_scheme(scheme: &str) -> Option<Self> {
		match scheme {
			"sqlite" => Some(Self::Sqlite),
			"postgres" => Some(Self::Postgres),
			"mysql" => Some(Self::MySql),
			_ => None,
		}
	}

	/// Whether `INSERT ... RETURNING` works on this backend.
	pub fn supports_returning(&self) -> bool {
		!matches!(self, Self::MySql)
	}
}

/// Everything needed to open one alias's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPlan {
	pub alias: String,
	pub backend: Backend,
	pub url: String,
	pub pool: PoolSettings,
}

/// Resolve the connection plan for the aliases actually in use.
///
/// Pure with respect to I/O, so translation failures surface before any
/// pool is touched. An alias used by a bridged model but missing from the
/// settings, or whose engine has no mapping, is fatal.
pub fn build_connection_plan(
	config: &BridgeConfig,
	active_aliases: &HashSet<String>,
) -> BridgeResult<Vec<ConnectionPlan>> {
	let mut plans = Vec::with_capacity(active_aliases.len());
	// Deterministic order: follow the settings file, then filter.
	for (alias, settings) in &config.databases {
		if !active_aliases.contains(alias) {
			continue;
		}
		let scheme = config
			.db_engine_map
			.get(&settings.engine)
			.map(String::as_str)
			.or_else(|| {
				DEFAULT_ENGINE_MAP
					.iter()
					.find(|(engine, _)| *engine == settings.engine)
					.map(|(_, scheme)| *scheme)
			})
			.ok_or_else(|| BridgeError::UnsupportedBackend {
				engine: settings.engine.clone(),
				alias: alias.clone(),
			})?;
		let backend =
			Backend::from_scheme(scheme).ok_or_else(|| BridgeError::UnsupportedBackend {
				engine: settings.engine.clone(),
				alias: alias.clone(),
			})?;

		let url = match backend {
			Backend::Sqlite => {
				if settings.name == ":memory:" {
					"sqlite::memory:".to_string()
				} else {
					format!("sqlite://{}?mode=rwc", settings.name)
				}
			}
			Backend::Postgres | Backend::MySql => {
				let port = settings.port.unwrap_or(match backend {
					Backend::Postgres => 5432,
					_ => 3306,
				});
				format!(
					"{}://{}:{}@{}:{}/{}",
					scheme, settings.user, settings.password, settings.host, port, settings.name
				)
			}
		};

		plans.push(ConnectionPlan {
			alias: alias.clone(),
			backend,
			url,
			pool: config.pool_for(alias),
		});
	}

	for alias in active_aliases {
		if !config.databases.contains_key(alias) {
			return Err(BridgeError::UnknownAlias(alias.clone()));
		}
	}

	Ok(plans)
}

/// Password-masked URL for log output.
pub fn mask_url_password(url: &str) -> String {
	if let Some(scheme_end) = url.find("://") {
		let rest = &url[scheme_end + 3..];
		if let Some(at) = rest.find('@') {
			let credentials = &rest[..at];
			if let Some(colon) = credentials.find(':') {
				return format!(
					"{}{}:****{}",
					&url[..scheme_end + 3],
					&credentials[..colon],
					&rest[at..]
				);
			}
		}
	}
	url.to_string()
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Ready,
	Closed,
}

static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
	INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Rolls state back to UNINITIALIZED when an in-flight init is dropped
/// before completing.
struct InitGuard<'a> {
	state: &'a AtomicU8,
	armed: bool,
}

impl Drop for InitGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.state.store(STATE_UNINITIALIZED, Ordering::SeqCst);
		}
	}
}

/// Pool manager for all aliases in active use.
pub struct ConnectionLifecycle {
	config: BridgeConfig,
	active_aliases: HashSet<String>,
	state: AtomicU8,
	init_lock: Mutex<()>,
	pools: RwLock<HashMap<String, AnyPool>>,
	backends: RwLock<HashMap<String, Backend>>,
}

impl ConnectionLifecycle {
	pub fn new(config: BridgeConfig, active_aliases: HashSet<String>) -> Self {
		Self {
			config,
			active_aliases,
			state: AtomicU8::new(STATE_UNINITIALIZED),
			init_lock: Mutex::new(()),
			pools: RwLock::new(HashMap::new()),
			backends: RwLock::new(HashMap::new()),
		}
	}

	pub fn state(&self) -> LifecycleState {
		match self.state.load(Ordering::SeqCst) {
			STATE_INITIALIZING => LifecycleState::Initializing,
			STATE_READY => LifecycleState::Ready,
			STATE_CLOSED => LifecycleState::Closed,
			_ => LifecycleState::Uninitialized,
		}
	}

	pub fn is_ready(&self) -> bool {
		self.state.load(Ordering::SeqCst) == STATE_READY
	}

	/// Open all pools. Idempotent; concurrent callers coordinate through
	/// the init lock, and only the first one actually connects. The lock is
	/// never held across query traffic, only across the state transition.
	pub async fn init(&self) -> BridgeResult<()> {
		if self.is_ready() {
			return Ok(());
		}
		let _guard = self.init_lock.lock().await;
		if self.is_ready() {
			// Someone else finished while we waited.
			return Ok(());
		}

		self.state.store(STATE_INITIALIZING, Ordering::SeqCst);
		let mut rollback = InitGuard {
			state: &self.state,
			armed: true,
		};

		install_drivers();
		let plans = build_connection_plan(&self.config, &self.active_aliases)?;

		let mut pools = HashMap::with_capacity(plans.len());
		let mut backends = HashMap::with_capacity(plans.len());
		for plan in plans {
			tracing::debug!(
				alias = %plan.alias,
				url = %mask_url_password(&plan.url),
				"opening connection pool"
			);
			let pool = PoolOptions::<Any>::new()
				.min_connections(plan.pool.min_connections)
				.max_connections(plan.pool.max_connections)
				.acquire_timeout(Duration::from_secs(plan.pool.acquire_timeout_secs))
				.idle_timeout(plan.pool.idle_timeout_secs.map(Duration::from_secs))
				.max_lifetime(plan.pool.max_lifetime_secs.map(Duration::from_secs))
				.connect(&plan.url)
				.await?;
			pools.insert(plan.alias.clone(), pool);
			backends.insert(plan.alias, plan.backend);
		}

		*self.pools.write() = pools;
		*self.backends.write() = backends;
		rollback.armed = false;
		self.state.store(STATE_READY, Ordering::SeqCst);
		tracing::info!(aliases = self.active_aliases.len(), "connection lifecycle ready");
		Ok(())
	}

	/// Drain and close all pools. Idempotent; a no-op unless READY.
	pub async fn close(&self) {
		if !self.is_ready() {
			return;
		}
		let _guard = self.init_lock.lock().await;
		if !self.is_ready() {
			return;
		}

		let pools: Vec<AnyPool> = self.pools.write().drain().map(|(_, pool)| pool).collect();
		self.backends.write().clear();
		for pool in pools {
			pool.close().await;
		}
		self.state.store(STATE_CLOSED, Ordering::SeqCst);
		tracing::info!("connection lifecycle closed");
	}

	/// Lazy path used by the query manager: initialize on first use, and
	/// re-initialize after `close`.
	pub async fn ensure_ready(&self) -> BridgeResult<()> {
		if self.is_ready() {
			return Ok(());
		}
		self.init().await
	}

	/// Pool for an alias; only valid while READY.
	pub fn pool(&self, alias: &str) -> BridgeResult<AnyPool> {
		self.pools
			.read()
			.get(alias)
			.cloned()
			.ok_or_else(|| BridgeError::UnknownAlias(alias.to_string()))
	}

	pub fn backend(&self, alias: &str) -> BridgeResult<Backend> {
		self.backends
			.read()
			.get(alias)
			.copied()
			.ok_or_else(|| BridgeError::UnknownAlias(alias.to_string()))
	}
}

impl std::fmt::Debug for ConnectionLifecycle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionLifecycle")
			.field("state", &self.state())
			.field("active_aliases", &self.active_aliases)
			.finish()
	}
}
