//! Bridge facade.
//!
//! Ties the pieces together in the documented order: compile the filter,
//! introspect the owning registry, run the synthesis pass, then hand the
//! frozen registry to the connection lifecycle. Construction is synchronous
//! and infallible past configuration checks; all I/O waits for `init` (or
//! the first query, through the lazy path).

use crate::codegen;
use crate::conf::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::filter::ModelFilter;
use crate::introspect::{self, SynthesisReport};
use crate::lifecycle::{ConnectionLifecycle, LifecycleState};
use crate::manager::Objects;
use crate::meta::AppRegistry;
use crate::registry::BridgeRegistry;
use crate::spec::ModelSpec;
use crate::synth::SynthesizedModel;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Bridge {
	registry: Arc<BridgeRegistry>,
	lifecycle: Arc<ConnectionLifecycle>,
	handles: IndexMap<String, Arc<SynthesizedModel>>,
	specs: Vec<ModelSpec>,
}

impl Bridge {
	/// Build the bridge from settings and the owning ORM's registry.
	///
	/// Per-model problems are contained in the synthesis report; only
	/// configuration errors fail construction.
	pub fn new(config: BridgeConfig, app_registry: &AppRegistry) -> BridgeResult<Self> {
		config.validate()?;
		let filter = ModelFilter::from_config(&config)?;
		let (specs, report) = introspect::introspect(app_registry, &filter);
		let registry = BridgeRegistry::build(specs.clone(), report);

		let active_aliases: HashSet<String> = registry
			.models()
			.map(|m| m.database_alias.clone())
			.collect();
		let handles: IndexMap<String, Arc<SynthesizedModel>> = registry
			.models()
			.map(|m| (m.qualified_name.clone(), Arc::new(m.clone())))
			.collect();

		tracing::info!(
			bridged = registry.len(),
			skipped = registry.report().len(),
			"bridge registry built"
		);

		Ok(Self {
			registry: Arc::new(registry),
			lifecycle: Arc::new(ConnectionLifecycle::new(config, active_aliases)),
			handles,
			specs,
		})
	}

	/// Open connection pools for every alias in active use. Idempotent.
	pub async fn init(&self) -> BridgeResult<()> {
		self.lifecycle.init().await
	}

	/// Close all pools. Idempotent; a later query lazily re-initializes.
	pub async fn close(&self) {
		self.lifecycle.close().await;
	}

	pub fn state(&self) -> LifecycleState {
		self.lifecycle.state()
	}

	/// Query-manager handle for a bridged model.
	pub fn objects(&self, qualified_name: &str) -> BridgeResult<Objects> {
		let model = self
			.handles
			.get(qualified_name)
			.ok_or_else(|| BridgeError::UnknownModel(qualified_name.to_string()))?;
		Ok(Objects::new(Arc::clone(model), Arc::clone(&self.lifecycle)))
	}

	pub fn registry(&self) -> &BridgeRegistry {
		&self.registry
	}

	/// Raw pool access for an alias, as an escape hatch for operations the
	/// manager does not cover. Only valid while READY.
	pub fn pool(&self, alias: &str) -> BridgeResult<sqlx::AnyPool> {
		self.lifecycle.pool(alias)
	}

	/// Everything introspection and synthesis left out, and why.
	pub fn report(&self) -> &SynthesisReport {
		self.registry.report()
	}

	/// Static export: write one blueprint module per app for every model
	/// that survived the build, to `out_dir`.
	pub fn export_models(&self, out_dir: &Path) -> BridgeResult<Vec<PathBuf>> {
		let surviving: Vec<ModelSpec> = self
			.specs
			.iter()
			.filter(|s| self.registry.contains(&s.qualified_name))
			.cloned()
			.collect();
		codegen::write_models(&surviving, out_dir)
	}
}

impl std::fmt::Debug for Bridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bridge")
			.field("models", &self.registry.len())
			.field("state", &self.state())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conf::DatabaseSettings;
	use crate::meta::{FieldMeta, ModelMeta};

	fn owning_registry() -> AppRegistry {
		let mut registry = AppRegistry::new();
		registry.register_model(
			ModelMeta::new("blog", "Article", "blog_article")
				.with_field(FieldMeta::new("id", "BigAutoField").primary_key())
				.with_field(FieldMeta::new("title", "CharField").with_max_length(200)),
		);
		registry.register_model(
			ModelMeta::new("auth", "User", "auth_user")
				.with_field(FieldMeta::new("id", "BigAutoField").primary_key()),
		);
		registry
	}

	fn config() -> BridgeConfig {
		BridgeConfig::new().with_database("default", DatabaseSettings::sqlite_memory())
	}

	#[test]
	fn test_exclusion_scenario() {
		let bridge = Bridge::new(
			config().with_exclude_models(["auth.*"]),
			&owning_registry(),
		)
		.unwrap();

		assert!(bridge.registry().contains("blog.Article"));
		assert!(!bridge.registry().contains("auth.User"));
		assert!(matches!(
			bridge.objects("auth.User"),
			Err(BridgeError::UnknownModel(_))
		));
		assert!(bridge.objects("blog.Article").is_ok());
	}

	#[test]
	fn test_bad_pattern_fails_construction() {
		let result = Bridge::new(
			config().with_include_models(["blog.[Article"]),
			&owning_registry(),
		);
		assert!(matches!(result, Err(BridgeError::Configuration(_))));
	}

	#[tokio::test]
	async fn test_lifecycle_through_facade() {
		let bridge = Bridge::new(config(), &owning_registry()).unwrap();
		assert_eq!(bridge.state(), LifecycleState::Uninitialized);

		bridge.init().await.unwrap();
		assert_eq!(bridge.state(), LifecycleState::Ready);
		bridge.init().await.unwrap();

		bridge.close().await;
		assert_eq!(bridge.state(), LifecycleState::Closed);
		bridge.close().await;
		assert_eq!(bridge.state(), LifecycleState::Closed);
	}

	#[test]
	fn test_export_models() {
		let bridge = Bridge::new(config(), &owning_registry()).unwrap();
		let dir = tempfile::tempdir().unwrap();
		let written = bridge.export_models(dir.path()).unwrap();
		assert_eq!(written.len(), 2);
		assert!(dir.path().join("blog.rs").exists());
		assert!(dir.path().join("auth.rs").exists());
	}
}
