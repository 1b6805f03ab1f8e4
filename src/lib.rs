//! # ormbridge
//!
//! Bridge a synchronous, schema-owning ORM's model registry to an async
//! query engine without duplicating model definitions.
//!
//! The owning ORM stays the single source of truth for schema and
//! migrations; this crate introspects its registry, translates each model
//! into an immutable blueprint, synthesizes a queryable descriptor per
//! model, and serves async CRUD against the existing tables through sqlx
//! connection pools.
//!
//! ## Pipeline
//!
//! - **Introspection** (`meta`, `introspect`): walk the owning registry in
//!   registration order, apply include/exclude filters and skip predicates
//! - **Translation** (`resolver`, `relations`, `spec`): map field types
//!   (with declared-ancestor fallback) and relations into `ModelSpec`s
//! - **Synthesis** (`synth`, `registry`): build one descriptor per spec in
//!   a single forward pass; a model that fails is absent, not fatal, and
//!   dependent relations degrade to "dropped"
//! - **Execution** (`lifecycle`, `manager`): lazily-initialized `AnyPool`
//!   per database alias, sea-query statement building, dynamic row decoding
//! - **Export** (`codegen`): render the surviving blueprints as Rust source,
//!   one module per owning app
//!
//! ## Example
//!
//! ```rust,no_run
//! use ormbridge::prelude::*;
//!
//! # async fn demo() -> ormbridge::BridgeResult<()> {
//! let mut registry = AppRegistry::new();
//! registry.register_model(
//! 	ModelMeta::new("blog", "Article", "blog_article")
//! 		.with_field(FieldMeta::new("id", "BigAutoField").primary_key())
//! 		.with_field(FieldMeta::new("title", "CharField").with_max_length(200)),
//! );
//!
//! let config = BridgeConfig::new()
//! 	.with_database("default", DatabaseSettings::sqlite_memory())
//! 	.with_exclude_models(["admin.*"]);
//!
//! let bridge = Bridge::new(config, &registry)?;
//! bridge.init().await?;
//!
//! let articles = bridge.objects("blog.Article")?;
//! let row = articles
//! 	.create(vec![("title".to_string(), "hello".into())])
//! 	.await?;
//! let fetched = articles.get(vec![Filter::eq("id", row.get("id").cloned().unwrap())]).await?;
//! assert_eq!(fetched.get("title"), row.get("title"));
//!
//! bridge.close().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codegen;
pub mod conf;
pub mod error;
pub mod filter;
pub mod introspect;
pub mod lifecycle;
pub mod manager;
pub mod meta;
pub mod registry;
pub mod relations;
pub mod resolver;
pub mod row;
pub mod spec;
pub mod synth;

pub use bridge::Bridge;
pub use conf::{BridgeConfig, DatabaseSettings, PoolSettings};
pub use error::{BridgeError, BridgeResult, SkipReason};
pub use introspect::{SkipEvent, SynthesisReport};
pub use lifecycle::LifecycleState;
pub use manager::{BridgeQuerySet, Filter, FilterOperator, FilterValue, Objects};
pub use meta::{AppRegistry, FieldMeta, ModelMeta, RelationKind, RelationMeta};
pub use registry::BridgeRegistry;
pub use row::{Instance, SqlValue};
pub use spec::{ColumnType, FieldSpec, ModelSpec, RelationSpec};
pub use synth::SynthesizedModel;

/// Commonly used types in one import.
pub mod prelude {
	pub use crate::bridge::Bridge;
	pub use crate::conf::{BridgeConfig, DatabaseSettings, PoolSettings};
	pub use crate::error::{BridgeError, BridgeResult};
	pub use crate::lifecycle::LifecycleState;
	pub use crate::manager::{Filter, FilterOperator, FilterValue, Objects};
	pub use crate::meta::{AppRegistry, FieldMeta, ModelMeta, RelationKind, RelationMeta};
	pub use crate::row::{Instance, SqlValue};
}
