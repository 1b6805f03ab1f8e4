//! Schema introspection.
//!
//! Walks the owning registry in registration order, applies the model
//! filter and skip predicates, and translates each surviving model into a
//! [`ModelSpec`]. Per-field and per-model outcomes that remove something
//! from the bridge are collected into a [`SynthesisReport`] instead of
//! living only in log output; the report is the operator-facing record of
//! everything the bridge left behind.

use crate::error::SkipReason;
use crate::filter::ModelFilter;
use crate::meta::AppRegistry;
use crate::relations::build_relation;
use crate::resolver;
use crate::spec::{FieldSpec, ModelSpec};
use serde::{Deserialize, Serialize};

/// One contained skip: a model, or one field of a model, left out of the
/// bridge for the recorded reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipEvent {
	/// Qualified `app_label.ModelName`.
	pub model: String,
	/// `None` when the whole model was skipped.
	pub field: Option<String>,
	pub reason: SkipReason,
}

/// Accumulated skip outcomes from introspection and the registry build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
	events: Vec<SkipEvent>,
}

impl SynthesisReport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_model(&mut self, model: impl Into<String>, reason: SkipReason) {
		self.events.push(SkipEvent {
			model: model.into(),
			field: None,
			reason,
		});
	}

	pub fn record_field(
		&mut self,
		model: impl Into<String>,
		field: impl Into<String>,
		reason: SkipReason,
	) {
		self.events.push(SkipEvent {
			model: model.into(),
			field: Some(field.into()),
			reason,
		});
	}

	pub fn events(&self) -> &[SkipEvent] {
		&self.events
	}

	/// Events touching one model, whole-model and per-field alike.
	pub fn for_model<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a SkipEvent> {
		self.events.iter().filter(move |e| e.model == label)
	}

	/// Whether the whole model was skipped (as opposed to losing fields).
	pub fn model_skipped(&self, label: &str) -> bool {
		self.events.iter().any(|e| e.model == label && e.field.is_none())
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}
}

/// Translate the owning registry into model blueprints.
///
/// Returns the specs in registration order together with the report of
/// everything that was left out. Nothing here is fatal; configuration
/// errors are caught earlier when the filter is compiled.
pub fn introspect(registry: &AppRegistry, filter: &ModelFilter) -> (Vec<ModelSpec>, SynthesisReport) {
	let mut specs = Vec::new();
	let mut report = SynthesisReport::new();

	for meta in registry.get_models() {
		let label = meta.label();

		if let Some(reason) = skip_predicate(meta) {
			tracing::debug!(model = %label, %reason, "skipping model");
			report.record_model(label, reason);
			continue;
		}
		if !filter.should_include(&label) {
			tracing::debug!(model = %label, "model excluded by configuration");
			report.record_model(label, SkipReason::ExcludedByConfig);
			continue;
		}

		let mut spec = ModelSpec::new(&meta.app_label, &meta.model_name, &meta.db_table);
		spec.database_alias = meta.database_alias.clone();

		for field in &meta.fields {
			if field.is_relation() {
				match build_relation(meta, field) {
					Ok(relation) => spec.relations.push(relation),
					Err(reason) => {
						tracing::debug!(model = %label, field = %field.name, %reason, "skipping relation field");
						report.record_field(&label, &field.name, reason);
					}
				}
				continue;
			}
			match resolver::resolve(field) {
				Ok(resolved) => {
					let mut column = FieldSpec::new(&field.name, field.column_name(), resolved.ty);
					column.nullable = field.null;
					column.primary_key = resolved.primary_key;
					column.generated = resolved.generated || field.auto_created;
					column.has_default = field.has_default;
					column.default = field.default.clone();
					column.choices = field.choices.clone();
					spec.fields.push(column);
				}
				Err(reason) => {
					tracing::debug!(model = %label, field = %field.name, %reason, "skipping field");
					report.record_field(&label, &field.name, reason);
				}
			}
		}

		// A model that lost its identity during translation is useless
		// downstream; exclude it rather than synthesize a keyless table.
		if spec.primary_key().is_none() {
			tracing::warn!(model = %label, "no primary key survived translation; model excluded");
			report.record_model(label, SkipReason::NoPrimaryKey);
			continue;
		}

		specs.push(spec);
	}

	(specs, report)
}

fn skip_predicate(meta: &crate::meta::ModelMeta) -> Option<SkipReason> {
	if meta.abstract_model {
		Some(SkipReason::AbstractModel)
	} else if meta.proxy {
		Some(SkipReason::ProxyModel)
	} else if meta.fields.is_empty() {
		Some(SkipReason::NoFields)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conf::BridgeConfig;
	use crate::meta::{FieldMeta, ModelMeta, RelationKind, RelationMeta};
	use crate::spec::ColumnType;

	fn article() -> ModelMeta {
		ModelMeta::new("blog", "Article", "blog_article")
			.with_field(FieldMeta::new("id", "BigAutoField").primary_key())
			.with_field(FieldMeta::new("title", "CharField").with_max_length(200).unique())
			.with_field(FieldMeta::new("body", "TextField"))
	}

	fn registry_with(models: Vec<ModelMeta>) -> AppRegistry {
		let mut registry = AppRegistry::new();
		for meta in models {
			registry.register_model(meta);
		}
		registry
	}

	#[test]
	fn test_basic_translation() {
		let registry = registry_with(vec![article()]);
		let (specs, report) = introspect(&registry, &ModelFilter::allow_all());

		assert_eq!(specs.len(), 1);
		assert!(report.is_empty());
		let spec = &specs[0];
		assert_eq!(spec.qualified_name, "blog.Article");
		assert_eq!(spec.table_name, "blog_article");
		let pk = spec.primary_key().unwrap();
		assert_eq!(pk.name, "id");
		assert!(pk.generated);
		assert_eq!(
			spec.field("title").unwrap().ty,
			ColumnType::Char { max_length: 200 }
		);
	}

	#[test]
	fn test_unsupported_field_omitted_not_fatal() {
		let meta = article()
			.with_field(FieldMeta::new("location", "GeometryField"));
		let registry = registry_with(vec![meta]);
		let (specs, report) = introspect(&registry, &ModelFilter::allow_all());

		assert_eq!(specs.len(), 1);
		assert!(specs[0].field("location").is_none());
		assert_eq!(report.len(), 1);
		assert_eq!(report.events()[0].field.as_deref(), Some("location"));
		assert_eq!(
			report.events()[0].reason,
			SkipReason::UnsupportedFieldType {
				internal_type: "GeometryField".to_string()
			}
		);
	}

	#[test]
	fn test_model_without_surviving_primary_key_excluded() {
		let meta = ModelMeta::new("geo", "Region", "geo_region")
			.with_field(FieldMeta::new("id", "CustomKeyField").primary_key())
			.with_field(FieldMeta::new("name", "CharField"));
		let registry = registry_with(vec![meta, article()]);
		let (specs, report) = introspect(&registry, &ModelFilter::allow_all());

		assert_eq!(specs.len(), 1);
		assert_eq!(specs[0].qualified_name, "blog.Article");
		assert!(report.model_skipped("geo.Region"));
		assert!(report
			.for_model("geo.Region")
			.any(|e| e.reason == SkipReason::NoPrimaryKey));
	}

	#[test]
	fn test_exclusion_scenario() {
		let user = ModelMeta::new("auth", "User", "auth_user")
			.with_field(FieldMeta::new("id", "BigAutoField").primary_key());
		let registry = registry_with(vec![article(), user]);
		let config = BridgeConfig::new().with_exclude_models(["auth.*"]);
		let filter = ModelFilter::from_config(&config).unwrap();

		let (specs, report) = introspect(&registry, &filter);
		assert_eq!(specs.len(), 1);
		assert_eq!(specs[0].qualified_name, "blog.Article");
		assert!(report
			.for_model("auth.User")
			.any(|e| e.reason == SkipReason::ExcludedByConfig));
	}

	#[test]
	fn test_abstract_proxy_and_empty_models_skipped() {
		let registry = registry_with(vec![
			ModelMeta::new("base", "Timestamped", "")
				.abstract_model()
				.with_field(FieldMeta::new("created", "DateTimeField")),
			ModelMeta::new("blog", "ArticleProxy", "blog_article").proxy(),
			ModelMeta::new("blog", "Empty", "blog_empty"),
		]);
		let (specs, report) = introspect(&registry, &ModelFilter::allow_all());

		assert!(specs.is_empty());
		assert!(report
			.for_model("base.Timestamped")
			.any(|e| e.reason == SkipReason::AbstractModel));
		assert!(report
			.for_model("blog.ArticleProxy")
			.any(|e| e.reason == SkipReason::ProxyModel));
		assert!(report
			.for_model("blog.Empty")
			.any(|e| e.reason == SkipReason::NoFields));
	}

	#[test]
	fn test_relations_collected() {
		let comment = ModelMeta::new("blog", "Comment", "blog_comment")
			.with_field(FieldMeta::new("id", "BigAutoField").primary_key())
			.with_field(
				FieldMeta::new("article", "ForeignKey").with_relation(
					RelationMeta::new(RelationKind::ForeignKey, "blog.Article")
						.with_related_name("comments")
						.with_on_delete("CASCADE"),
				),
			);
		let registry = registry_with(vec![article(), comment]);
		let (specs, _) = introspect(&registry, &ModelFilter::allow_all());

		let comment_spec = specs.iter().find(|s| s.qualified_name == "blog.Comment").unwrap();
		assert_eq!(comment_spec.relations.len(), 1);
		assert_eq!(comment_spec.relations[0].target, "blog.Article");
		// Key column materializes at synthesis, not as a scalar field here.
		assert!(comment_spec.field("article").is_none());
	}

	#[test]
	fn test_unmanaged_model_still_bridged() {
		let meta = ModelMeta::new("legacy", "Ledger", "legacy_ledger")
			.unmanaged()
			.with_field(FieldMeta::new("id", "AutoField").primary_key());
		let registry = registry_with(vec![meta]);
		let (specs, _) = introspect(&registry, &ModelFilter::allow_all());
		assert_eq!(specs.len(), 1);
	}
}
