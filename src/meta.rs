//! Owning-ORM metadata surface.
//!
//! The bridge never imports the owning ORM itself; the host hands it a
//! [`AppRegistry`] describing every model the owning ORM knows about.
//! [`ModelMeta`] and [`FieldMeta`] mirror the owning ORM's per-model
//! `app_label` / `model_name` / `db_table` conventions, including the
//! declared ancestor chain each field type carries so custom subclasses can
//! fall back to their nearest supported parent without runtime reflection.

use crate::row::SqlValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Relation kind as declared on the owning model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
	ForeignKey,
	OneToOne,
	ManyToMany,
}

/// Relational portion of a field's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMeta {
	pub kind: RelationKind,
	/// Target model as `app_label.ModelName`.
	pub target: String,
	/// Reverse accessor name; `"+"` means the owning ORM suppressed it.
	pub related_name: Option<String>,
	/// Cascade policy name as the owning ORM spells it (`CASCADE`, `SET_NULL`, ...).
	pub on_delete: Option<String>,
	/// Through table for many-to-many relations.
	pub through_table: Option<String>,
}

impl RelationMeta {
	pub fn new(kind: RelationKind, target: impl Into<String>) -> Self {
		Self {
			kind,
			target: target.into(),
			related_name: None,
			on_delete: None,
			through_table: None,
		}
	}

	pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
		self.related_name = Some(related_name.into());
		self
	}

	pub fn with_on_delete(mut self, on_delete: impl Into<String>) -> Self {
		self.on_delete = Some(on_delete.into());
		self
	}

	pub fn with_through_table(mut self, through_table: impl Into<String>) -> Self {
		self.through_table = Some(through_table.into());
		self
	}
}

/// Extracted metadata for a single owning-ORM field.
///
/// `internal_type` is the owning ORM's field type identifier (for example
/// `CharField`); `ancestor_types` is the declared inheritance chain,
/// most-derived first and excluding `internal_type` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
	pub name: String,
	pub internal_type: String,
	pub ancestor_types: Vec<String>,
	/// Actual DB column; `None` means it matches the field name.
	pub column: Option<String>,
	pub primary_key: bool,
	pub null: bool,
	pub unique: bool,
	pub db_index: bool,
	pub has_default: bool,
	/// Only meaningful while `has_default` is true; an explicit null default
	/// is `Some(SqlValue::Null)`.
	pub default: Option<SqlValue>,
	pub max_length: Option<u32>,
	pub max_digits: Option<u32>,
	pub decimal_places: Option<u32>,
	pub choices: Option<Vec<(String, String)>>,
	/// Auto-generated key (the database assigns the value on insert).
	pub auto_created: bool,
	pub relation: Option<RelationMeta>,
}

impl FieldMeta {
	pub fn new(name: impl Into<String>, internal_type: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			internal_type: internal_type.into(),
			ancestor_types: Vec::new(),
			column: None,
			primary_key: false,
			null: false,
			unique: false,
			db_index: false,
			has_default: false,
			default: None,
			max_length: None,
			max_digits: None,
			decimal_places: None,
			choices: None,
			auto_created: false,
			relation: None,
		}
	}

	pub fn with_ancestors<I, S>(mut self, ancestors: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ancestor_types = ancestors.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_column(mut self, column: impl Into<String>) -> Self {
		self.column = Some(column.into());
		self
	}

	pub fn primary_key(mut self) -> Self {
		self.primary_key = true;
		self
	}

	pub fn nullable(mut self) -> Self {
		self.null = true;
		self
	}

	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	pub fn db_index(mut self) -> Self {
		self.db_index = true;
		self
	}

	pub fn auto_created(mut self) -> Self {
		self.auto_created = true;
		self
	}

	/// Record a default value. An explicit null default is valid and must
	/// survive translation, so `has_default` is tracked separately.
	pub fn with_default(mut self, default: SqlValue) -> Self {
		self.has_default = true;
		self.default = Some(default);
		self
	}

	pub fn with_max_length(mut self, max_length: u32) -> Self {
		self.max_length = Some(max_length);
		self
	}

	pub fn with_decimal(mut self, max_digits: u32, decimal_places: u32) -> Self {
		self.max_digits = Some(max_digits);
		self.decimal_places = Some(decimal_places);
		self
	}

	pub fn with_choices(mut self, choices: Vec<(String, String)>) -> Self {
		self.choices = Some(choices);
		self
	}

	pub fn with_relation(mut self, relation: RelationMeta) -> Self {
		self.relation = Some(relation);
		self
	}

	/// The DB column backing this field.
	pub fn column_name(&self) -> &str {
		self.column.as_deref().unwrap_or(&self.name)
	}

	pub fn is_relation(&self) -> bool {
		self.relation.is_some()
	}
}

/// Extracted metadata for a single owning-ORM model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
	/// Application label (e.g. `blog`).
	pub app_label: String,
	/// Model name (e.g. `Article`).
	pub model_name: String,
	/// Table name exactly as the owning ORM created it.
	pub db_table: String,
	/// Database alias this model's table lives on.
	pub database_alias: String,
	pub fields: Vec<FieldMeta>,
	pub abstract_model: bool,
	pub proxy: bool,
	pub managed: bool,
}

impl ModelMeta {
	pub fn new(
		app_label: impl Into<String>,
		model_name: impl Into<String>,
		db_table: impl Into<String>,
	) -> Self {
		Self {
			app_label: app_label.into(),
			model_name: model_name.into(),
			db_table: db_table.into(),
			database_alias: "default".to_string(),
			fields: Vec::new(),
			abstract_model: false,
			proxy: false,
			managed: true,
		}
	}

	pub fn with_field(mut self, field: FieldMeta) -> Self {
		self.fields.push(field);
		self
	}

	pub fn with_database_alias(mut self, alias: impl Into<String>) -> Self {
		self.database_alias = alias.into();
		self
	}

	pub fn abstract_model(mut self) -> Self {
		self.abstract_model = true;
		self
	}

	pub fn proxy(mut self) -> Self {
		self.proxy = true;
		self
	}

	pub fn unmanaged(mut self) -> Self {
		self.managed = false;
		self
	}

	/// Qualified `app_label.ModelName` identifier.
	pub fn label(&self) -> String {
		format!("{}.{}", self.app_label, self.model_name)
	}

	pub fn primary_key_field(&self) -> Option<&FieldMeta> {
		self.fields.iter().find(|f| f.primary_key)
	}
}

/// The owning ORM's application/model registry, as handed to the bridge.
///
/// Iteration order is registration order; the introspector relies on it so
/// the synthesis pass is reproducible.
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
	models: IndexMap<String, ModelMeta>,
}

impl AppRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a model. Re-registering a qualified name replaces the
	/// earlier entry, keeping the "no two models share a qualified name"
	/// invariant.
	pub fn register_model(&mut self, meta: ModelMeta) {
		let label = meta.label();
		if self.models.insert(label.clone(), meta).is_some() {
			tracing::warn!(model = %label, "model registered twice; replacing earlier entry");
		}
	}

	pub fn get_model(&self, app_label: &str, model_name: &str) -> Option<&ModelMeta> {
		self.models.get(&format!("{app_label}.{model_name}"))
	}

	pub fn get_by_label(&self, label: &str) -> Option<&ModelMeta> {
		self.models.get(label)
	}

	/// All models in registration order.
	pub fn get_models(&self) -> impl Iterator<Item = &ModelMeta> {
		self.models.values()
	}

	pub fn len(&self) -> usize {
		self.models.len()
	}

	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}
}
