//! Immutable model blueprints.
//!
//! The introspector emits one [`ModelSpec`] per eligible owning model; the
//! synthesizer consumes them. Table and column names are carried exactly as
//! the owning ORM created them, never re-derived. Schema constraints the
//! owning ORM enforces (`unique`, indexes) are deliberately absent: the
//! bridge queries tables, it never shapes them.

use crate::meta::RelationKind;
use crate::relations::OnDeletePolicy;
use crate::row::SqlValue;
use serde::{Deserialize, Serialize};

/// Resolved column type for the async side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
	SmallInt,
	Int,
	BigInt,
	/// Bounded text; `max_length` comes from the owning field declaration.
	Char { max_length: u32 },
	Text,
	Bool,
	Date,
	Time,
	DateTime,
	/// Durations travel as microsecond counts.
	DurationMicros,
	Decimal {
		max_digits: Option<u32>,
		decimal_places: Option<u32>,
	},
	Float,
	Binary,
	Uuid,
	Json,
}

impl ColumnType {
	/// Whether a database-generated value of this type can serve as an
	/// auto-assigned primary key.
	pub fn is_integer(&self) -> bool {
		matches!(self, Self::SmallInt | Self::Int | Self::BigInt)
	}
}

/// One synthesized column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
	/// Field name on the bridged model.
	pub name: String,
	/// DB column name, byte-identical to the owning ORM's.
	pub column: String,
	pub ty: ColumnType,
	pub nullable: bool,
	pub primary_key: bool,
	/// The database assigns the value on insert (auto primary keys).
	pub generated: bool,
	pub has_default: bool,
	/// Only meaningful while `has_default`; explicit null defaults survive.
	pub default: Option<SqlValue>,
	/// Declarative choices metadata; never enforced by the bridge.
	pub choices: Option<Vec<(String, String)>>,
}

impl FieldSpec {
	pub fn new(name: impl Into<String>, column: impl Into<String>, ty: ColumnType) -> Self {
		Self {
			name: name.into(),
			column: column.into(),
			ty,
			nullable: false,
			primary_key: false,
			generated: false,
			has_default: false,
			default: None,
			choices: None,
		}
	}
}

/// One resolved relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSpec {
	pub kind: RelationKind,
	/// Field name on the source model.
	pub field_name: String,
	/// Key column on the source table; `None` for many-to-many.
	pub source_column: Option<String>,
	/// Target model's qualified `app_label.ModelName`.
	pub target: String,
	/// Reverse accessor name; `None` when the owning ORM suppressed it.
	pub related_name: Option<String>,
	pub on_delete: OnDeletePolicy,
	/// Join table for many-to-many relations.
	pub through_table: Option<String>,
	pub nullable: bool,
}

/// The full blueprint for one bridged model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
	/// Qualified `app_label.ModelName`.
	pub qualified_name: String,
	pub app_label: String,
	pub model_name: String,
	/// Table name, byte-identical to the owning ORM's.
	pub table_name: String,
	pub database_alias: String,
	pub fields: Vec<FieldSpec>,
	pub relations: Vec<RelationSpec>,
}

impl ModelSpec {
	pub fn new(
		app_label: impl Into<String>,
		model_name: impl Into<String>,
		table_name: impl Into<String>,
	) -> Self {
		let app_label = app_label.into();
		let model_name = model_name.into();
		Self {
			qualified_name: format!("{app_label}.{model_name}"),
			app_label,
			model_name,
			table_name: table_name.into(),
			database_alias: "default".to_string(),
			fields: Vec::new(),
			relations: Vec::new(),
		}
	}

	pub fn primary_key(&self) -> Option<&FieldSpec> {
		self.fields.iter().find(|f| f.primary_key)
	}

	pub fn field(&self, name: &str) -> Option<&FieldSpec> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn relation(&self, field_name: &str) -> Option<&RelationSpec> {
		self.relations.iter().find(|r| r.field_name == field_name)
	}
}
