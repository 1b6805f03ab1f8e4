//! Dynamic value and row representation.
//!
//! Synthesized models have no compile-time struct, so query results are
//! delivered as [`Instance`] maps of field name to [`SqlValue`]. The value
//! enum covers every column type the resolver can produce.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A database value that can cross the bridge in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Bytes(Vec<u8>),
	Decimal(Decimal),
	Date(NaiveDate),
	Time(NaiveTime),
	DateTime(NaiveDateTime),
	Uuid(Uuid),
	Json(JsonValue),
}

impl SqlValue {
	pub fn is_null(&self) -> bool {
		matches!(self, SqlValue::Null)
	}

	/// Integer view, when the value is an integer.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			SqlValue::Int(i) => Some(*i),
			_ => None,
		}
	}

	/// Text view, when the value is textual.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			SqlValue::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			SqlValue::Bool(b) => Some(*b),
			_ => None,
		}
	}
}

impl From<SqlValue> for sea_query::Value {
	fn from(value: SqlValue) -> Self {
		match value {
			SqlValue::Null => Option::<String>::None.into(),
			SqlValue::Bool(b) => b.into(),
			SqlValue::Int(i) => i.into(),
			SqlValue::Float(f) => f.into(),
			SqlValue::Text(s) => s.into(),
			SqlValue::Bytes(b) => b.into(),
			SqlValue::Decimal(d) => d.into(),
			SqlValue::Date(d) => d.into(),
			SqlValue::Time(t) => t.into(),
			SqlValue::DateTime(dt) => dt.into(),
			SqlValue::Uuid(u) => u.into(),
			SqlValue::Json(j) => j.into(),
		}
	}
}

impl From<&str> for SqlValue {
	fn from(s: &str) -> Self {
		SqlValue::Text(s.to_string())
	}
}

impl From<String> for SqlValue {
	fn from(s: String) -> Self {
		SqlValue::Text(s)
	}
}

impl From<i64> for SqlValue {
	fn from(i: i64) -> Self {
		SqlValue::Int(i)
	}
}

impl From<i32> for SqlValue {
	fn from(i: i32) -> Self {
		SqlValue::Int(i as i64)
	}
}

impl From<f64> for SqlValue {
	fn from(f: f64) -> Self {
		SqlValue::Float(f)
	}
}

impl From<bool> for SqlValue {
	fn from(b: bool) -> Self {
		SqlValue::Bool(b)
	}
}

impl From<Uuid> for SqlValue {
	fn from(u: Uuid) -> Self {
		SqlValue::Uuid(u)
	}
}

impl From<Decimal> for SqlValue {
	fn from(d: Decimal) -> Self {
		SqlValue::Decimal(d)
	}
}

/// A single result row bound to a synthesized model.
///
/// Field order follows the synthesized model's column order. Values are
/// keyed by *field name* (relation key columns use their column name, e.g.
/// `author_id`), never by the owning ORM's attribute objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
	model: String,
	values: IndexMap<String, SqlValue>,
}

impl Instance {
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			values: IndexMap::new(),
		}
	}

	/// Qualified name of the model this row belongs to.
	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn set(&mut self, field: impl Into<String>, value: SqlValue) {
		self.values.insert(field.into(), value);
	}

	pub fn get(&self, field: &str) -> Option<&SqlValue> {
		self.values.get(field)
	}

	pub fn fields(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}
