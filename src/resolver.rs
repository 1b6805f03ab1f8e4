//! Field type resolution.
//!
//! A static table maps the owning ORM's field type identifiers to async
//! column types. When a field's own identifier is absent the resolver walks
//! the field's declared ancestor chain, most-derived first, and takes the
//! first identifier the table knows. Custom field subclasses thereby land on
//! their nearest supported parent instead of being dropped.

use crate::error::SkipReason;
use crate::meta::FieldMeta;
use crate::spec::ColumnType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Resolved scalar column, before relation handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
	pub ty: ColumnType,
	/// Auto key types force this on regardless of field flags.
	pub primary_key: bool,
	/// The database generates the value on insert.
	pub generated: bool,
}

type FieldConverter = fn(&FieldMeta) -> ResolvedColumn;

fn plain(field: &FieldMeta, ty: ColumnType) -> ResolvedColumn {
	ResolvedColumn {
		ty,
		primary_key: field.primary_key,
		generated: false,
	}
}

fn auto(ty: ColumnType) -> ResolvedColumn {
	ResolvedColumn {
		ty,
		primary_key: true,
		generated: true,
	}
}

/// Bounded text with a per-type fallback length the owning ORM uses when the
/// declaration carries none.
fn char_with_fallback(field: &FieldMeta, fallback: u32) -> ResolvedColumn {
	plain(
		field,
		ColumnType::Char {
			max_length: field.max_length.unwrap_or(fallback),
		},
	)
}

static TYPE_TABLE: Lazy<HashMap<&'static str, FieldConverter>> = Lazy::new(|| {
	let mut table: HashMap<&'static str, FieldConverter> = HashMap::new();

	// Auto key fields.
	table.insert("AutoField", |_| auto(ColumnType::Int));
	table.insert("BigAutoField", |_| auto(ColumnType::BigInt));
	table.insert("SmallAutoField", |_| auto(ColumnType::SmallInt));

	// Integers. The positive variants share storage with their signed
	// counterparts; range enforcement stays with the owning ORM.
	table.insert("IntegerField", |f| plain(f, ColumnType::Int));
	table.insert("PositiveIntegerField", |f| plain(f, ColumnType::Int));
	table.insert("BigIntegerField", |f| plain(f, ColumnType::BigInt));
	table.insert("PositiveBigIntegerField", |f| plain(f, ColumnType::BigInt));
	table.insert("SmallIntegerField", |f| plain(f, ColumnType::SmallInt));
	table.insert("PositiveSmallIntegerField", |f| plain(f, ColumnType::SmallInt));

	// Strings.
	table.insert("CharField", |f| char_with_fallback(f, 255));
	table.insert("TextField", |f| plain(f, ColumnType::Text));
	table.insert("SlugField", |f| char_with_fallback(f, 50));
	table.insert("EmailField", |f| char_with_fallback(f, 254));
	table.insert("URLField", |f| char_with_fallback(f, 200));
	table.insert("GenericIPAddressField", |f| {
		plain(f, ColumnType::Char { max_length: 39 })
	});

	// File-ish fields store a path string; filesystem semantics do not
	// cross the bridge.
	table.insert("FileField", |f| char_with_fallback(f, 100));
	table.insert("ImageField", |f| char_with_fallback(f, 100));
	table.insert("FilePathField", |f| char_with_fallback(f, 100));

	table.insert("BooleanField", |f| plain(f, ColumnType::Bool));

	// Temporal.
	table.insert("DateField", |f| plain(f, ColumnType::Date));
	table.insert("DateTimeField", |f| plain(f, ColumnType::DateTime));
	table.insert("TimeField", |f| plain(f, ColumnType::Time));
	table.insert("DurationField", |f| plain(f, ColumnType::DurationMicros));

	// Numeric.
	table.insert("DecimalField", |f| {
		plain(
			f,
			ColumnType::Decimal {
				max_digits: f.max_digits,
				decimal_places: f.decimal_places,
			},
		)
	});
	table.insert("FloatField", |f| plain(f, ColumnType::Float));

	table.insert("BinaryField", |f| plain(f, ColumnType::Binary));
	table.insert("UUIDField", |f| plain(f, ColumnType::Uuid));
	table.insert("JSONField", |f| plain(f, ColumnType::Json));

	table
});

/// Resolve a scalar field's column type.
///
/// Tries the field's own `internal_type` first, then each declared ancestor
/// in order. A field no table entry covers is a contained skip, never an
/// error.
pub fn resolve(field: &FieldMeta) -> Result<ResolvedColumn, SkipReason> {
	if let Some(converter) = TYPE_TABLE.get(field.internal_type.as_str()) {
		return Ok(converter(field));
	}
	for ancestor in &field.ancestor_types {
		if let Some(converter) = TYPE_TABLE.get(ancestor.as_str()) {
			tracing::debug!(
				field = %field.name,
				declared = %field.internal_type,
				resolved_via = %ancestor,
				"field type resolved through ancestor"
			);
			return Ok(converter(field));
		}
	}
	Err(SkipReason::UnsupportedFieldType {
		internal_type: field.internal_type.clone(),
	})
}

/// Whether the table knows an identifier directly (no ancestor walk).
pub fn is_supported(internal_type: &str) -> bool {
	TYPE_TABLE.contains_key(internal_type)
}
