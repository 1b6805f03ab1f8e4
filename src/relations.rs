//! Relation resolution.
//!
//! Builds [`RelationSpec`] descriptors from relational field metadata.
//! Target classes are never resolved here; the spec carries the target's
//! qualified name and the registry build pass decides availability later.

use crate::error::SkipReason;
use crate::meta::{FieldMeta, ModelMeta, RelationKind};
use crate::spec::RelationSpec;
use serde::{Deserialize, Serialize};

/// Cascade policy on the async side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDeletePolicy {
	Cascade,
	SetNull,
	SetDefault,
	Restrict,
	NoAction,
}

impl OnDeletePolicy {
	/// Translate the owning ORM's cascade name. `PROTECT` maps to restrict
	/// and `DO_NOTHING` to no-action; unknown or missing names fall back to
	/// cascade, the owning ORM's own default.
	pub fn from_owning_name(name: Option<&str>) -> Self {
		match name {
			Some("SET_NULL") => Self::SetNull,
			Some("SET_DEFAULT") => Self::SetDefault,
			Some("PROTECT") | Some("RESTRICT") => Self::Restrict,
			Some("DO_NOTHING") => Self::NoAction,
			_ => Self::Cascade,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Cascade => "CASCADE",
			Self::SetNull => "SET NULL",
			Self::SetDefault => "SET DEFAULT",
			Self::Restrict => "RESTRICT",
			Self::NoAction => "NO ACTION",
		}
	}
}

/// Build a [`RelationSpec`] from a relational field.
///
/// Key columns for foreign-key and one-to-one relations use the field's
/// declared column when present, otherwise the owning ORM's `{name}_id`
/// convention. Many-to-many relations materialize no column on the source
/// table; their rows live in the through table and the spec records it.
pub fn build_relation(owner: &ModelMeta, field: &FieldMeta) -> Result<RelationSpec, SkipReason> {
	let relation = field.relation.as_ref().ok_or(SkipReason::MissingRelationTarget)?;
	if relation.target.is_empty() {
		return Err(SkipReason::MissingRelationTarget);
	}

	let source_column = match relation.kind {
		RelationKind::ManyToMany => None,
		_ => Some(
			field
				.column
				.clone()
				.unwrap_or_else(|| format!("{}_id", field.name)),
		),
	};

	Ok(RelationSpec {
		kind: relation.kind,
		field_name: field.name.clone(),
		source_column,
		target: relation.target.clone(),
		related_name: effective_related_name(owner, relation.related_name.as_deref()),
		on_delete: OnDeletePolicy::from_owning_name(relation.on_delete.as_deref()),
		through_table: relation.through_table.clone(),
		nullable: field.null,
	})
}

/// Reverse accessor name. `"+"` suppresses it; unset falls back to the
/// owning ORM's deterministic `{model_name_lower}_set` default.
fn effective_related_name(owner: &ModelMeta, declared: Option<&str>) -> Option<String> {
	match declared {
		Some("+") => None,
		Some(name) => Some(name.to_string()),
		None => Some(format!("{}_set", owner.model_name.to_lowercase())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::RelationMeta;

	fn owner() -> ModelMeta {
		ModelMeta::new("blog", "Comment", "blog_comment")
	}

	#[test]
	fn test_on_delete_translation() {
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("CASCADE")),
			OnDeletePolicy::Cascade
		);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("SET_NULL")),
			OnDeletePolicy::SetNull
		);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("SET_DEFAULT")),
			OnDeletePolicy::SetDefault
		);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("PROTECT")),
			OnDeletePolicy::Restrict
		);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("RESTRICT")),
			OnDeletePolicy::Restrict
		);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("DO_NOTHING")),
			OnDeletePolicy::NoAction
		);
		assert_eq!(OnDeletePolicy::from_owning_name(None), OnDeletePolicy::Cascade);
		assert_eq!(
			OnDeletePolicy::from_owning_name(Some("SOMETHING_CUSTOM")),
			OnDeletePolicy::Cascade
		);
	}

	#[test]
	fn test_foreign_key_spec() {
		let field = FieldMeta::new("article", "ForeignKey")
			.with_column("article_id")
			.nullable()
			.with_relation(
				RelationMeta::new(RelationKind::ForeignKey, "blog.Article")
					.with_related_name("comments")
					.with_on_delete("CASCADE"),
			);

		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.kind, RelationKind::ForeignKey);
		assert_eq!(spec.source_column.as_deref(), Some("article_id"));
		assert_eq!(spec.target, "blog.Article");
		assert_eq!(spec.related_name.as_deref(), Some("comments"));
		assert_eq!(spec.on_delete, OnDeletePolicy::Cascade);
		assert!(spec.nullable);
	}

	#[test]
	fn test_one_to_one_spec() {
		let field = FieldMeta::new("user", "OneToOneField").with_relation(
			RelationMeta::new(RelationKind::OneToOne, "auth.User")
				.with_related_name("profile")
				.with_on_delete("CASCADE"),
		);

		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.kind, RelationKind::OneToOne);
		// Same key-column convention as a foreign key.
		assert_eq!(spec.source_column.as_deref(), Some("user_id"));
		assert_eq!(spec.related_name.as_deref(), Some("profile"));
	}

	#[test]
	fn test_key_column_convention_when_undeclared() {
		let field = FieldMeta::new("author", "ForeignKey")
			.with_relation(RelationMeta::new(RelationKind::ForeignKey, "auth.User"));
		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.source_column.as_deref(), Some("author_id"));
	}

	#[test]
	fn test_related_name_fallback() {
		let field = FieldMeta::new("author", "ForeignKey")
			.with_relation(RelationMeta::new(RelationKind::ForeignKey, "auth.User"));
		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.related_name.as_deref(), Some("comment_set"));
	}

	#[test]
	fn test_suppressed_related_name() {
		let field = FieldMeta::new("author", "ForeignKey").with_relation(
			RelationMeta::new(RelationKind::ForeignKey, "auth.User").with_related_name("+"),
		);
		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.related_name, None);
	}

	#[test]
	fn test_many_to_many_has_no_source_column() {
		let field = FieldMeta::new("tags", "ManyToManyField").with_relation(
			RelationMeta::new(RelationKind::ManyToMany, "blog.Tag")
				.with_through_table("blog_article_tags"),
		);
		let spec = build_relation(&owner(), &field).unwrap();
		assert_eq!(spec.source_column, None);
		assert_eq!(spec.through_table.as_deref(), Some("blog_article_tags"));
	}

	#[test]
	fn test_missing_target_is_a_skip() {
		let field = FieldMeta::new("ghost", "ForeignKey")
			.with_relation(RelationMeta::new(RelationKind::ForeignKey, ""));
		assert_eq!(
			build_relation(&owner(), &field),
			Err(SkipReason::MissingRelationTarget)
		);

		let no_relation = FieldMeta::new("ghost", "ForeignKey");
		assert_eq!(
			build_relation(&owner(), &no_relation),
			Err(SkipReason::MissingRelationTarget)
		);
	}
}
