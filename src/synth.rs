//! Model synthesis.
//!
//! Turns a [`ModelSpec`] into a [`SynthesizedModel`], the runtime descriptor
//! the query manager executes against. There is no runtime class machinery
//! to build; the descriptor carries the table binding, the full column set
//! (scalar fields plus materialized relation key columns), and the relations
//! that could be bound.
//!
//! Synthesis is a failure boundary: anything wrong with the assembled model
//! becomes a [`SynthesisFailure`] naming the owning model, never a panic or
//! an error that escapes to the caller mid-pass.

use crate::error::SkipReason;
use crate::introspect::SynthesisReport;
use crate::meta::RelationKind;
use crate::spec::{ColumnType, FieldSpec, ModelSpec, RelationSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A relation that bound successfully against the synthesis plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundRelation {
	pub spec: RelationSpec,
	/// Primary-key column on the target table the key points at.
	pub target_column: String,
}

/// Executable descriptor for one bridged model.
///
/// `columns` is the complete column set in declaration order: scalar fields
/// first as introspected, then one key column per bound foreign-key or
/// one-to-one relation, typed after the target's primary key. Many-to-many
/// relations contribute no column here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedModel {
	pub qualified_name: String,
	pub app_label: String,
	pub model_name: String,
	pub table_name: String,
	pub database_alias: String,
	columns: Vec<FieldSpec>,
	relations: Vec<BoundRelation>,
}

impl SynthesizedModel {
	pub fn columns(&self) -> &[FieldSpec] {
		&self.columns
	}

	pub fn relations(&self) -> &[BoundRelation] {
		&self.relations
	}

	/// The primary-key column. Introspection refuses to emit a spec without
	/// one and synthesis validates it again, so callers treat `None` as a
	/// broken invariant, not a normal outcome.
	pub fn primary_key(&self) -> Option<&FieldSpec> {
		self.columns.iter().find(|c| c.primary_key)
	}

	/// Look a column up by field name or by DB column name.
	pub fn column(&self, name: &str) -> Option<&FieldSpec> {
		self.columns
			.iter()
			.find(|c| c.name == name || c.column == name)
	}

	pub(crate) fn retain_relations(&mut self, keep: impl Fn(&BoundRelation) -> bool) {
		self.relations.retain(|r| keep(r));
	}

	pub(crate) fn drop_key_column(&mut self, column: &str) {
		self.columns.retain(|c| c.column != column || c.primary_key);
	}
}

/// Per-model synthesis failure, naming the owning model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisFailure {
	pub model: String,
	pub cause: String,
}

impl std::fmt::Display for SynthesisFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "synthesis of '{}' failed: {}", self.model, self.cause)
	}
}

/// Build the descriptor for one model.
///
/// `plan` is the full set of specs the current pass intends to build, keyed
/// by qualified name; relations bind against it so forward references work.
/// Relations whose target is outside the plan are dropped and recorded, not
/// raised. Validation problems with the model itself fail the whole model.
pub fn synthesize(
	spec: &ModelSpec,
	plan: &IndexMap<String, ModelSpec>,
	report: &mut SynthesisReport,
) -> Result<SynthesizedModel, SynthesisFailure> {
	let fail = |cause: String| SynthesisFailure {
		model: spec.qualified_name.clone(),
		cause,
	};

	if spec.primary_key().is_none() {
		return Err(fail("no primary key column".to_string()));
	}

	let mut columns: Vec<FieldSpec> = Vec::with_capacity(spec.fields.len() + spec.relations.len());
	for field in &spec.fields {
		validate_column(field).map_err(&fail)?;
		columns.push(field.clone());
	}

	let mut relations = Vec::with_capacity(spec.relations.len());
	for relation in &spec.relations {
		let target_spec = match plan.get(&relation.target) {
			Some(target) => target,
			None => {
				tracing::warn!(
					model = %spec.qualified_name,
					field = %relation.field_name,
					target = %relation.target,
					"relation target not bridged; dropping relation"
				);
				report.record_field(
					&spec.qualified_name,
					&relation.field_name,
					SkipReason::RelationTargetUnavailable {
						target: relation.target.clone(),
					},
				);
				continue;
			}
		};
		let target_pk = target_spec.primary_key().ok_or_else(|| {
			fail(format!(
				"relation '{}' targets keyless model '{}'",
				relation.field_name, relation.target
			))
		})?;

		if relation.kind != RelationKind::ManyToMany {
			let source_column = relation.source_column.clone().ok_or_else(|| {
				fail(format!("relation '{}' has no key column", relation.field_name))
			})?;
			if columns.iter().any(|c| c.column == source_column) {
				return Err(fail(format!(
					"key column '{source_column}' collides with an existing column"
				)));
			}
			let mut key = FieldSpec::new(&source_column, &source_column, target_pk.ty.clone());
			key.nullable = relation.nullable;
			columns.push(key);
		}

		relations.push(BoundRelation {
			spec: relation.clone(),
			target_column: target_pk.column.clone(),
		});
	}

	Ok(SynthesizedModel {
		qualified_name: spec.qualified_name.clone(),
		app_label: spec.app_label.clone(),
		model_name: spec.model_name.clone(),
		table_name: spec.table_name.clone(),
		database_alias: spec.database_alias.clone(),
		columns,
		relations,
	})
}

fn validate_column(field: &FieldSpec) -> Result<(), String> {
	match &field.ty {
		ColumnType::Decimal {
			max_digits,
			decimal_places,
		} => {
			if max_digits.is_none() || decimal_places.is_none() {
				return Err(format!(
					"decimal field '{}' is missing its precision declaration",
					field.name
				));
			}
			Ok(())
		}
		ColumnType::Char { max_length } if *max_length == 0 => {
			Err(format!("text field '{}' declares a zero max length", field.name))
		}
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::relations::OnDeletePolicy;

	fn pk() -> FieldSpec {
		let mut f = FieldSpec::new("id", "id", ColumnType::BigInt);
		f.primary_key = true;
		f.generated = true;
		f
	}

	fn article_spec() -> ModelSpec {
		let mut spec = ModelSpec::new("blog", "Article", "blog_article");
		spec.fields.push(pk());
		spec.fields
			.push(FieldSpec::new("title", "title", ColumnType::Char { max_length: 200 }));
		spec
	}

	fn comment_spec() -> ModelSpec {
		let mut spec = ModelSpec::new("blog", "Comment", "blog_comment");
		spec.fields.push(pk());
		spec.relations.push(RelationSpec {
			kind: RelationKind::ForeignKey,
			field_name: "article".to_string(),
			source_column: Some("article_id".to_string()),
			target: "blog.Article".to_string(),
			related_name: Some("comments".to_string()),
			on_delete: OnDeletePolicy::Cascade,
			through_table: None,
			nullable: false,
		});
		spec
	}

	fn plan_of(specs: Vec<ModelSpec>) -> IndexMap<String, ModelSpec> {
		specs
			.into_iter()
			.map(|s| (s.qualified_name.clone(), s))
			.collect()
	}

	#[test]
	fn test_key_column_materialized_from_target_pk() {
		let plan = plan_of(vec![article_spec(), comment_spec()]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["blog.Comment"], &plan, &mut report).unwrap();

		let key = model.column("article_id").unwrap();
		assert_eq!(key.ty, ColumnType::BigInt);
		assert!(!key.primary_key);
		assert_eq!(model.relations().len(), 1);
		assert_eq!(model.relations()[0].target_column, "id");
		assert!(report.is_empty());
	}

	#[test]
	fn test_primary_key_lookup_on_descriptor() {
		let plan = plan_of(vec![article_spec()]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["blog.Article"], &plan, &mut report).unwrap();
		assert_eq!(model.primary_key().map(|c| c.name.as_str()), Some("id"));
	}

	#[test]
	fn test_one_to_one_key_column_materialized() {
		let mut profile = ModelSpec::new("accounts", "Profile", "accounts_profile");
		profile.fields.push(pk());
		profile.relations.push(RelationSpec {
			kind: RelationKind::OneToOne,
			field_name: "user".to_string(),
			source_column: Some("user_id".to_string()),
			target: "auth.User".to_string(),
			related_name: Some("profile".to_string()),
			on_delete: OnDeletePolicy::Cascade,
			through_table: None,
			nullable: false,
		});
		let mut user = ModelSpec::new("auth", "User", "auth_user");
		user.fields.push(pk());

		let plan = plan_of(vec![profile, user]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["accounts.Profile"], &plan, &mut report).unwrap();

		// One-to-one materializes a key column exactly like a foreign key.
		let key = model.column("user_id").unwrap();
		assert_eq!(key.ty, ColumnType::BigInt);
		assert_eq!(model.relations().len(), 1);
		assert_eq!(model.relations()[0].spec.kind, RelationKind::OneToOne);
		assert_eq!(model.relations()[0].target_column, "id");
		assert!(report.is_empty());
	}

	#[test]
	fn test_unbridged_target_drops_relation_only() {
		let plan = plan_of(vec![comment_spec()]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["blog.Comment"], &plan, &mut report).unwrap();

		assert!(model.relations().is_empty());
		assert!(model.column("article_id").is_none());
		assert!(report
			.for_model("blog.Comment")
			.any(|e| e.reason
				== SkipReason::RelationTargetUnavailable {
					target: "blog.Article".to_string()
				}));
	}

	#[test]
	fn test_self_referential_relation_binds() {
		let mut spec = ModelSpec::new("pages", "Page", "pages_page");
		spec.fields.push(pk());
		spec.relations.push(RelationSpec {
			kind: RelationKind::ForeignKey,
			field_name: "parent".to_string(),
			source_column: Some("parent_id".to_string()),
			target: "pages.Page".to_string(),
			related_name: Some("children".to_string()),
			on_delete: OnDeletePolicy::Cascade,
			through_table: None,
			nullable: true,
		});
		let plan = plan_of(vec![spec]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["pages.Page"], &plan, &mut report).unwrap();

		assert_eq!(model.relations().len(), 1);
		let key = model.column("parent_id").unwrap();
		assert!(key.nullable);
	}

	#[test]
	fn test_missing_decimal_precision_fails_the_model() {
		let mut spec = article_spec();
		spec.fields.push(FieldSpec::new(
			"price",
			"price",
			ColumnType::Decimal {
				max_digits: None,
				decimal_places: None,
			},
		));
		let plan = plan_of(vec![spec]);
		let mut report = SynthesisReport::new();
		let failure = synthesize(&plan["blog.Article"], &plan, &mut report).unwrap_err();

		assert_eq!(failure.model, "blog.Article");
		assert!(failure.cause.contains("price"));
	}

	#[test]
	fn test_key_column_collision_fails_the_model() {
		let mut spec = comment_spec();
		spec.fields
			.push(FieldSpec::new("article_id", "article_id", ColumnType::BigInt));
		let plan = plan_of(vec![article_spec(), spec]);
		let mut report = SynthesisReport::new();
		let failure = synthesize(&plan["blog.Comment"], &plan, &mut report).unwrap_err();
		assert!(failure.cause.contains("article_id"));
	}

	#[test]
	fn test_many_to_many_adds_no_column() {
		let mut spec = article_spec();
		spec.relations.push(RelationSpec {
			kind: RelationKind::ManyToMany,
			field_name: "tags".to_string(),
			source_column: None,
			target: "blog.Tag".to_string(),
			related_name: Some("articles".to_string()),
			on_delete: OnDeletePolicy::Cascade,
			through_table: Some("blog_article_tags".to_string()),
			nullable: false,
		});
		let mut tag = ModelSpec::new("blog", "Tag", "blog_tag");
		tag.fields.push(pk());

		let plan = plan_of(vec![spec, tag]);
		let mut report = SynthesisReport::new();
		let model = synthesize(&plan["blog.Article"], &plan, &mut report).unwrap();

		assert_eq!(model.columns().len(), 2);
		assert_eq!(model.relations().len(), 1);
		assert_eq!(
			model.relations()[0].spec.through_table.as_deref(),
			Some("blog_article_tags")
		);
	}
}
