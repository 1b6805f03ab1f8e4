//! Static export of model blueprints.
//!
//! Renders the introspector's [`ModelSpec`] output as Rust source text, one
//! module per owning app. The rendered module rebuilds the exact spec data
//! the runtime path consumes, so both stay structurally equivalent by
//! construction; the host decides where to wire the files in.

use crate::error::BridgeResult;
use crate::row::SqlValue;
use crate::spec::{ColumnType, FieldSpec, ModelSpec, RelationSpec};
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Group specs by app label, preserving introspection order.
pub fn group_by_app<'a>(specs: &'a [ModelSpec]) -> IndexMap<&'a str, Vec<&'a ModelSpec>> {
	let mut apps: IndexMap<&str, Vec<&ModelSpec>> = IndexMap::new();
	for spec in specs {
		apps.entry(spec.app_label.as_str()).or_default().push(spec);
	}
	apps
}

/// Render one app's module source.
pub fn render_app_module(app_label: &str, specs: &[&ModelSpec]) -> String {
	let mut out = String::new();
	let _ = writeln!(out, "//! Bridged model blueprints for app `{app_label}`.");
	let _ = writeln!(out, "//! Generated from the owning model registry; do not edit.");
	let _ = writeln!(out);
	let _ = writeln!(out, "use ormbridge::meta::RelationKind;");
	let _ = writeln!(out, "use ormbridge::relations::OnDeletePolicy;");
	let _ = writeln!(out, "use ormbridge::row::SqlValue;");
	let _ = writeln!(
		out,
		"use ormbridge::spec::{{ColumnType, FieldSpec, ModelSpec, RelationSpec}};"
	);
	let _ = writeln!(out);

	let _ = writeln!(out, "pub fn model_specs() -> Vec<ModelSpec> {{");
	let _ = writeln!(out, "\tvec![");
	for spec in specs {
		let _ = writeln!(out, "\t\t{}(),", spec_fn_name(spec));
	}
	let _ = writeln!(out, "\t]");
	let _ = writeln!(out, "}}");

	for spec in specs {
		let _ = writeln!(out);
		render_model_fn(&mut out, spec);
	}
	out
}

/// Write one file per app under `out_dir`, named `{app_label}.rs`.
/// Returns the written paths in app order.
pub fn write_models(specs: &[ModelSpec], out_dir: &Path) -> BridgeResult<Vec<PathBuf>> {
	fs::create_dir_all(out_dir)?;
	let mut written = Vec::new();
	for (app_label, app_specs) in group_by_app(specs) {
		let path = out_dir.join(format!("{app_label}.rs"));
		fs::write(&path, render_app_module(app_label, &app_specs))?;
		tracing::info!(app = %app_label, path = %path.display(), models = app_specs.len(), "exported model module");
		written.push(path);
	}
	Ok(written)
}

fn spec_fn_name(spec: &ModelSpec) -> String {
	format!("{}_spec", spec.model_name.to_lowercase())
}

fn render_model_fn(out: &mut String, spec: &ModelSpec) {
	let _ = writeln!(out, "fn {}() -> ModelSpec {{", spec_fn_name(spec));
	let _ = writeln!(
		out,
		"\tlet mut spec = ModelSpec::new({}, {}, {});",
		quote(&spec.app_label),
		quote(&spec.model_name),
		quote(&spec.table_name)
	);
	if spec.database_alias != "default" {
		let _ = writeln!(
			out,
			"\tspec.database_alias = {}.to_string();",
			quote(&spec.database_alias)
		);
	}
	for field in &spec.fields {
		render_field(out, field);
	}
	for relation in &spec.relations {
		render_relation(out, relation);
	}
	let _ = writeln!(out, "\tspec");
	let _ = writeln!(out, "}}");
}

fn render_field(out: &mut String, field: &FieldSpec) {
	let _ = writeln!(out, "\tspec.fields.push({{");
	let _ = writeln!(
		out,
		"\t\tlet mut f = FieldSpec::new({}, {}, {});",
		quote(&field.name),
		quote(&field.column),
		render_column_type(&field.ty)
	);
	if field.nullable {
		let _ = writeln!(out, "\t\tf.nullable = true;");
	}
	if field.primary_key {
		let _ = writeln!(out, "\t\tf.primary_key = true;");
	}
	if field.generated {
		let _ = writeln!(out, "\t\tf.generated = true;");
	}
	if field.has_default {
		let _ = writeln!(out, "\t\tf.has_default = true;");
		if let Some(default) = &field.default {
			let _ = writeln!(out, "\t\tf.default = Some({});", render_value(default));
		}
	}
	if let Some(choices) = &field.choices {
		let rendered: Vec<String> = choices
			.iter()
			.map(|(value, label)| {
				format!("({}.to_string(), {}.to_string())", quote(value), quote(label))
			})
			.collect();
		let _ = writeln!(out, "\t\tf.choices = Some(vec![{}]);", rendered.join(", "));
	}
	let _ = writeln!(out, "\t\tf");
	let _ = writeln!(out, "\t}});");
}

fn render_relation(out: &mut String, relation: &RelationSpec) {
	let _ = writeln!(out, "\tspec.relations.push(RelationSpec {{");
	let _ = writeln!(out, "\t\tkind: RelationKind::{:?},", relation.kind);
	let _ = writeln!(out, "\t\tfield_name: {}.to_string(),", quote(&relation.field_name));
	let _ = writeln!(
		out,
		"\t\tsource_column: {},",
		render_opt_string(relation.source_column.as_deref())
	);
	let _ = writeln!(out, "\t\ttarget: {}.to_string(),", quote(&relation.target));
	let _ = writeln!(
		out,
		"\t\trelated_name: {},",
		render_opt_string(relation.related_name.as_deref())
	);
	let _ = writeln!(out, "\t\ton_delete: OnDeletePolicy::{:?},", relation.on_delete);
	let _ = writeln!(
		out,
		"\t\tthrough_table: {},",
		render_opt_string(relation.through_table.as_deref())
	);
	let _ = writeln!(out, "\t\tnullable: {},", relation.nullable);
	let _ = writeln!(out, "\t}});");
}

fn render_column_type(ty: &ColumnType) -> String {
	match ty {
		ColumnType::SmallInt => "ColumnType::SmallInt".to_string(),
		ColumnType::Int => "ColumnType::Int".to_string(),
		ColumnType::BigInt => "ColumnType::BigInt".to_string(),
		ColumnType::Char { max_length } => {
			format!("ColumnType::Char {{ max_length: {max_length} }}")
		}
		ColumnType::Text => "ColumnType::Text".to_string(),
		ColumnType::Bool => "ColumnType::Bool".to_string(),
		ColumnType::Date => "ColumnType::Date".to_string(),
		ColumnType::Time => "ColumnType::Time".to_string(),
		ColumnType::DateTime => "ColumnType::DateTime".to_string(),
		ColumnType::DurationMicros => "ColumnType::DurationMicros".to_string(),
		ColumnType::Decimal {
			max_digits,
			decimal_places,
		} => format!(
			"ColumnType::Decimal {{ max_digits: {}, decimal_places: {} }}",
			render_opt_u32(*max_digits),
			render_opt_u32(*decimal_places)
		),
		ColumnType::Float => "ColumnType::Float".to_string(),
		ColumnType::Binary => "ColumnType::Binary".to_string(),
		ColumnType::Uuid => "ColumnType::Uuid".to_string(),
		ColumnType::Json => "ColumnType::Json".to_string(),
	}
}

fn render_value(value: &SqlValue) -> String {
	match value {
		SqlValue::Null => "SqlValue::Null".to_string(),
		SqlValue::Bool(b) => format!("SqlValue::Bool({b})"),
		SqlValue::Int(i) => format!("SqlValue::Int({i})"),
		SqlValue::Float(f) => format!("SqlValue::Float({f:?})"),
		SqlValue::Text(s) => format!("SqlValue::Text({}.to_string())", quote(s)),
		// Richer literals round-trip through their canonical text form.
		SqlValue::Bytes(b) => format!("SqlValue::Bytes(vec!{b:?})"),
		SqlValue::Decimal(d) => format!(
			"SqlValue::Decimal({}.parse().expect(\"decimal literal\"))",
			quote(&d.to_string())
		),
		SqlValue::Date(d) => format!(
			"SqlValue::Date({}.parse().expect(\"date literal\"))",
			quote(&d.to_string())
		),
		SqlValue::Time(t) => format!(
			"SqlValue::Time({}.parse().expect(\"time literal\"))",
			quote(&t.to_string())
		),
		SqlValue::DateTime(dt) => format!(
			"SqlValue::DateTime({}.parse().expect(\"datetime literal\"))",
			quote(&dt.to_string())
		),
		SqlValue::Uuid(u) => format!(
			"SqlValue::Uuid({}.parse().expect(\"uuid literal\"))",
			quote(&u.to_string())
		),
		SqlValue::Json(j) => format!(
			"SqlValue::Json(serde_json::from_str({}).expect(\"json literal\"))",
			quote(&j.to_string())
		),
	}
}

fn render_opt_string(value: Option<&str>) -> String {
	match value {
		Some(s) => format!("Some({}.to_string())", quote(s)),
		None => "None".to_string(),
	}
}

fn render_opt_u32(value: Option<u32>) -> String {
	match value {
		Some(v) => format!("Some({v})"),
		None => "None".to_string(),
	}
}

fn quote(s: &str) -> String {
	format!("{s:?}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::meta::RelationKind;
	use crate::relations::OnDeletePolicy;

	fn article() -> ModelSpec {
		let mut spec = ModelSpec::new("blog", "Article", "blog_article");
		let mut pk = FieldSpec::new("id", "id", ColumnType::BigInt);
		pk.primary_key = true;
		pk.generated = true;
		spec.fields.push(pk);
		let mut title = FieldSpec::new("title", "title", ColumnType::Char { max_length: 200 });
		title.has_default = true;
		title.default = Some(SqlValue::Text("untitled".to_string()));
		spec.fields.push(title);
		spec
	}

	fn comment() -> ModelSpec {
		let mut spec = ModelSpec::new("blog", "Comment", "blog_comment");
		let mut pk = FieldSpec::new("id", "id", ColumnType::BigInt);
		pk.primary_key = true;
		pk.generated = true;
		spec.fields.push(pk);
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

	#[test]
	fn test_rendered_module_carries_every_model_and_field() {
		let specs = [article(), comment()];
		let refs: Vec<&ModelSpec> = specs.iter().collect();
		let source = render_app_module("blog", &refs);

		assert!(source.contains("pub fn model_specs() -> Vec<ModelSpec>"));
		assert!(source.contains("article_spec(),"));
		assert!(source.contains("comment_spec(),"));
		assert!(source.contains(r#"ModelSpec::new("blog", "Article", "blog_article")"#));
		assert!(source.contains("ColumnType::Char { max_length: 200 }"));
		assert!(source.contains(r#"f.default = Some(SqlValue::Text("untitled".to_string()));"#));
		assert!(source.contains("kind: RelationKind::ForeignKey,"));
		assert!(source.contains("on_delete: OnDeletePolicy::Cascade,"));
		assert!(source.contains(r#"target: "blog.Article".to_string(),"#));
	}

	#[test]
	fn test_default_alias_not_rendered() {
		let specs = [article()];
		let refs: Vec<&ModelSpec> = specs.iter().collect();
		let source = render_app_module("blog", &refs);
		assert!(!source.contains("database_alias"));
	}

	#[test]
	fn test_write_models_one_file_per_app() {
		let mut other = article();
		other.app_label = "shop".to_string();
		other.model_name = "Order".to_string();
		other.qualified_name = "shop.Order".to_string();
		other.table_name = "shop_order".to_string();

		let dir = tempfile::tempdir().unwrap();
		let written = write_models(&[article(), other], dir.path()).unwrap();

		assert_eq!(written.len(), 2);
		assert!(dir.path().join("blog.rs").exists());
		assert!(dir.path().join("shop.rs").exists());
		let blog = fs::read_to_string(dir.path().join("blog.rs")).unwrap();
		assert!(blog.starts_with("//! Bridged model blueprints for app `blog`."));
	}
}
