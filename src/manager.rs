//! Async query manager.
//!
//! [`Objects`] is the per-model handle the host queries through; it forwards
//! everything to sqlx against the synthesized descriptor, never touching the
//! owning ORM. Statements are built with sea-query and rendered for the
//! alias's backend; results come back as [`Instance`] maps.
//!
//! Every operation ensures lifecycle readiness first (the lazy single-flight
//! path), and the init lock is never held across a database round-trip.

use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::{Backend, ConnectionLifecycle};
use crate::row::{Instance, SqlValue};
use crate::spec::{ColumnType, FieldSpec};
use crate::synth::SynthesizedModel;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sea_query::{
	Alias, Expr, ExprTrait, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query,
	QueryStatementWriter, SqliteQueryBuilder,
};
use sqlx::any::AnyRow;
use sqlx::{Row, ValueRef};
use std::sync::Arc;
use uuid::Uuid;

/// Comparison operators usable in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	Contains,
	StartsWith,
	EndsWith,
	In,
	IsNull,
	IsNotNull,
}

/// Right-hand side of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
	Value(SqlValue),
	List(Vec<SqlValue>),
	None,
}

impl From<SqlValue> for FilterValue {
	fn from(value: SqlValue) -> Self {
		FilterValue::Value(value)
	}
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: FilterValue,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
		Self {
			field: field.into(),
			operator,
			value,
		}
	}

	pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		Self::new(field, FilterOperator::Eq, FilterValue::Value(value.into()))
	}

	pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		Self::new(field, FilterOperator::Ne, FilterValue::Value(value.into()))
	}

	pub fn gt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		Self::new(field, FilterOperator::Gt, FilterValue::Value(value.into()))
	}

	pub fn lt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		Self::new(field, FilterOperator::Lt, FilterValue::Value(value.into()))
	}

	pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
		Self::new(
			field,
			FilterOperator::Contains,
			FilterValue::Value(SqlValue::Text(value.into())),
		)
	}

	pub fn is_in(field: impl Into<String>, values: Vec<SqlValue>) -> Self {
		Self::new(field, FilterOperator::In, FilterValue::List(values))
	}

	pub fn is_null(field: impl Into<String>) -> Self {
		Self::new(field, FilterOperator::IsNull, FilterValue::None)
	}

	pub fn is_not_null(field: impl Into<String>) -> Self {
		Self::new(field, FilterOperator::IsNotNull, FilterValue::None)
	}
}

/// Query-manager handle for one bridged model.
#[derive(Debug, Clone)]
pub struct Objects {
	model: Arc<SynthesizedModel>,
	lifecycle: Arc<ConnectionLifecycle>,
}

impl Objects {
	pub fn new(model: Arc<SynthesizedModel>, lifecycle: Arc<ConnectionLifecycle>) -> Self {
		Self { model, lifecycle }
	}

	/// The underlying synthesized descriptor, for callers that need the
	/// raw column/relation layout.
	pub fn synthesized(&self) -> &SynthesizedModel {
		&self.model
	}

	fn queryset(&self) -> BridgeQuerySet {
		BridgeQuerySet {
			model: Arc::clone(&self.model),
			lifecycle: Arc::clone(&self.lifecycle),
			filters: Vec::new(),
			excludes: Vec::new(),
			order: Vec::new(),
			limit: None,
			offset: None,
		}
	}

	pub fn filter(&self, filter: Filter) -> BridgeQuerySet {
		self.queryset().filter(filter)
	}

	pub fn exclude(&self, filter: Filter) -> BridgeQuerySet {
		self.queryset().exclude(filter)
	}

	pub fn order_by(&self, fields: &[&str]) -> BridgeQuerySet {
		self.queryset().order_by(fields)
	}

	pub fn limit(&self, limit: u64) -> BridgeQuerySet {
		self.queryset().limit(limit)
	}

	pub async fn all(&self) -> BridgeResult<Vec<Instance>> {
		self.queryset().all().await
	}

	pub async fn count(&self) -> BridgeResult<u64> {
		self.queryset().count().await
	}

	pub async fn exists(&self) -> BridgeResult<bool> {
		self.queryset().exists().await
	}

	/// Fetch exactly one row matching the filters.
	pub async fn get(&self, filters: Vec<Filter>) -> BridgeResult<Instance> {
		let mut qs = self.queryset();
		for filter in filters {
			qs = qs.filter(filter);
		}
		qs.get().await
	}

	/// Fetch the row matching `lookups`, creating it when absent.
	///
	/// Returns the instance and whether it was created. `defaults` only
	/// applies on the create path, after the lookup values.
	pub async fn get_or_create(
		&self,
		lookups: Vec<(String, SqlValue)>,
		defaults: Vec<(String, SqlValue)>,
	) -> BridgeResult<(Instance, bool)> {
		let filters = lookups
			.iter()
			.map(|(field, value)| Filter::eq(field.clone(), value.clone()))
			.collect();
		match self.get(filters).await {
			Ok(existing) => Ok((existing, false)),
			Err(BridgeError::DoesNotExist(_)) => {
				let mut values = lookups;
				values.extend(defaults);
				let created = self.create(values).await?;
				Ok((created, true))
			}
			Err(other) => Err(other),
		}
	}

	/// Insert one row and return it as stored.
	///
	/// Columns the caller leaves out receive the owning field's declared
	/// default when one exists; the owning ORM applies defaults client-side,
	/// so the table itself cannot be relied on to fill them in.
	pub async fn create(&self, values: Vec<(String, SqlValue)>) -> BridgeResult<Instance> {
		self.lifecycle.ensure_ready().await?;
		let pool = self.lifecycle.pool(&self.model.database_alias)?;
		let backend = self.lifecycle.backend(&self.model.database_alias)?;

		let row_values = insert_row(&self.model, values)?;
		let columns: Vec<Alias> = row_values.iter().map(|(c, _)| Alias::new(c)).collect();
		let mut stmt = Query::insert();
		stmt.into_table(Alias::new(&self.model.table_name));
		stmt.columns(columns);
		stmt.values(row_values.iter().map(|(_, v)| Expr::val(v.clone())))
			.map_err(|e| BridgeError::QueryBuild(e.to_string()))?;

		if backend.supports_returning() {
			stmt.returning_all();
			let sql = render(&stmt, backend);
			tracing::debug!(model = %self.model.qualified_name, %sql, "create");
			let row = sqlx::query(&sql).fetch_one(&pool).await?;
			return decode_row(&self.model, &row);
		}

		// MySQL path: no RETURNING. Insert, then read the row back through
		// the generated key (or the caller-supplied key).
		let sql = render(&stmt, backend);
		tracing::debug!(model = %self.model.qualified_name, %sql, "create");
		sqlx::query(&sql).execute(&pool).await?;

		let pk = self
			.model
			.primary_key()
			.ok_or_else(|| {
				BridgeError::QueryBuild(format!(
					"model '{}' has no primary key column",
					self.model.qualified_name
				))
			})?
			.clone();
		let key_value = match row_values.iter().find(|(c, _)| *c == pk.column) {
			Some((_, provided)) => provided.clone(),
			None => {
				let row = sqlx::query("SELECT LAST_INSERT_ID()").fetch_one(&pool).await?;
				let id: i64 = row.try_get(0).map_err(|e| BridgeError::Decode {
					model: self.model.qualified_name.clone(),
					column: pk.column.clone(),
					cause: e.to_string(),
				})?;
				SqlValue::Int(id)
			}
		};
		self.get(vec![Filter::new(
			pk.name.clone(),
			FilterOperator::Eq,
			FilterValue::Value(key_value),
		)])
		.await
	}

	/// Insert many rows in one statement. Returns the number inserted.
	pub async fn bulk_create(&self, rows: Vec<Vec<(String, SqlValue)>>) -> BridgeResult<u64> {
		if rows.is_empty() {
			return Ok(0);
		}
		self.lifecycle.ensure_ready().await?;
		let pool = self.lifecycle.pool(&self.model.database_alias)?;
		let backend = self.lifecycle.backend(&self.model.database_alias)?;

		// All rows share the first row's column layout after defaults.
		let first = insert_row(&self.model, rows[0].clone())?;
		let column_names: Vec<String> = first.iter().map(|(c, _)| c.clone()).collect();

		let mut stmt = Query::insert();
		stmt.into_table(Alias::new(&self.model.table_name));
		stmt.columns(column_names.iter().map(Alias::new));
		for row in rows {
			let mut encoded = insert_row(&self.model, row)?;
			let mut ordered = Vec::with_capacity(column_names.len());
			for name in &column_names {
				let position = encoded.iter().position(|(c, _)| c == name).ok_or_else(|| {
					BridgeError::QueryBuild(format!(
						"bulk_create rows disagree on columns; '{name}' missing"
					))
				})?;
				ordered.push(Expr::val(encoded.remove(position).1));
			}
			if !encoded.is_empty() {
				return Err(BridgeError::QueryBuild(
					"bulk_create rows disagree on columns".to_string(),
				));
			}
			stmt.values(ordered)
				.map_err(|e| BridgeError::QueryBuild(e.to_string()))?;
		}

		let sql = render(&stmt, backend);
		tracing::debug!(model = %self.model.qualified_name, %sql, "bulk_create");
		let result = sqlx::query(&sql).execute(&pool).await?;
		Ok(result.rows_affected())
	}

	pub async fn update(
		&self,
		filters: Vec<Filter>,
		values: Vec<(String, SqlValue)>,
	) -> BridgeResult<u64> {
		let mut qs = self.queryset();
		for filter in filters {
			qs = qs.filter(filter);
		}
		qs.update(values).await
	}

	pub async fn delete(&self, filters: Vec<Filter>) -> BridgeResult<u64> {
		let mut qs = self.queryset();
		for filter in filters {
			qs = qs.filter(filter);
		}
		qs.delete().await
	}
}

/// Chainable, lazily-executed query.
#[derive(Debug, Clone)]
pub struct BridgeQuerySet {
	model: Arc<SynthesizedModel>,
	lifecycle: Arc<ConnectionLifecycle>,
	filters: Vec<Filter>,
	excludes: Vec<Filter>,
	order: Vec<(String, bool)>,
	limit: Option<u64>,
	offset: Option<u64>,
}

impl BridgeQuerySet {
	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter);
		self
	}

	/// Negated filter; rows matching it are left out.
	pub fn exclude(mut self, filter: Filter) -> Self {
		self.excludes.push(filter);
		self
	}

	/// Ordering fields; a `-` prefix means descending.
	pub fn order_by(mut self, fields: &[&str]) -> Self {
		for field in fields {
			match field.strip_prefix('-') {
				Some(name) => self.order.push((name.to_string(), true)),
				None => self.order.push((field.to_string(), false)),
			}
		}
		self
	}

	pub fn limit(mut self, limit: u64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: u64) -> Self {
		self.offset = Some(offset);
		self
	}

	async fn connection(&self) -> BridgeResult<(sqlx::AnyPool, Backend)> {
		self.lifecycle.ensure_ready().await?;
		Ok((
			self.lifecycle.pool(&self.model.database_alias)?,
			self.lifecycle.backend(&self.model.database_alias)?,
		))
	}

	fn select_statement(&self) -> BridgeResult<sea_query::SelectStatement> {
		let mut stmt = Query::select();
		stmt.from(Alias::new(&self.model.table_name));
		for column in self.model.columns() {
			stmt.column(Alias::new(&column.column));
		}
		for filter in &self.filters {
			stmt.and_where(condition(&self.model, filter)?);
		}
		for filter in &self.excludes {
			stmt.and_where(condition(&self.model, filter)?.not());
		}
		for (field, descending) in &self.order {
			let column = resolve_column(&self.model, field)?;
			let direction = if *descending { Order::Desc } else { Order::Asc };
			stmt.order_by(Alias::new(&column.column), direction);
		}
		if let Some(limit) = self.limit {
			stmt.limit(limit);
		}
		if let Some(offset) = self.offset {
			stmt.offset(offset);
		}
		Ok(stmt)
	}

	pub async fn all(self) -> BridgeResult<Vec<Instance>> {
		let (pool, backend) = self.connection().await?;
		let sql = render(&self.select_statement()?, backend);
		tracing::debug!(model = %self.model.qualified_name, %sql, "select");
		let rows = sqlx::query(&sql).fetch_all(&pool).await?;
		rows.iter().map(|row| decode_row(&self.model, row)).collect()
	}

	pub async fn first(self) -> BridgeResult<Option<Instance>> {
		let mut rows = self.limit(1).all().await?;
		Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
	}

	/// Exactly one matching row, in the owning ORM's `get` tradition.
	pub async fn get(self) -> BridgeResult<Instance> {
		let model = self.model.qualified_name.clone();
		let mut rows = self.limit(2).all().await?;
		match rows.len() {
			0 => Err(BridgeError::DoesNotExist(model)),
			1 => Ok(rows.remove(0)),
			_ => Err(BridgeError::MultipleObjectsReturned(model)),
		}
	}

	pub async fn count(self) -> BridgeResult<u64> {
		let (pool, backend) = self.connection().await?;
		let mut stmt = Query::select();
		stmt.expr(Expr::cust("COUNT(*)"));
		stmt.from(Alias::new(&self.model.table_name));
		for filter in &self.filters {
			stmt.and_where(condition(&self.model, filter)?);
		}
		for filter in &self.excludes {
			stmt.and_where(condition(&self.model, filter)?.not());
		}
		let sql = render(&stmt, backend);
		let row = sqlx::query(&sql).fetch_one(&pool).await?;
		let count: i64 = row.try_get(0).map_err(|e| BridgeError::Decode {
			model: self.model.qualified_name.clone(),
			column: "COUNT(*)".to_string(),
			cause: e.to_string(),
		})?;
		Ok(Ord::max(count, 0) as u64)
	}

	pub async fn exists(self) -> BridgeResult<bool> {
		Ok(self.limit(1).count().await? > 0)
	}

	pub async fn update(self, values: Vec<(String, SqlValue)>) -> BridgeResult<u64> {
		if values.is_empty() {
			return Ok(0);
		}
		let (pool, backend) = self.connection().await?;
		let mut stmt = Query::update();
		stmt.table(Alias::new(&self.model.table_name));
		for (field, value) in values {
			let column = resolve_column(&self.model, &field)?;
			stmt.value(Alias::new(&column.column), Expr::val(value));
		}
		for filter in &self.filters {
			stmt.and_where(condition(&self.model, filter)?);
		}
		for filter in &self.excludes {
			stmt.and_where(condition(&self.model, filter)?.not());
		}
		let sql = render(&stmt, backend);
		tracing::debug!(model = %self.model.qualified_name, %sql, "update");
		let result = sqlx::query(&sql).execute(&pool).await?;
		Ok(result.rows_affected())
	}

	pub async fn delete(self) -> BridgeResult<u64> {
		let (pool, backend) = self.connection().await?;
		let mut stmt = Query::delete();
		stmt.from_table(Alias::new(&self.model.table_name));
		for filter in &self.filters {
			stmt.and_where(condition(&self.model, filter)?);
		}
		for filter in &self.excludes {
			stmt.and_where(condition(&self.model, filter)?.not());
		}
		let sql = render(&stmt, backend);
		tracing::debug!(model = %self.model.qualified_name, %sql, "delete");
		let result = sqlx::query(&sql).execute(&pool).await?;
		Ok(result.rows_affected())
	}
}

fn render<S: QueryStatementWriter>(stmt: &S, backend: Backend) -> String {
	match backend {
		Backend::Sqlite => stmt.to_string(SqliteQueryBuilder),
		Backend::Postgres => stmt.to_string(PostgresQueryBuilder),
		Backend::MySql => stmt.to_string(MysqlQueryBuilder),
	}
}

fn resolve_column<'a>(model: &'a SynthesizedModel, field: &str) -> BridgeResult<&'a FieldSpec> {
	model.column(field).ok_or_else(|| BridgeError::UnknownField {
		model: model.qualified_name.clone(),
		field: field.to_string(),
	})
}

/// Build one WHERE condition.
fn condition(model: &SynthesizedModel, filter: &Filter) -> BridgeResult<Expr> {
	let column = resolve_column(model, &filter.field)?;
	let col = Expr::col(Alias::new(&column.column));

	let single = || -> BridgeResult<Expr> {
		match &filter.value {
			FilterValue::Value(v) => Ok(Expr::val(v.clone())),
			_ => Err(BridgeError::QueryBuild(format!(
				"filter on '{}' requires a single value",
				filter.field
			))),
		}
	};
	let text = || -> BridgeResult<String> {
		match &filter.value {
			FilterValue::Value(SqlValue::Text(s)) => Ok(s.clone()),
			_ => Err(BridgeError::QueryBuild(format!(
				"pattern filter on '{}' requires a text value",
				filter.field
			))),
		}
	};

	Ok(match filter.operator {
		FilterOperator::Eq => col.eq(single()?),
		FilterOperator::Ne => col.ne(single()?),
		FilterOperator::Gt => col.gt(single()?),
		FilterOperator::Gte => col.gte(single()?),
		FilterOperator::Lt => col.lt(single()?),
		FilterOperator::Lte => col.lte(single()?),
		FilterOperator::Contains => col.like(format!("%{}%", text()?)),
		FilterOperator::StartsWith => col.like(format!("{}%", text()?)),
		FilterOperator::EndsWith => col.like(format!("%{}", text()?)),
		FilterOperator::In => match &filter.value {
			FilterValue::List(values) if values.is_empty() => Expr::cust("1 = 0"),
			FilterValue::List(values) => {
				col.is_in(values.iter().cloned().map(Expr::val))
			}
			_ => {
				return Err(BridgeError::QueryBuild(format!(
					"IN filter on '{}' requires a value list",
					filter.field
				)));
			}
		},
		FilterOperator::IsNull => col.is_null(),
		FilterOperator::IsNotNull => col.is_not_null(),
	})
}

/// Resolve caller-supplied values into `(column, value)` pairs for INSERT,
/// filling declared defaults for columns the caller left out.
fn insert_row(
	model: &SynthesizedModel,
	values: Vec<(String, SqlValue)>,
) -> BridgeResult<Vec<(String, SqlValue)>> {
	let mut provided: Vec<(String, SqlValue)> = Vec::with_capacity(values.len());
	for (field, value) in values {
		let column = resolve_column(model, &field)?;
		if provided.iter().any(|(c, _)| *c == column.column) {
			return Err(BridgeError::QueryBuild(format!(
				"column '{}' supplied more than once",
				column.column
			)));
		}
		provided.push((column.column.clone(), value));
	}

	for column in model.columns() {
		if column.generated || provided.iter().any(|(c, _)| *c == column.column) {
			continue;
		}
		// The owning ORM applies field defaults in application code, so the
		// bridge has to do the same; the table carries no default clause.
		if column.has_default {
			let default = column.default.clone().unwrap_or(SqlValue::Null);
			provided.push((column.column.clone(), default));
		}
	}

	if provided.is_empty() {
		return Err(BridgeError::QueryBuild("no values to insert".to_string()));
	}
	Ok(provided)
}

/// Decode one result row into an [`Instance`].
///
/// The Any driver exposes a small common type set, so richer types travel
/// through their text representation and are parsed here; booleans tolerate
/// integer-affinity storage.
fn decode_row(model: &SynthesizedModel, row: &AnyRow) -> BridgeResult<Instance> {
	let mut instance = Instance::new(&model.qualified_name);
	for column in model.columns() {
		let value = decode_column(model, column, row)?;
		instance.set(&column.name, value);
	}
	Ok(instance)
}

fn decode_column(
	model: &SynthesizedModel,
	column: &FieldSpec,
	row: &AnyRow,
) -> BridgeResult<SqlValue> {
	let decode_err = |cause: String| BridgeError::Decode {
		model: model.qualified_name.clone(),
		column: column.column.clone(),
		cause,
	};
	let name = column.column.as_str();

	let raw = row.try_get_raw(name).map_err(|e| decode_err(e.to_string()))?;
	if raw.is_null() {
		return Ok(SqlValue::Null);
	}

	let value = match &column.ty {
		ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt | ColumnType::DurationMicros => {
			SqlValue::Int(row.try_get::<i64, _>(name).map_err(|e| decode_err(e.to_string()))?)
		}
		ColumnType::Bool => match row.try_get::<bool, _>(name) {
			Ok(b) => SqlValue::Bool(b),
			// sqlite stores booleans with integer affinity
			Err(_) => SqlValue::Bool(
				row.try_get::<i64, _>(name)
					.map_err(|e| decode_err(e.to_string()))?
					!= 0,
			),
		},
		ColumnType::Float => {
			SqlValue::Float(row.try_get::<f64, _>(name).map_err(|e| decode_err(e.to_string()))?)
		}
		ColumnType::Char { .. } | ColumnType::Text => {
			SqlValue::Text(row.try_get::<String, _>(name).map_err(|e| decode_err(e.to_string()))?)
		}
		ColumnType::Binary => SqlValue::Bytes(
			row.try_get::<Vec<u8>, _>(name)
				.map_err(|e| decode_err(e.to_string()))?,
		),
		ColumnType::Date => {
			let text = row
				.try_get::<String, _>(name)
				.map_err(|e| decode_err(e.to_string()))?;
			SqlValue::Date(
				NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| decode_err(e.to_string()))?,
			)
		}
		ColumnType::Time => {
			let text = row
				.try_get::<String, _>(name)
				.map_err(|e| decode_err(e.to_string()))?;
			SqlValue::Time(
				NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
					.map_err(|e| decode_err(e.to_string()))?,
			)
		}
		ColumnType::DateTime => {
			let text = row
				.try_get::<String, _>(name)
				.map_err(|e| decode_err(e.to_string()))?;
			SqlValue::DateTime(parse_datetime(&text).map_err(decode_err)?)
		}
		ColumnType::Decimal { .. } => {
			match row.try_get::<String, _>(name) {
				Ok(text) => SqlValue::Decimal(
					text.parse::<Decimal>().map_err(|e| decode_err(e.to_string()))?,
				),
				// sqlite may hand a numeric back as a float
				Err(_) => {
					let f = row
						.try_get::<f64, _>(name)
						.map_err(|e| decode_err(e.to_string()))?;
					SqlValue::Decimal(
						Decimal::try_from(f).map_err(|e| decode_err(e.to_string()))?,
					)
				}
			}
		}
		ColumnType::Uuid => {
			let text = row
				.try_get::<String, _>(name)
				.map_err(|e| decode_err(e.to_string()))?;
			SqlValue::Uuid(Uuid::parse_str(&text).map_err(|e| decode_err(e.to_string()))?)
		}
		ColumnType::Json => {
			let text = row
				.try_get::<String, _>(name)
				.map_err(|e| decode_err(e.to_string()))?;
			SqlValue::Json(serde_json::from_str(&text).map_err(|e| decode_err(e.to_string()))?)
		}
	};
	Ok(value)
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, String> {
	for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
		if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
			return Ok(parsed);
		}
	}
	Err(format!("unrecognized datetime '{text}'"))
}
