//! Lifecycle behavior against a file-backed sqlite database, so data
//! survives a close/re-open cycle and lazy re-initialization is observable.

use ormbridge::prelude::*;
use std::sync::Arc;

fn owning_registry() -> AppRegistry {
	let mut registry = AppRegistry::new();
	registry.register_model(
		ModelMeta::new("blog", "Article", "blog_article")
			.with_field(FieldMeta::new("id", "BigAutoField").primary_key())
			.with_field(FieldMeta::new("title", "CharField").with_max_length(200)),
	);
	registry
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn file_config(path: &str) -> BridgeConfig {
	init_tracing();
	BridgeConfig::new()
		.with_database("default", DatabaseSettings::new("sqlite3", path))
		.with_pool_settings("default", PoolSettings::new().with_connections(1, 1))
}

async fn bridge_with_table(path: &str) -> Bridge {
	let bridge = Bridge::new(file_config(path), &owning_registry()).unwrap();
	bridge.init().await.unwrap();
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS blog_article (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			title VARCHAR(200) NOT NULL
		)",
	)
	.execute(&bridge.pool("default").unwrap())
	.await
	.unwrap();
	bridge
}

#[tokio::test]
async fn query_after_close_lazily_reinitializes() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("app.db");
	let bridge = bridge_with_table(path.to_str().unwrap()).await;

	let articles = bridge.objects("blog.Article").unwrap();
	articles
		.create(vec![("title".to_string(), SqlValue::from("kept"))])
		.await
		.unwrap();

	bridge.close().await;
	assert_eq!(bridge.state(), LifecycleState::Closed);

	// No explicit init; the first query re-opens the pools.
	let count = articles.count().await.unwrap();
	assert_eq!(count, 1);
	assert_eq!(bridge.state(), LifecycleState::Ready);
}

#[tokio::test]
async fn first_query_triggers_lazy_init() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("app.db");
	// Create the table through a first bridge, then close it.
	let setup = bridge_with_table(path.to_str().unwrap()).await;
	setup.close().await;

	let bridge = Bridge::new(file_config(path.to_str().unwrap()), &owning_registry()).unwrap();
	assert_eq!(bridge.state(), LifecycleState::Uninitialized);

	let articles = bridge.objects("blog.Article").unwrap();
	assert_eq!(articles.count().await.unwrap(), 0);
	assert_eq!(bridge.state(), LifecycleState::Ready);
}

#[tokio::test]
async fn concurrent_first_queries_single_flight() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("app.db");
	let setup = bridge_with_table(path.to_str().unwrap()).await;
	setup.close().await;

	let bridge = Arc::new(
		Bridge::new(file_config(path.to_str().unwrap()), &owning_registry()).unwrap(),
	);
	let tasks: Vec<_> = (0..8)
		.map(|_| {
			let bridge = Arc::clone(&bridge);
			tokio::spawn(async move {
				let articles = bridge.objects("blog.Article")?;
				articles.count().await
			})
		})
		.collect();
	for task in tasks {
		assert_eq!(task.await.unwrap().unwrap(), 0);
	}
	assert_eq!(bridge.state(), LifecycleState::Ready);
}

#[tokio::test]
async fn double_init_and_double_close_are_no_ops() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("app.db");
	let bridge = bridge_with_table(path.to_str().unwrap()).await;

	bridge.init().await.unwrap();
	assert_eq!(bridge.state(), LifecycleState::Ready);

	bridge.close().await;
	bridge.close().await;
	assert_eq!(bridge.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn unmapped_backend_in_active_use_fails_init() {
	init_tracing();
	let config = BridgeConfig::new()
		.with_database("default", DatabaseSettings::new("oracle", "appdb"));
	let bridge = Bridge::new(config, &owning_registry()).unwrap();

	let err = bridge.init().await.unwrap_err();
	assert!(matches!(err, BridgeError::UnsupportedBackend { .. }));
	assert_eq!(bridge.state(), LifecycleState::Uninitialized);
}
