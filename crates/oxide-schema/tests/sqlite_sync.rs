//! End-to-end synchronization against SQLite.
//!
//! Every test declares a schema, saves it, and reopens the table to check
//! that introspection reads back exactly what was declared.

mod common;

use std::sync::Arc;

use oxide_schema::prelude::*;

async fn create_users(driver: &Arc<dyn Driver>) -> Table {
    let mut users = Table::open(Arc::clone(driver), "users").await.unwrap();
    users.column("id").unwrap().primary();
    users.column("name").unwrap().string(64).nullable(false);
    users.save().await.unwrap();
    users
}

// =============================================================================
// Creation and idempotence
// =============================================================================

#[tokio::test]
async fn test_create_table_and_reopen_without_changes() {
    let driver = common::memory().await;

    let mut users = Table::open(Arc::clone(&driver), "users").await.unwrap();
    assert!(!users.exists());
    users.column("id").unwrap().primary();
    users.column("name").unwrap().string(64).nullable(false);
    users
        .column("status")
        .unwrap()
        .enumeration(&["active", "banned"])
        .default_value("active");
    users
        .column("verified")
        .unwrap()
        .boolean()
        .default_value(false);
    users.index(&["name"]).unwrap().unique(true);
    users.save().await.unwrap();

    assert!(users.exists());
    assert!(!users.has_changes());
    common::assert_in_sync(&driver, &users, "users").await;

    let reopened = Table::open(Arc::clone(&driver), "users").await.unwrap();
    assert!(!reopened.has_changes());
    assert_eq!(reopened.primary_keys(), vec!["id".to_string()]);
    let status = reopened.state().column("status").unwrap();
    assert_eq!(status.abstract_type(), AbstractType::Enum);
    assert_eq!(status.enum_values(), ["active".to_string(), "banned".to_string()]);
    assert!(reopened.state().column("id").unwrap().is_auto_increment());
    assert!(reopened.indexes()[0].is_unique());
}

#[tokio::test]
async fn test_save_twice_issues_nothing_the_second_time() {
    let driver = common::memory().await;
    create_users(&driver).await;

    let recorder = Arc::new(RecordingDriver::wrap(Arc::clone(&driver)));
    let mut users = Table::open(recorder.clone(), "users").await.unwrap();
    users.column("id").unwrap().primary();
    users.column("name").unwrap().string(64).nullable(false);
    users.save().await.unwrap();

    assert!(recorder.statements().is_empty());
}

// =============================================================================
// Rebuilds
// =============================================================================

#[tokio::test]
async fn test_rebuild_preserves_data_across_rename_add_and_drop() {
    let driver = common::memory().await;
    let mut users = create_users(&driver).await;
    users.column("legacy").unwrap().integer();
    users.save().await.unwrap();
    common::execute(
        &driver,
        "INSERT INTO users (name, legacy) VALUES ('ada', 1), ('grace', 2)",
    )
    .await;

    let mut users = Table::open(Arc::clone(&driver), "users").await.unwrap();
    users.rename_column("name", "full_name").unwrap();
    users.drop_column("legacy").unwrap();
    users.column("age").unwrap().integer().default_value(0);
    users.save().await.unwrap();

    let rows = common::query(&driver, "SELECT id, full_name, age FROM users ORDER BY id").await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].str("full_name"), Some("ada"));
    assert_eq!(rows[1].str("full_name"), Some("grace"));
    assert_eq!(rows[1].i64("age"), Some(0));
    assert!(common::query(&driver, "SELECT name FROM sqlite_master WHERE name = 'users__rebuild'")
        .await
        .is_empty());

    common::assert_in_sync(&driver, &users, "users").await;
}

#[tokio::test]
async fn test_adding_a_column_rebuilds_the_table() {
    let driver = common::memory().await;
    create_users(&driver).await;
    common::execute(&driver, "INSERT INTO users (name) VALUES ('ada')").await;

    let recorder = Arc::new(RecordingDriver::wrap(Arc::clone(&driver)));
    let mut users = Table::open(recorder.clone(), "users").await.unwrap();
    assert!(users.exists());
    assert_eq!(users.columns().len(), 2);
    users.column("bio").unwrap().text();
    users.save().await.unwrap();

    let statements = recorder.statements();
    assert!(statements
        .iter()
        .any(|sql| sql.starts_with("CREATE TABLE \"users__rebuild\"")));
    assert!(statements
        .iter()
        .any(|sql| sql.starts_with("INSERT INTO \"users__rebuild\"")));
    assert!(statements
        .iter()
        .any(|sql| sql == "ALTER TABLE \"users__rebuild\" RENAME TO \"users\""));

    let reopened = Table::open(Arc::clone(&driver), "users").await.unwrap();
    assert!(reopened.state().column("bio").unwrap().is_nullable());
    let rows = common::query(&driver, "SELECT name, bio FROM users").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].str("name"), Some("ada"));
    assert!(rows[0].is_null("bio"));
}

#[tokio::test]
async fn test_rebuild_restores_indexes_and_foreign_keys() {
    let driver = common::memory().await;
    create_users(&driver).await;

    let mut posts = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    posts.column("id").unwrap().primary();
    posts.column("user_id").unwrap().integer().nullable(false);
    posts.column("title").unwrap().string(100);
    posts.index(&["user_id"]).unwrap();
    posts
        .foreign_key(&["user_id"])
        .unwrap()
        .references("users", &["id"])
        .on_delete(ForeignKeyAction::Cascade);
    posts.save().await.unwrap();

    let mut posts = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    posts.column("title").unwrap().text();
    posts.save().await.unwrap();

    let reopened = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    assert_eq!(reopened.indexes().len(), 1);
    assert_eq!(reopened.indexes()[0].name(), "posts_index_user_id");
    assert_eq!(reopened.foreign_keys().len(), 1);
    let fk = &reopened.foreign_keys()[0];
    assert_eq!(fk.foreign_table(), "users");
    assert_eq!(fk.delete_rule(), ForeignKeyAction::Cascade);
    common::assert_in_sync(&driver, &posts, "posts").await;

    // Enforcement is back on after the rebuild.
    let err = driver
        .execute("INSERT INTO posts (user_id, title) VALUES (42, 'orphan')", &[])
        .await
        .unwrap_err();
    assert!(err.as_statement().unwrap().is_constraint_violation());
}

async fn declare_posts(driver: &Arc<dyn Driver>) -> Table {
    let mut posts = Table::open(Arc::clone(driver), "posts").await.unwrap();
    posts.column("id").unwrap().primary();
    posts.column("user_id").unwrap().integer().nullable(false);
    posts.column("title").unwrap().string(100);
    posts.index(&["user_id"]).unwrap();
    posts
        .foreign_key(&["user_id"])
        .unwrap()
        .references("users", &["id"])
        .on_delete(ForeignKeyAction::Cascade);
    posts
}

#[tokio::test]
async fn test_altering_a_referenced_column_restores_index_and_foreign_key() {
    let driver = common::memory().await;
    create_users(&driver).await;
    let mut posts = declare_posts(&driver).await;
    posts.save().await.unwrap();
    common::execute(&driver, "INSERT INTO users (name) VALUES ('ada')").await;
    common::execute(&driver, "INSERT INTO posts (user_id, title) VALUES (1, 'hello')").await;
    let index = posts.indexes()[0].clone();
    let foreign_key = posts.foreign_keys()[0].clone();

    let mut posts = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    posts.column("user_id").unwrap().big_integer().nullable(true);
    posts.save().await.unwrap();

    let reopened = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    let user_id = reopened.state().column("user_id").unwrap();
    assert_eq!(user_id.abstract_type(), AbstractType::BigInteger);
    assert!(user_id.is_nullable());
    assert_eq!(reopened.indexes().len(), 1);
    assert!(reopened.indexes()[0].compare(&index));
    assert_eq!(reopened.foreign_keys().len(), 1);
    assert!(reopened.foreign_keys()[0].compare(&foreign_key));
    common::assert_in_sync(&driver, &posts, "posts").await;

    let rows = common::query(&driver, "SELECT user_id, title FROM posts").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].i64("user_id"), Some(1));

    // The cascade survived the rebuild.
    common::execute(&driver, "DELETE FROM users WHERE id = 1").await;
    assert!(common::query(&driver, "SELECT id FROM posts").await.is_empty());
}

#[tokio::test]
async fn test_identical_runs_issue_identical_statements() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let driver = common::memory().await;
        let recorder = Arc::new(RecordingDriver::wrap(Arc::clone(&driver)));
        let tracked: Arc<dyn Driver> = recorder.clone();
        create_users(&tracked).await;
        declare_posts(&tracked).await.save().await.unwrap();

        let mut posts = Table::open(Arc::clone(&tracked), "posts").await.unwrap();
        posts.rename_column("title", "headline").unwrap();
        posts.column("user_id").unwrap().big_integer();
        posts.save().await.unwrap();

        let mut users = Table::open(tracked, "users").await.unwrap();
        users.column("email").unwrap().string(255);
        users.index(&["email"]).unwrap().unique(true);
        users.save().await.unwrap();

        runs.push(recorder.statements());
    }

    assert!(!runs[0].is_empty());
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_primary_key_change_is_rejected() {
    let driver = common::memory().await;
    let mut users = create_users(&driver).await;

    users.set_primary_keys(&["id", "name"]).unwrap();
    let err = users.save().await.unwrap_err();

    assert!(matches!(err, SchemaError::Dbal(_)));
    assert!(users.has_changes());
}

// =============================================================================
// Indexes, renames and drops
// =============================================================================

#[tokio::test]
async fn test_index_rename_without_rebuild() {
    let driver = common::memory().await;
    let mut users = create_users(&driver).await;
    users.index(&["name"]).unwrap();
    users.save().await.unwrap();

    let recorder = Arc::new(RecordingDriver::wrap(Arc::clone(&driver)));
    let mut users = Table::open(recorder.clone(), "users").await.unwrap();
    users
        .rename_index("users_index_name", "users_by_name")
        .unwrap();
    users.save().await.unwrap();

    assert_eq!(
        recorder.statements(),
        vec![
            "DROP INDEX \"users_index_name\"".to_string(),
            "CREATE INDEX \"users_by_name\" ON \"users\" (\"name\")".to_string(),
        ]
    );
    common::assert_in_sync(&driver, &users, "users").await;
}

#[tokio::test]
async fn test_rename_table() {
    let driver = common::memory().await;
    let mut users = create_users(&driver).await;

    users.set_name("members").unwrap();
    users.save().await.unwrap();

    assert!(Table::open(Arc::clone(&driver), "members").await.unwrap().exists());
    assert!(!Table::open(Arc::clone(&driver), "users").await.unwrap().exists());
}

#[tokio::test]
async fn test_declared_drop() {
    let driver = common::memory().await;
    let mut users = create_users(&driver).await;

    users.declare_dropped().unwrap();
    users.save().await.unwrap();

    assert!(!users.exists());
    assert!(!Table::open(Arc::clone(&driver), "users").await.unwrap().exists());
}

// =============================================================================
// Reflector
// =============================================================================

#[tokio::test]
async fn test_reflector_creates_referenced_tables_first() {
    let driver = common::memory().await;

    let mut posts = Table::open(Arc::clone(&driver), "posts").await.unwrap();
    posts.column("id").unwrap().primary();
    posts.column("user_id").unwrap().integer();
    posts
        .foreign_key(&["user_id"])
        .unwrap()
        .references("users", &["id"]);

    let mut users = Table::open(Arc::clone(&driver), "users").await.unwrap();
    users.column("id").unwrap().primary();
    users.column("name").unwrap().string(32);

    let mut reflector = Reflector::new();
    reflector.add_table(&mut posts).add_table(&mut users);
    assert_eq!(reflector.sorted_tables(), vec!["users", "posts"]);
    reflector.run().await.unwrap();
    drop(reflector);

    assert!(!posts.has_changes());
    assert!(!users.has_changes());
    common::assert_in_sync(&driver, &users, "users").await;
    common::assert_in_sync(&driver, &posts, "posts").await;

    let err = driver
        .execute("INSERT INTO posts (user_id) VALUES (7)", &[])
        .await
        .unwrap_err();
    assert!(err.as_statement().unwrap().is_constraint_violation());
}

// =============================================================================
// On-disk databases and prefixes
// =============================================================================

#[tokio::test]
async fn test_prefixed_tables_persist_on_disk() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("app.db").display());

    {
        let driver: Arc<dyn Driver> = Arc::new(
            SqliteDriver::connect(DriverConfig::new(&url).prefix("app_"))
                .await
                .unwrap(),
        );
        let mut settings = Table::open(driver, "settings").await.unwrap();
        settings.column("key").unwrap().string(64).nullable(false);
        settings.column("value").unwrap().text();
        settings.set_primary_keys(&["key"]).unwrap();
        settings.save().await.unwrap();
        assert_eq!(settings.name(), "app_settings");
    }

    let driver: Arc<dyn Driver> = Arc::new(
        SqliteDriver::connect(DriverConfig::new(&url).prefix("app_"))
            .await
            .unwrap(),
    );
    let mut settings = Table::open(driver, "settings").await.unwrap();
    assert!(settings.exists());
    assert_eq!(settings.primary_keys(), vec!["key".to_string()]);

    settings.column("key").unwrap().string(64).nullable(false);
    settings.column("value").unwrap().text();
    assert!(!settings.has_changes());
}

// =============================================================================
// Type round trips
// =============================================================================

#[tokio::test]
async fn test_every_reversible_type_reads_back_unchanged() {
    let driver = common::memory().await;
    let reversible = Dialect::Sqlite.spec().mapping.reversible();
    let name = |abstract_type: AbstractType| format!("c_{abstract_type:?}").to_lowercase();

    let mut table = Table::open(Arc::clone(&driver), "kinds").await.unwrap();
    for &abstract_type in &reversible {
        let column = table.column(&name(abstract_type)).unwrap();
        if abstract_type == AbstractType::Enum {
            column.enumeration(&["on", "off"]);
        } else {
            column.set_type(abstract_type);
        }
    }
    table.save().await.unwrap();

    let reopened = Table::open(Arc::clone(&driver), "kinds").await.unwrap();
    assert!(!reopened.has_changes());
    for &abstract_type in &reversible {
        let column = reopened.state().column(&name(abstract_type)).unwrap();
        assert_eq!(column.abstract_type(), abstract_type, "{}", column.name());
    }
    assert_eq!(
        reopened.primary_keys(),
        vec![name(AbstractType::Primary)]
    );
    common::assert_in_sync(&driver, &table, "kinds").await;
}
