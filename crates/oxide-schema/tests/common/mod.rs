#![allow(dead_code)]

use std::sync::Arc;

use oxide_schema::prelude::*;

/// Routes `tracing` output through the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Fresh private in-memory database.
pub async fn memory() -> Arc<dyn Driver> {
    init_tracing();
    Arc::new(
        SqliteDriver::memory()
            .await
            .unwrap_or_else(|e| panic!("Failed to open in-memory SQLite: {e}")),
    )
}

pub async fn execute(driver: &Arc<dyn Driver>, sql: &str) {
    driver
        .execute(sql, &[])
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

pub async fn query(driver: &Arc<dyn Driver>, sql: &str) -> Vec<Row> {
    driver
        .query(sql, &[])
        .await
        .unwrap_or_else(|e| panic!("Failed to query: {sql}\nError: {e}"))
}

/// Reopens `name` and asserts the live schema matches what was declared.
pub async fn assert_in_sync(driver: &Arc<dyn Driver>, declared: &Table, name: &str) {
    let reopened = Table::open(Arc::clone(driver), name).await.unwrap();
    let comparator = Comparator::new(reopened.initial_state(), declared.state());
    assert!(
        !comparator.has_changes(),
        "Table '{name}' drifted from its declaration:\n  added: {:?}\n  altered: {:?}\n  dropped: {:?}\n  indexes: +{:?} ~{:?} -{:?}\n  foreign keys: +{:?} ~{:?} -{:?}",
        comparator.added_columns().iter().map(|c| c.name()).collect::<Vec<_>>(),
        comparator.altered_columns().iter().map(|(c, _)| c.name()).collect::<Vec<_>>(),
        comparator.dropped_columns().iter().map(|c| c.name()).collect::<Vec<_>>(),
        comparator.added_indexes().iter().map(|i| i.name()).collect::<Vec<_>>(),
        comparator.altered_indexes().iter().map(|(i, _)| i.name()).collect::<Vec<_>>(),
        comparator.dropped_indexes().iter().map(|i| i.name()).collect::<Vec<_>>(),
        comparator.added_foreign_keys().iter().map(|f| f.name()).collect::<Vec<_>>(),
        comparator.altered_foreign_keys().iter().map(|(f, _)| f.name()).collect::<Vec<_>>(),
        comparator.dropped_foreign_keys().iter().map(|f| f.name()).collect::<Vec<_>>(),
    );
}
