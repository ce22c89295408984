//! Multi-table synchronization.
//!
//! The [`Reflector`] saves several tables as one unit of work: tables are
//! ordered so referenced tables come first, and foreign keys are dropped
//! before and created after every other change so no table ever points
//! at a missing column.

use std::sync::Arc;

use tracing::{info, warn};

use crate::driver::Driver;
use crate::error::Result;
use crate::handler::{handler_for, SchemaHandler, SyncBehavior};
use crate::schema::Table;

/// Saves a set of tables together.
///
/// ```ignore
/// let mut reflector = Reflector::new();
/// reflector.add_table(&mut users).add_table(&mut posts);
/// reflector.run().await?;
/// ```
#[derive(Default)]
pub struct Reflector<'a> {
    tables: Vec<&'a mut Table>,
}

struct Session {
    driver: Arc<dyn Driver>,
    handler: Box<dyn SchemaHandler>,
}

impl<'a> Reflector<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(&mut self, table: &'a mut Table) -> &mut Self {
        self.tables.push(table);
        self
    }

    /// Names of the tables with pending changes, in synchronization order.
    #[must_use]
    pub fn sorted_tables(&self) -> Vec<&str> {
        self.order()
            .into_iter()
            .map(|position| self.tables[position].name())
            .collect()
    }

    /// Applies every pending change.
    ///
    /// Runs in three phases over the sorted tables: foreign key drops,
    /// everything else, foreign key creation. Each driver's `before_sync`
    /// and `after_sync` hooks run once around the phases; `after_sync` runs
    /// even when a phase fails. Tables are committed once every phase
    /// succeeded.
    pub async fn run(&mut self) -> Result<()> {
        let order = self.order();
        if order.is_empty() {
            return Ok(());
        }
        info!(tables = order.len(), "Synchronizing tables");

        let sessions = self.sessions(&order);
        let mut started = 0;
        let mut result = Ok(());
        for session in &sessions {
            if let Err(err) = session.handler.before_sync().await {
                result = Err(err);
                break;
            }
            started += 1;
        }
        if result.is_ok() {
            result = self.run_phases(&order, &sessions).await;
        }
        for session in &sessions[..started] {
            if let Err(err) = session.handler.after_sync().await {
                warn!(error = %err, "After-sync hook failed");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result?;

        for position in order {
            self.tables[position].commit_state();
        }
        Ok(())
    }

    async fn run_phases(&mut self, order: &[usize], sessions: &[Session]) -> Result<()> {
        let phases = [
            SyncBehavior::DROP_FOREIGN_KEYS,
            SyncBehavior::DO_ALL
                - SyncBehavior::DROP_FOREIGN_KEYS
                - SyncBehavior::CREATE_FOREIGN_KEYS,
            SyncBehavior::CREATE_FOREIGN_KEYS,
        ];
        for behavior in phases {
            for &position in order {
                let table = &mut *self.tables[position];
                let Some(session) = sessions
                    .iter()
                    .find(|session| same_driver(&session.driver, table.driver()))
                else {
                    continue;
                };
                session.handler.sync_table(table, behavior).await?;
            }
        }
        Ok(())
    }

    /// One handler per distinct driver, in first-use order.
    fn sessions(&self, order: &[usize]) -> Vec<Session> {
        let mut sessions: Vec<Session> = Vec::new();
        for &position in order {
            let driver = self.tables[position].driver();
            if sessions
                .iter()
                .all(|session| !same_driver(&session.driver, driver))
            {
                sessions.push(Session {
                    driver: Arc::clone(driver),
                    handler: handler_for(Arc::clone(driver)),
                });
            }
        }
        sessions
    }

    /// Stable topological order of the tables with changes: a table comes
    /// after the tables it references. A cycle keeps the insertion order
    /// of the remaining tables.
    fn order(&self) -> Vec<usize> {
        let pending: Vec<usize> = (0..self.tables.len())
            .filter(|&position| self.tables[position].has_changes())
            .collect();
        let dependencies: Vec<Vec<usize>> = pending
            .iter()
            .map(|&position| {
                let table = &self.tables[position];
                table
                    .state()
                    .dependencies()
                    .iter()
                    .filter_map(|dependency| {
                        pending.iter().copied().find(|&other| {
                            other != position && self.tables[other].name() == dependency
                        })
                    })
                    .collect()
            })
            .collect();

        let mut sorted: Vec<usize> = Vec::with_capacity(pending.len());
        while sorted.len() < pending.len() {
            let next = pending.iter().enumerate().find(|&(slot, &position)| {
                !sorted.contains(&position)
                    && dependencies[slot]
                        .iter()
                        .all(|dependency| sorted.contains(dependency))
            });
            match next {
                Some((_, &position)) => sorted.push(position),
                None => {
                    let remaining: Vec<usize> = pending
                        .iter()
                        .copied()
                        .filter(|position| !sorted.contains(position))
                        .collect();
                    warn!(
                        tables = remaining.len(),
                        "Cyclic table dependencies, keeping declaration order"
                    );
                    sorted.extend(remaining);
                }
            }
        }
        sorted
    }
}

fn same_driver(left: &Arc<dyn Driver>, right: &Arc<dyn Driver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::driver::RecordingDriver;
    use crate::error::SchemaError;
    use crate::schema::State;

    fn declare(driver: &Arc<RecordingDriver>, name: &str, references: Option<&str>) -> Table {
        let mut table = Table::from_state(driver.clone(), State::new(name));
        table.column("id").unwrap().primary();
        if let Some(parent) = references {
            table.column("parent_id").unwrap().integer();
            table
                .foreign_key(&["parent_id"])
                .unwrap()
                .references(parent, &["id"]);
        }
        table
    }

    #[test]
    fn test_referenced_tables_come_first() {
        let driver = Arc::new(RecordingDriver::dry_run(Dialect::Postgres));
        let mut comments = declare(&driver, "comments", Some("posts"));
        let mut posts = declare(&driver, "posts", Some("users"));
        let mut users = declare(&driver, "users", None);
        let mut tags = declare(&driver, "tags", None);

        let mut reflector = Reflector::new();
        reflector
            .add_table(&mut comments)
            .add_table(&mut posts)
            .add_table(&mut users)
            .add_table(&mut tags);

        assert_eq!(
            reflector.sorted_tables(),
            vec!["users", "posts", "comments", "tags"]
        );
    }

    #[test]
    fn test_cycles_keep_declaration_order() {
        let driver = Arc::new(RecordingDriver::dry_run(Dialect::Postgres));
        let mut a = declare(&driver, "a", Some("b"));
        let mut b = declare(&driver, "b", Some("a"));
        let mut unchanged = Table::from_state(driver.clone(), State::new("c"));

        let mut reflector = Reflector::new();
        reflector
            .add_table(&mut a)
            .add_table(&mut b)
            .add_table(&mut unchanged);

        assert_eq!(reflector.sorted_tables(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_foreign_keys_created_last_with_hooks_once() {
        let driver = Arc::new(RecordingDriver::dry_run(Dialect::MySql));
        let mut posts = declare(&driver, "posts", Some("users"));
        let mut users = declare(&driver, "users", None);

        let mut reflector = Reflector::new();
        reflector.add_table(&mut posts).add_table(&mut users);
        reflector.run().await.unwrap();

        let statements = driver.statements();
        assert_eq!(statements.len(), 5);
        assert_eq!(statements[0], "SET FOREIGN_KEY_CHECKS = 0");
        assert!(statements[1].starts_with("CREATE TABLE `users`"));
        assert!(statements[2].starts_with("CREATE TABLE `posts`"));
        assert!(!statements[2].contains("FOREIGN KEY"));
        assert!(statements[3].starts_with("ALTER TABLE `posts` ADD CONSTRAINT `posts_parent_id_fk`"));
        assert_eq!(statements[4], "SET FOREIGN_KEY_CHECKS = 1");

        drop(reflector);
        assert!(!posts.has_changes());
        assert!(!users.has_changes());
    }

    #[tokio::test]
    async fn test_after_sync_runs_on_failure() {
        let driver = Arc::new(RecordingDriver::dry_run(Dialect::MySql));
        let mut broken = Table::from_state(driver.clone(), State::new("broken"));
        broken.column("body").unwrap().text().default_value("x");

        let mut reflector = Reflector::new();
        reflector.add_table(&mut broken);
        let err = reflector.run().await.unwrap_err();

        assert!(matches!(err, SchemaError::Schema(_)));
        assert_eq!(
            driver.statements(),
            vec![
                "SET FOREIGN_KEY_CHECKS = 0".to_string(),
                "SET FOREIGN_KEY_CHECKS = 1".to_string(),
            ]
        );
        drop(reflector);
        assert!(broken.has_changes());
    }
}
