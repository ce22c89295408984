//! Differences between an initial and a current table state.

use super::state::ElementKind;
use super::{Column, ForeignKey, Index, State};

/// Pure diff of two states. Nothing is cached: every call recomputes.
///
/// Results follow the insertion order of the underlying collections:
/// added and altered elements in current-state order, dropped elements in
/// initial-state order. Altered pairs are `(current, initial)`.
#[derive(Debug, Clone, Copy)]
pub struct Comparator<'a> {
    initial: &'a State,
    current: &'a State,
}

impl<'a> Comparator<'a> {
    #[must_use]
    pub const fn new(initial: &'a State, current: &'a State) -> Self {
        Self { initial, current }
    }

    /// Returns whether anything differs, including table existence.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        if self.initial.exists() != self.current.exists() {
            return true;
        }
        if !self.current.exists() {
            return false;
        }
        self.is_renamed()
            || self.is_primary_changed()
            || !self.added_columns().is_empty()
            || !self.dropped_columns().is_empty()
            || !self.altered_columns().is_empty()
            || !self.added_indexes().is_empty()
            || !self.dropped_indexes().is_empty()
            || !self.altered_indexes().is_empty()
            || !self.added_foreign_keys().is_empty()
            || !self.dropped_foreign_keys().is_empty()
            || !self.altered_foreign_keys().is_empty()
    }

    /// Returns whether the table itself was renamed.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.initial.exists() && self.initial.name() != self.current.name()
    }

    /// Returns whether the primary key column list changed (order matters).
    #[must_use]
    pub fn is_primary_changed(&self) -> bool {
        self.initial.exists() && self.initial.primary_keys() != self.current.primary_keys()
    }

    #[must_use]
    pub fn added_columns(&self) -> Vec<&'a Column> {
        self.column_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.is_none().then_some(current))
            .collect()
    }

    #[must_use]
    pub fn altered_columns(&self) -> Vec<(&'a Column, &'a Column)> {
        self.column_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.map(|initial| (current, initial)))
            .filter(|(current, initial)| !current.compare(initial))
            .collect()
    }

    /// Every `(current, initial)` column pair, altered or not.
    #[must_use]
    pub fn paired_columns(&self) -> Vec<(&'a Column, &'a Column)> {
        self.column_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.map(|initial| (current, initial)))
            .collect()
    }

    #[must_use]
    pub fn dropped_columns(&self) -> Vec<&'a Column> {
        let paired: Vec<&str> = self
            .column_pairs()
            .into_iter()
            .filter_map(|(_, initial)| initial.map(Column::name))
            .collect();
        self.initial
            .columns()
            .iter()
            .filter(|column| !paired.contains(&column.name()))
            .collect()
    }

    #[must_use]
    pub fn added_indexes(&self) -> Vec<&'a Index> {
        self.index_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.is_none().then_some(current))
            .collect()
    }

    #[must_use]
    pub fn altered_indexes(&self) -> Vec<(&'a Index, &'a Index)> {
        self.index_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.map(|initial| (current, initial)))
            .filter(|(current, initial)| !current.compare(initial))
            .collect()
    }

    /// Every `(current, initial)` index pair, altered or not.
    #[must_use]
    pub fn paired_indexes(&self) -> Vec<(&'a Index, &'a Index)> {
        self.index_pairs()
            .into_iter()
            .filter_map(|(current, initial)| initial.map(|initial| (current, initial)))
            .collect()
    }

    #[must_use]
    pub fn dropped_indexes(&self) -> Vec<&'a Index> {
        let paired: Vec<&str> = self
            .index_pairs()
            .into_iter()
            .filter_map(|(_, initial)| initial.map(Index::name))
            .collect();
        self.initial
            .indexes()
            .iter()
            .filter(|index| !paired.contains(&index.name()))
            .collect()
    }

    #[must_use]
    pub fn added_foreign_keys(&self) -> Vec<&'a ForeignKey> {
        self.current
            .foreign_keys()
            .iter()
            .filter(|fk| self.initial.foreign_key(fk.name()).is_none())
            .collect()
    }

    #[must_use]
    pub fn altered_foreign_keys(&self) -> Vec<(&'a ForeignKey, &'a ForeignKey)> {
        let initial = self.initial;
        self.current
            .foreign_keys()
            .iter()
            .filter_map(|fk| initial.foreign_key(fk.name()).map(|before| (fk, before)))
            .filter(|(current, initial)| !current.compare(initial))
            .collect()
    }

    #[must_use]
    pub fn dropped_foreign_keys(&self) -> Vec<&'a ForeignKey> {
        self.initial
            .foreign_keys()
            .iter()
            .filter(|fk| self.current.foreign_key(fk.name()).is_none())
            .collect()
    }

    /// Pairs every current column with its initial counterpart. A rename
    /// intent takes precedence over a same-name match.
    fn column_pairs(&self) -> Vec<(&'a Column, Option<&'a Column>)> {
        let initial = self.initial;
        let current = self.current;
        let mut used: Vec<&str> = Vec::new();
        let mut pairs = Vec::with_capacity(current.columns().len());

        for column in current.columns() {
            let renamed = current
                .renamed_from(ElementKind::Column, column.name())
                .and_then(|from| initial.column(from))
                .filter(|candidate| !used.contains(&candidate.name()));
            let matched = renamed.or_else(|| {
                initial
                    .column(column.name())
                    .filter(|candidate| !used.contains(&candidate.name()))
                    .filter(|candidate| !renamed_away(current, ElementKind::Column, candidate.name()))
            });
            if let Some(matched) = matched {
                used.push(matched.name());
            }
            pairs.push((column, matched));
        }
        pairs
    }

    fn index_pairs(&self) -> Vec<(&'a Index, Option<&'a Index>)> {
        let initial = self.initial;
        let current = self.current;
        let mut used: Vec<&str> = Vec::new();
        let mut pairs = Vec::with_capacity(current.indexes().len());

        for index in current.indexes() {
            let renamed = current
                .renamed_from(ElementKind::Index, index.name())
                .and_then(|from| initial.index(from))
                .filter(|candidate| !used.contains(&candidate.name()));
            let matched = renamed.or_else(|| {
                initial
                    .index(index.name())
                    .filter(|candidate| !used.contains(&candidate.name()))
                    .filter(|candidate| !renamed_away(current, ElementKind::Index, candidate.name()))
            });
            if let Some(matched) = matched {
                used.push(matched.name());
            }
            pairs.push((index, matched));
        }
        pairs
    }
}

/// Whether an initial element named `name` was renamed to something that
/// still exists in the current state, so it must not pair by name.
fn renamed_away(current: &State, kind: ElementKind, name: &str) -> bool {
    current.intents().iter().any(|intent| {
        intent.kind == kind
            && intent.from == name
            && match kind {
                ElementKind::Column => current.has_column(&intent.to),
                ElementKind::Index => current.index(&intent.to).is_some(),
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    fn column(name: &str) -> Column {
        let mut column = Column::new(Dialect::Postgres, "users", name);
        column.string(255);
        column
    }

    fn users() -> State {
        let mut state = State::new("users");
        state.set_exists(true);
        let mut id = Column::new(Dialect::Postgres, "users", "id");
        id.primary();
        state.register_column(id);
        state.register_column(column("name"));
        state.register_column(column("email"));
        state
    }

    #[test]
    fn test_identical_states_have_no_changes() {
        let state = users();
        let comparator = Comparator::new(&state, &state);
        assert!(!comparator.has_changes());
        assert!(comparator.added_columns().is_empty());
        assert!(comparator.altered_columns().is_empty());
        assert!(comparator.dropped_columns().is_empty());
    }

    #[test]
    fn test_columns_partition_by_name() {
        let initial = users();
        let mut current = users();
        current.forget_column("email");
        current.register_column(column("bio"));
        current.column_mut("name").unwrap().string(100);

        let comparator = Comparator::new(&initial, &current);
        assert!(comparator.has_changes());
        let added: Vec<&str> = comparator.added_columns().iter().map(|c| c.name()).collect();
        let dropped: Vec<&str> = comparator.dropped_columns().iter().map(|c| c.name()).collect();
        let altered: Vec<&str> = comparator
            .altered_columns()
            .iter()
            .map(|(current, _)| current.name())
            .collect();
        assert_eq!(added, ["bio"]);
        assert_eq!(dropped, ["email"]);
        assert_eq!(altered, ["name"]);
    }

    #[test]
    fn test_rename_intent_pairs_columns() {
        let initial = users();
        let mut current = users();
        current.column_mut("name").unwrap().name = "full_name".to_string();
        current.record_rename(ElementKind::Column, "name", "full_name");

        let comparator = Comparator::new(&initial, &current);
        assert!(comparator.added_columns().is_empty());
        assert!(comparator.dropped_columns().is_empty());
        let altered = comparator.altered_columns();
        assert_eq!(altered.len(), 1);
        assert_eq!(altered[0].0.name(), "full_name");
        assert_eq!(altered[0].1.name(), "name");
    }

    #[test]
    fn test_name_reuse_after_rename_is_an_add() {
        let initial = users();
        let mut current = users();
        current.column_mut("name").unwrap().name = "full_name".to_string();
        current.record_rename(ElementKind::Column, "name", "full_name");
        current.register_column(column("name"));

        let comparator = Comparator::new(&initial, &current);
        let added: Vec<&str> = comparator.added_columns().iter().map(|c| c.name()).collect();
        assert_eq!(added, ["name"]);
        assert!(comparator.dropped_columns().is_empty());
    }

    #[test]
    fn test_primary_key_order_matters() {
        let mut initial = users();
        initial.set_primary_keys(&["id", "email"]);
        let mut current = initial.clone();
        current.set_primary_keys(&["email", "id"]);
        assert!(Comparator::new(&initial, &current).is_primary_changed());
    }

    #[test]
    fn test_existence_changes() {
        let initial = State::new("users");
        let mut current = users();
        assert!(Comparator::new(&initial, &current).has_changes());

        current.declare_dropped();
        let missing = State::new("users");
        assert!(!Comparator::new(&missing, &current).has_changes());

        let live = users();
        assert!(Comparator::new(&live, &current).has_changes());
    }

    #[test]
    fn test_foreign_key_diff_by_name() {
        let mut initial = users();
        let mut fk = ForeignKey::new(Dialect::Postgres, "users", "users_tenant_id_fk", "");
        fk.set_columns(&["tenant_id"]).references("tenants", &["id"]);
        initial.register_foreign_key(fk.clone());

        let mut current = initial.clone();
        current
            .find_foreign_key_mut(&["tenant_id"])
            .unwrap()
            .on_delete(crate::schema::ForeignKeyAction::Cascade);
        let comparator = Comparator::new(&initial, &current);
        assert_eq!(comparator.altered_foreign_keys().len(), 1);

        current.forget_foreign_key("users_tenant_id_fk");
        let comparator = Comparator::new(&initial, &current);
        assert_eq!(comparator.dropped_foreign_keys()[0].name(), fk.name());
        assert!(comparator.added_foreign_keys().is_empty());
    }
}
