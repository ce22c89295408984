//! Type tables and state snapshots.

use oxide_schema::prelude::*;

#[test]
fn test_reversible_types_resolve_to_themselves() {
    for dialect in Dialect::ALL {
        let mapping = &dialect.spec().mapping;
        for abstract_type in mapping.reversible() {
            let native = mapping.native(abstract_type).unwrap_or_else(|| {
                panic!("{dialect}: {abstract_type:?} has no native type")
            });
            assert_eq!(
                mapping.resolve(native.name, native.size, native.auto_increment),
                abstract_type,
                "{dialect}: {} does not resolve back to {abstract_type:?}",
                native.name
            );
        }
    }
}

#[test]
fn test_aliased_types_resolve_to_the_wider_type() {
    let postgres = &Dialect::Postgres.spec().mapping;
    let native = postgres.native(AbstractType::TinyInteger).unwrap();
    assert_eq!(
        postgres.resolve(native.name, native.size, false),
        AbstractType::SmallInteger
    );

    let sqlite = &Dialect::Sqlite.spec().mapping;
    let native = sqlite.native(AbstractType::Json).unwrap();
    assert_eq!(
        sqlite.resolve(native.name, native.size, false),
        AbstractType::Text
    );
    assert_eq!(sqlite.resolve("geometry", 0, false), AbstractType::Unknown);
}

#[test]
fn test_declared_type_reads_back_from_native_name() {
    for dialect in Dialect::ALL {
        let mut column = Column::new(dialect, "events", "happened_at");
        column.datetime();
        assert_eq!(column.abstract_type(), AbstractType::Datetime, "{dialect}");

        let mut column = Column::new(dialect, "events", "id");
        column.primary();
        assert_eq!(column.abstract_type(), AbstractType::Primary, "{dialect}");
        assert!(column.is_auto_increment());
    }
}

#[test]
fn test_state_snapshot_survives_json() {
    let mut state = State::new("posts");
    let mut id = Column::new(Dialect::Postgres, "posts", "id");
    id.primary();
    let mut status = Column::new(Dialect::Postgres, "posts", "status");
    status
        .enumeration(&["draft", "live"])
        .nullable(false)
        .default_value("draft");
    state.register_column(id);
    state.register_column(status);
    state.set_primary_keys(&["id"]);

    let json = serde_json::to_string(&state).unwrap();
    assert!(json.contains("\"draft\""));

    let restored: State = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
    assert!(!Comparator::new(&restored, &state).has_changes());
}
