//! PostgreSQL dialect.
//!
//! Enums are `character varying` columns guarded by a named check
//! constraint. Auto-increment columns render as `serial` / `bigserial` and
//! are recognized on introspection by their `nextval(...)` default.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    enum_constraint_name, enum_size, in_checks, quoted_values, sized_type, Capability, Dialect,
    DialectSpec, NativeType, ReverseRule, TypeMapping,
};
use crate::driver::{Driver, Row};
use crate::error::Result;
use crate::schema::{
    Column, ColumnField, DefaultValue, ForeignKey, ForeignKeyAction, Index, SortOrder, State,
};

use super::AbstractType as T;

pub(super) static SPEC: DialectSpec = DialectSpec {
    dialect: Dialect::Postgres,
    capabilities: &[
        Capability::InPlaceAlter,
        Capability::AlterPrimaryKey,
        Capability::NamedForeignKeys,
        Capability::RenameIndex,
    ],
    mapping: TypeMapping {
        forward: &[
            (T::Primary, NativeType::serial("integer")),
            (T::BigPrimary, NativeType::serial("bigint")),
            (T::Enum, NativeType::plain("enum")),
            (T::Boolean, NativeType::plain("boolean")),
            (T::Integer, NativeType::plain("integer")),
            (T::TinyInteger, NativeType::plain("smallint")),
            (T::SmallInteger, NativeType::plain("smallint")),
            (T::BigInteger, NativeType::plain("bigint")),
            (T::String, NativeType::sized("character varying", 255)),
            (T::Text, NativeType::plain("text")),
            (T::TinyText, NativeType::plain("text")),
            (T::MediumText, NativeType::plain("text")),
            (T::LongText, NativeType::plain("text")),
            (T::Double, NativeType::plain("double precision")),
            (T::Float, NativeType::plain("real")),
            (T::Decimal, NativeType::plain("numeric")),
            (T::Datetime, NativeType::plain("timestamp without time zone")),
            (T::Date, NativeType::plain("date")),
            (T::Time, NativeType::plain("time without time zone")),
            (T::Timestamp, NativeType::plain("timestamp with time zone")),
            (T::Binary, NativeType::plain("bytea")),
            (T::TinyBinary, NativeType::plain("bytea")),
            (T::LongBinary, NativeType::plain("bytea")),
            (T::Json, NativeType::plain("json")),
            (T::Uuid, NativeType::plain("uuid")),
        ],
        reverse: &[
            ReverseRule::serial(T::Primary, "integer"),
            ReverseRule::serial(T::BigPrimary, "bigint"),
            ReverseRule::new(T::Enum, "enum"),
            ReverseRule::new(T::Boolean, "boolean"),
            ReverseRule::new(T::Integer, "integer"),
            ReverseRule::new(T::SmallInteger, "smallint"),
            ReverseRule::new(T::BigInteger, "bigint"),
            ReverseRule::new(T::String, "character varying"),
            ReverseRule::new(T::String, "character"),
            ReverseRule::new(T::Text, "text"),
            ReverseRule::new(T::Double, "double precision"),
            ReverseRule::new(T::Float, "real"),
            ReverseRule::new(T::Decimal, "numeric"),
            ReverseRule::new(T::Datetime, "timestamp without time zone"),
            ReverseRule::new(T::Date, "date"),
            ReverseRule::new(T::Time, "time without time zone"),
            ReverseRule::new(T::Timestamp, "timestamp with time zone"),
            ReverseRule::new(T::Binary, "bytea"),
            ReverseRule::new(T::Json, "json"),
            ReverseRule::new(T::Json, "jsonb"),
            ReverseRule::new(T::Uuid, "uuid"),
        ],
    },
    column_sql,
    ignored_fields: &[ColumnField::Attributes],
    forbidden_defaults: &[],
    ordered_enums: false,
};

/// Native type as used in `CREATE TABLE` and `ALTER COLUMN ... TYPE`.
pub(crate) fn type_sql(column: &Column) -> String {
    if let Some(user_type) = column.user_type() {
        return Dialect::Postgres.quote(user_type);
    }
    match (column.internal_type(), column.is_auto_increment()) {
        ("integer", true) => "serial".to_string(),
        ("bigint", true) => "bigserial".to_string(),
        ("enum", _) => format!("character varying({})", enum_size(column)),
        _ => sized_type(column),
    }
}

/// `CHECK` clause restricting an enum column to its values.
pub(crate) fn enum_constraint_sql(column: &Column) -> String {
    let dialect = Dialect::Postgres;
    format!(
        "CONSTRAINT {} {}",
        dialect.quote(&enum_constraint_name(column)),
        super::enum_check(column)
    )
}

fn column_sql(column: &Column) -> String {
    let mut sql = format!(
        "{} {}",
        Dialect::Postgres.quote(column.name()),
        type_sql(column)
    );
    if !column.is_nullable() {
        sql.push_str(" NOT NULL");
    }
    if !column.is_auto_increment() {
        if let Some(default) = column.default_sql() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
    }
    if column.internal_type() == "enum" {
        sql.push(' ');
        sql.push_str(&enum_constraint_sql(column));
    }
    sql
}

static QUOTED_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^'((?:[^']|'')*)'(?:::[\w\s]+)?$").expect("valid quoted default regex")
});

static ANY_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^CHECK\s*\(+"?(\w+)"?\)?::[\w\s]+=\s*ANY"#).expect("valid enum check regex")
});

static FOREIGN_KEY_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^FOREIGN KEY\s*\(([^)]*)\)\s*REFERENCES\s+([^\s(]+)\s*\(([^)]*)\)(.*)$")
        .expect("valid foreign key regex")
});

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ON (DELETE|UPDATE) (CASCADE|SET NULL|SET DEFAULT|RESTRICT|NO ACTION)")
        .expect("valid action regex")
});

static INDEX_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CREATE (UNIQUE )?INDEX .* USING \w+ \((.*)\)").expect("valid index regex")
});

/// Parses a `column_default` value of `information_schema.columns`.
fn parse_default(value: &str) -> DefaultValue {
    let value = value.trim();
    if let Some(captures) = QUOTED_DEFAULT.captures(value) {
        return DefaultValue::String(captures[1].replace("''", "'"));
    }
    if value.to_uppercase().starts_with("NULL") {
        return DefaultValue::Null;
    }
    match value {
        "true" => return DefaultValue::Bool(true),
        "false" => return DefaultValue::Bool(false),
        _ => {}
    }
    let numeric = value.trim_start_matches('(').trim_end_matches(')');
    if let Ok(integer) = numeric.parse::<i64>() {
        return DefaultValue::Integer(integer);
    }
    if let Ok(float) = numeric.parse::<f64>() {
        return DefaultValue::Float(float);
    }
    DefaultValue::expression(value)
}

/// Strips identifier quotes and any schema qualifier.
fn unquote(identifier: &str) -> String {
    let identifier = identifier.trim();
    let name = identifier.rsplit('.').next().unwrap_or(identifier);
    name.trim_matches('"').replace("\"\"", "\"")
}

fn identifier_list(list: &str) -> Vec<String> {
    list.split(',').map(unquote).collect()
}

fn parse_column(table: &str, row: &Row) -> Column {
    let mut column = Column::new(Dialect::Postgres, table, row.string("column_name"));
    let data_type = row.string("data_type").to_lowercase();
    if data_type == "user-defined" {
        column.user_type = Some(row.string("udt_name"));
    }
    column.internal_type = data_type;
    column.nullable = row.bool("is_nullable");

    if let Some(length) = row.i64("character_maximum_length") {
        column.size = u32::try_from(length).unwrap_or(0);
    }
    if column.internal_type == "numeric" {
        column.precision = row
            .i64("numeric_precision")
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0);
        column.scale = row
            .i64("numeric_scale")
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0);
    }

    if let Some(default) = row.str("column_default") {
        if default.starts_with("nextval(") {
            column.auto_increment = true;
        } else {
            column.default = Some(parse_default(default));
        }
    }
    column
}

/// Reads the live state of `table` from `information_schema` and the
/// `pg_catalog`.
pub(super) async fn fetch_state(driver: &dyn Driver, table: &str) -> Result<State> {
    let dialect = Dialect::Postgres;
    let mut state = State::new(table);
    let rows = driver
        .query(
            "SELECT COUNT(*) AS count FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1",
            &[table.into()],
        )
        .await?;
    if rows.first().and_then(|row| row.i64("count")).unwrap_or(0) == 0 {
        return Ok(state);
    }
    state.set_exists(true);

    let timezone = driver.timezone();
    for row in driver
        .query(
            "SELECT column_name, data_type, udt_name, is_nullable, column_default, \
             character_maximum_length, numeric_precision, numeric_scale \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
            &[table.into()],
        )
        .await?
    {
        state.register_column(parse_column(table, &row).with_timezone(timezone));
    }

    let constraints = driver
        .query(
            "SELECT conname, contype, pg_get_constraintdef(oid) AS definition \
             FROM pg_constraint WHERE conrelid = $1::regclass \
             AND contype IN ('c', 'f', 'p') ORDER BY conname",
            &[dialect.quote(table).into()],
        )
        .await?;

    let mut primary_index = None;
    for row in &constraints {
        let name = row.string("conname");
        let definition = row.string("definition");
        match row.str("contype") {
            Some("p") => {
                let columns = definition
                    .trim_start_matches("PRIMARY KEY")
                    .trim()
                    .trim_start_matches('(')
                    .trim_end_matches(')');
                state.set_primary_keys(&identifier_list(columns));
                primary_index = Some(name);
            }
            Some("f") => {
                if let Some(fk) = parse_foreign_key(table, &name, &definition, driver.prefix()) {
                    state.register_foreign_key(fk);
                }
            }
            Some("c") => register_enum_check(&mut state, table, name, &definition),
            _ => {}
        }
    }

    for row in driver
        .query(
            "SELECT indexname, indexdef FROM pg_indexes \
             WHERE schemaname = current_schema() AND tablename = $1",
            &[table.into()],
        )
        .await?
    {
        let name = row.string("indexname");
        if primary_index.as_deref() == Some(name.as_str()) {
            continue;
        }
        if let Some(index) = parse_index(table, &name, &row.string("indexdef")) {
            state.register_index(index);
        }
    }
    Ok(state)
}

/// Marks the column guarded by an enum check constraint as an enum.
fn register_enum_check(state: &mut State, table: &str, name: String, definition: &str) {
    let by_name = state
        .columns()
        .iter()
        .find(|column| format!("{table}_{}_enum", column.name()) == name)
        .map(|column| column.name().to_string());
    let column = by_name
        .or_else(|| ANY_CHECK.captures(definition).map(|c| c[1].to_string()))
        .or_else(|| in_checks(definition).into_iter().next().map(|(c, _)| c));

    let Some(column) = column else {
        return;
    };
    let Some(column) = state.column_mut(&column) else {
        return;
    };
    column.internal_type = "enum".to_string();
    column.size = 0;
    column.enum_values = quoted_values(definition);
    column.constraints.push(name);
}

fn parse_foreign_key(table: &str, name: &str, definition: &str, prefix: &str) -> Option<ForeignKey> {
    let captures = FOREIGN_KEY_DEF.captures(definition)?;
    let mut fk = ForeignKey::new(Dialect::Postgres, table, name, prefix);
    fk.columns = identifier_list(&captures[1]);
    fk.foreign_table = unquote(&captures[2]);
    fk.foreign_keys = identifier_list(&captures[3]);
    for action in ACTION.captures_iter(&captures[4]) {
        let rule = ForeignKeyAction::parse(&action[2]);
        if action[1].eq_ignore_ascii_case("delete") {
            fk.on_delete = rule;
        } else {
            fk.on_update = rule;
        }
    }
    Some(fk)
}

fn parse_index(table: &str, name: &str, definition: &str) -> Option<Index> {
    let captures = INDEX_DEF.captures(definition)?;
    let mut index = Index::new(Dialect::Postgres, table, name);
    index.unique = captures.get(1).is_some();
    for part in captures[2].split(',') {
        let part = part.trim();
        let (column, descending) = match part.strip_suffix(" DESC") {
            Some(column) => (unquote(column), true),
            None => (unquote(part.trim_end_matches(" ASC")), false),
        };
        if descending {
            index.sort.insert(column.clone(), SortOrder::Desc);
        }
        index.columns.push(column);
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AbstractType;
    use crate::driver::{RecordingDriver, Value};

    #[test]
    fn test_column_sql() {
        let mut id = Column::new(Dialect::Postgres, "users", "id");
        id.big_primary();
        assert_eq!(id.sql_statement(), "\"id\" bigserial NOT NULL");

        let mut status = Column::new(Dialect::Postgres, "users", "status");
        status.enumeration(&["active", "disabled"]).nullable(false);
        assert_eq!(
            status.sql_statement(),
            "\"status\" character varying(8) NOT NULL CONSTRAINT \"users_status_enum\" \
             CHECK (\"status\" IN ('active', 'disabled'))"
        );

        let mut flag = Column::new(Dialect::Postgres, "users", "admin");
        flag.boolean().default_value(false);
        assert_eq!(flag.sql_statement(), "\"admin\" boolean DEFAULT FALSE");
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(
            parse_default("'draft'::character varying"),
            DefaultValue::String("draft".into())
        );
        assert_eq!(parse_default("NULL::text"), DefaultValue::Null);
        assert_eq!(parse_default("true"), DefaultValue::Bool(true));
        assert_eq!(parse_default("(-1)"), DefaultValue::Integer(-1));
        assert_eq!(parse_default("now()"), DefaultValue::expression("now()"));
    }

    #[test]
    fn test_parse_constraint_definitions() {
        let fk = parse_foreign_key(
            "posts",
            "posts_author_id_fk",
            "FOREIGN KEY (author_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE SET NULL",
            "",
        )
        .unwrap();
        assert_eq!(fk.columns(), ["author_id"]);
        assert_eq!(fk.foreign_table(), "users");
        assert_eq!(fk.delete_rule(), ForeignKeyAction::SetNull);
        assert_eq!(fk.update_rule(), ForeignKeyAction::Cascade);

        let index = parse_index(
            "posts",
            "posts_index_title",
            "CREATE UNIQUE INDEX posts_index_title ON public.posts USING btree (title, \"Created\" DESC)",
        )
        .unwrap();
        assert!(index.is_unique());
        assert_eq!(index.columns(), ["title", "Created"]);
        assert_eq!(index.sort_order("Created"), SortOrder::Desc);
    }

    #[tokio::test]
    async fn test_fetch_state_from_catalog_rows() {
        let driver = RecordingDriver::dry_run(Dialect::Postgres);
        driver.respond(
            "information_schema.tables",
            vec![Row::new().with("count", 1_i64)],
        );
        let column = |name: &str, ty: &str, nullable: &str, default: Value, length: Value| {
            Row::new()
                .with("column_name", name)
                .with("data_type", ty)
                .with("udt_name", ty)
                .with("is_nullable", nullable)
                .with("column_default", default)
                .with("character_maximum_length", length)
        };
        driver.respond(
            "information_schema.columns",
            vec![
                column(
                    "id",
                    "integer",
                    "NO",
                    Value::from("nextval('posts_id_seq'::regclass)"),
                    Value::Null,
                ),
                column(
                    "status",
                    "character varying",
                    "NO",
                    Value::from("'draft'::character varying"),
                    Value::from(5_i64),
                ),
            ],
        );
        driver.respond(
            "pg_constraint",
            vec![
                Row::new()
                    .with("conname", "posts_pkey")
                    .with("contype", "p")
                    .with("definition", "PRIMARY KEY (id)"),
                Row::new()
                    .with("conname", "posts_status_enum")
                    .with("contype", "c")
                    .with(
                        "definition",
                        "CHECK (((status)::text = ANY ((ARRAY['draft'::character varying, \
                         'live'::character varying])::text[])))",
                    ),
            ],
        );
        driver.respond(
            "pg_indexes",
            vec![Row::new()
                .with("indexname", "posts_pkey")
                .with("indexdef", "CREATE UNIQUE INDEX posts_pkey ON public.posts USING btree (id)")],
        );

        let state = fetch_state(&driver, "posts").await.unwrap();
        assert_eq!(state.primary_keys(), ["id"]);
        assert!(state.indexes().is_empty());
        assert_eq!(
            state.column("id").unwrap().abstract_type(),
            AbstractType::Primary
        );

        let status = state.column("status").unwrap();
        assert_eq!(status.abstract_type(), AbstractType::Enum);
        assert_eq!(status.enum_values(), ["draft", "live"]);
        assert_eq!(status.constraints(), ["posts_status_enum"]);

        let mut declared = Column::new(Dialect::Postgres, "posts", "status");
        declared
            .enumeration(&["live", "draft"])
            .nullable(false)
            .default_value("draft");
        assert!(declared.compare(status));
    }
}
