//! MySQL dialect.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    group_rows, quoted_values, sized_type, Capability, Dialect, DialectSpec, NativeType,
    ReverseRule, TypeMapping,
};
use crate::driver::{Driver, Row};
use crate::error::Result;
use crate::schema::{
    Column, DefaultValue, ForeignKey, ForeignKeyAction, Index, SortOrder, State,
};

use super::AbstractType as T;

pub(super) static SPEC: DialectSpec = DialectSpec {
    dialect: Dialect::MySql,
    capabilities: &[
        Capability::InPlaceAlter,
        Capability::AlterPrimaryKey,
        Capability::NamedForeignKeys,
        Capability::DeferredConstraintChecks,
        Capability::RenameIndex,
    ],
    mapping: TypeMapping {
        forward: &[
            (T::Primary, NativeType::serial("int")),
            (T::BigPrimary, NativeType::serial("bigint")),
            (T::Enum, NativeType::plain("enum")),
            (T::Boolean, NativeType::sized("tinyint", 1)),
            (T::Integer, NativeType::plain("int")),
            (T::TinyInteger, NativeType::plain("tinyint")),
            (T::SmallInteger, NativeType::plain("smallint")),
            (T::BigInteger, NativeType::plain("bigint")),
            (T::String, NativeType::sized("varchar", 255)),
            (T::Text, NativeType::plain("text")),
            (T::TinyText, NativeType::plain("tinytext")),
            (T::MediumText, NativeType::plain("mediumtext")),
            (T::LongText, NativeType::plain("longtext")),
            (T::Double, NativeType::plain("double")),
            (T::Float, NativeType::plain("float")),
            (T::Decimal, NativeType::plain("decimal")),
            (T::Datetime, NativeType::plain("datetime")),
            (T::Date, NativeType::plain("date")),
            (T::Time, NativeType::plain("time")),
            (T::Timestamp, NativeType::plain("timestamp")),
            (T::Binary, NativeType::plain("blob")),
            (T::TinyBinary, NativeType::plain("tinyblob")),
            (T::LongBinary, NativeType::plain("longblob")),
            (T::Json, NativeType::plain("json")),
            (T::Uuid, NativeType::sized("varchar", 36)),
        ],
        reverse: &[
            ReverseRule::serial(T::Primary, "int"),
            ReverseRule::serial(T::BigPrimary, "bigint"),
            ReverseRule::sized(T::Boolean, "tinyint", 1),
            ReverseRule::new(T::Enum, "enum"),
            ReverseRule::new(T::Integer, "int"),
            ReverseRule::new(T::Integer, "mediumint"),
            ReverseRule::new(T::TinyInteger, "tinyint"),
            ReverseRule::new(T::SmallInteger, "smallint"),
            ReverseRule::new(T::BigInteger, "bigint"),
            ReverseRule::sized(T::Uuid, "varchar", 36),
            ReverseRule::new(T::String, "varchar"),
            ReverseRule::new(T::String, "char"),
            ReverseRule::new(T::Text, "text"),
            ReverseRule::new(T::TinyText, "tinytext"),
            ReverseRule::new(T::MediumText, "mediumtext"),
            ReverseRule::new(T::LongText, "longtext"),
            ReverseRule::new(T::Double, "double"),
            ReverseRule::new(T::Float, "float"),
            ReverseRule::new(T::Decimal, "decimal"),
            ReverseRule::new(T::Datetime, "datetime"),
            ReverseRule::new(T::Date, "date"),
            ReverseRule::new(T::Time, "time"),
            ReverseRule::new(T::Timestamp, "timestamp"),
            ReverseRule::new(T::Binary, "blob"),
            ReverseRule::new(T::TinyBinary, "tinyblob"),
            ReverseRule::new(T::LongBinary, "longblob"),
            ReverseRule::new(T::Json, "json"),
        ],
    },
    column_sql,
    ignored_fields: &[],
    forbidden_defaults: &[
        "text",
        "tinytext",
        "mediumtext",
        "longtext",
        "blob",
        "tinyblob",
        "mediumblob",
        "longblob",
        "json",
    ],
    ordered_enums: true,
};

const INTEGER_TYPES: [&str; 5] = ["tinyint", "smallint", "mediumint", "int", "bigint"];

const NUMERIC_TYPES: [&str; 9] = [
    "tinyint", "smallint", "mediumint", "int", "bigint", "decimal", "numeric", "float", "double",
];

fn column_sql(column: &Column) -> String {
    let dialect = Dialect::MySql;
    let mut sql = dialect.quote(column.name());
    sql.push(' ');

    let internal_type = column.internal_type();
    if internal_type == "enum" || internal_type == "set" {
        let values = column
            .enum_values()
            .iter()
            .map(|value| dialect.quote_string(value))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!("{internal_type}({values})"));
    } else {
        sql.push_str(&sized_type(column));
    }

    let attributes = column.attributes();
    if attributes.unsigned {
        sql.push_str(" unsigned");
    }
    if attributes.zerofill {
        sql.push_str(" zerofill");
    }

    sql.push_str(if column.is_nullable() { " NULL" } else { " NOT NULL" });
    if let Some(default) = column.default_sql() {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }
    if column.is_auto_increment() {
        sql.push_str(" AUTO_INCREMENT");
    }
    sql
}

static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([a-z]+)\s*(?:\((.*)\))?\s*(.*)$").expect("valid column type regex")
});

/// Parses a `SHOW FULL COLUMNS` row.
fn parse_column(table: &str, row: &Row) -> Column {
    let mut column = Column::new(Dialect::MySql, table, row.string("Field"));
    let declared = row.string("Type");

    if let Some(captures) = COLUMN_TYPE.captures(&declared) {
        let name = captures[1].to_lowercase();
        let arguments = captures.get(2).map_or("", |m| m.as_str());
        let options = captures.get(3).map_or("", |m| m.as_str()).to_lowercase();

        if name == "enum" || name == "set" {
            column.enum_values = quoted_values(arguments);
        } else {
            let numbers: Vec<u32> = arguments
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect();
            match numbers.as_slice() {
                [precision, scale] => {
                    column.precision = *precision;
                    column.scale = *scale;
                }
                [size] => column.size = *size,
                _ => {}
            }
        }
        // Integer display widths carry no meaning, except for booleans.
        if INTEGER_TYPES.contains(&name.as_str()) && !(name == "tinyint" && column.size == 1) {
            column.size = 0;
        }

        column.attributes.unsigned = options.contains("unsigned");
        column.attributes.zerofill = options.contains("zerofill");
        column.internal_type = name;
    } else {
        column.internal_type = declared.to_lowercase();
    }

    column.nullable = row.str("Null").is_some_and(|value| value.eq_ignore_ascii_case("yes"));
    let extra = row.string("Extra").to_lowercase();
    column.auto_increment = extra.contains("auto_increment");
    column.default = row
        .str("Default")
        .map(|value| parse_default(&column, value, extra.contains("default_generated")));
    column
}

/// `SHOW FULL COLUMNS` reports defaults unquoted; the column type decides
/// how to read them.
fn parse_default(column: &Column, value: &str, generated: bool) -> DefaultValue {
    if generated || value.to_uppercase().starts_with("CURRENT_TIMESTAMP") {
        return DefaultValue::expression(value);
    }
    if NUMERIC_TYPES.contains(&column.internal_type()) {
        if let Ok(integer) = value.parse::<i64>() {
            return DefaultValue::Integer(integer);
        }
        if let Ok(float) = value.parse::<f64>() {
            return DefaultValue::Float(float);
        }
    }
    DefaultValue::String(value.to_string())
}

/// Reads the live state of `table` from `information_schema` and the
/// `SHOW` commands.
pub(super) async fn fetch_state(driver: &dyn Driver, table: &str) -> Result<State> {
    let mut state = State::new(table);
    let rows = driver
        .query(
            "SELECT COUNT(*) AS count FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            &[table.into()],
        )
        .await?;
    if rows.first().and_then(|row| row.i64("count")).unwrap_or(0) == 0 {
        return Ok(state);
    }
    state.set_exists(true);

    let dialect = Dialect::MySql;
    let timezone = driver.timezone();
    for row in driver
        .query(&format!("SHOW FULL COLUMNS FROM {}", dialect.quote(table)), &[])
        .await?
    {
        state.register_column(parse_column(table, &row).with_timezone(timezone));
    }

    let foreign_keys = fetch_foreign_keys(driver, table).await?;

    let rows = driver
        .query(&format!("SHOW INDEXES FROM {}", dialect.quote(table)), &[])
        .await?;
    for (name, mut parts) in group_rows(&rows, "Key_name") {
        parts.sort_by_key(|part| part.i64("Seq_in_index").unwrap_or(0));
        let columns: Vec<String> = parts.iter().map(|part| part.string("Column_name")).collect();
        if name == "PRIMARY" {
            state.set_primary_keys(&columns);
            continue;
        }
        // Indexes MySQL created to back a foreign key.
        if foreign_keys.iter().any(|fk| fk.name() == name) {
            continue;
        }

        let mut index = Index::new(dialect, table, name.as_str());
        index.unique = !parts[0].bool("Non_unique");
        for part in parts {
            let column = part.string("Column_name");
            if part.str("Collation") == Some("D") {
                index.sort.insert(column.clone(), SortOrder::Desc);
            }
            index.columns.push(column);
        }
        state.register_index(index);
    }

    for fk in foreign_keys {
        state.register_foreign_key(fk);
    }
    Ok(state)
}

async fn fetch_foreign_keys(driver: &dyn Driver, table: &str) -> Result<Vec<ForeignKey>> {
    let rows = driver
        .query(
            "SELECT rc.CONSTRAINT_NAME AS constraint_name, rc.UPDATE_RULE AS update_rule, \
             rc.DELETE_RULE AS delete_rule, rc.REFERENCED_TABLE_NAME AS foreign_table, \
             kcu.COLUMN_NAME AS column_name, kcu.REFERENCED_COLUMN_NAME AS foreign_key \
             FROM information_schema.referential_constraints AS rc \
             JOIN information_schema.key_column_usage AS kcu \
             ON kcu.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA \
             AND kcu.CONSTRAINT_NAME = rc.CONSTRAINT_NAME \
             AND kcu.TABLE_NAME = rc.TABLE_NAME \
             WHERE rc.CONSTRAINT_SCHEMA = DATABASE() AND rc.TABLE_NAME = ? \
             ORDER BY rc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION",
            &[table.into()],
        )
        .await?;

    Ok(group_rows(&rows, "constraint_name")
        .into_iter()
        .map(|(name, parts)| {
            let mut fk = ForeignKey::new(Dialect::MySql, table, name, driver.prefix());
            fk.columns = parts.iter().map(|part| part.string("column_name")).collect();
            fk.foreign_keys = parts.iter().map(|part| part.string("foreign_key")).collect();
            fk.foreign_table = parts[0].string("foreign_table");
            fk.on_delete = ForeignKeyAction::parse(&parts[0].string("delete_rule"));
            fk.on_update = ForeignKeyAction::parse(&parts[0].string("update_rule"));
            fk
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AbstractType;
    use crate::driver::{RecordingDriver, Value};

    fn show_column(field: &str, ty: &str, null: &str, default: Value, extra: &str) -> Row {
        Row::new()
            .with("Field", field)
            .with("Type", ty)
            .with("Null", null)
            .with("Default", default)
            .with("Extra", extra)
    }

    #[test]
    fn test_column_sql() {
        let mut id = Column::new(Dialect::MySql, "users", "id");
        id.primary();
        assert_eq!(id.sql_statement(), "`id` int NOT NULL AUTO_INCREMENT");

        let mut status = Column::new(Dialect::MySql, "users", "status");
        status.enumeration(&["new", "old"]).default_value("new");
        assert_eq!(
            status.sql_statement(),
            "`status` enum('new', 'old') NULL DEFAULT 'new'"
        );

        let mut amount = Column::new(Dialect::MySql, "orders", "amount");
        amount.decimal(10, 2).unsigned(true).nullable(false);
        assert_eq!(
            amount.sql_statement(),
            "`amount` decimal(10, 2) unsigned NOT NULL"
        );
    }

    #[test]
    fn test_parse_show_columns() {
        let id = parse_column(
            "users",
            &show_column("id", "int(11) unsigned", "NO", Value::Null, "auto_increment"),
        );
        assert_eq!(id.internal_type(), "int");
        assert_eq!(id.size(), 0);
        assert!(id.attributes().unsigned);
        assert_eq!(id.abstract_type(), AbstractType::Primary);

        let flag = parse_column(
            "users",
            &show_column("active", "tinyint(1)", "YES", Value::from("1"), ""),
        );
        assert_eq!(flag.abstract_type(), AbstractType::Boolean);
        assert_eq!(flag.default(), Some(&DefaultValue::Integer(1)));

        let mut declared = Column::new(Dialect::MySql, "users", "active");
        declared.boolean().default_value(true);
        assert!(declared.compare(&flag));

        let status = parse_column(
            "users",
            &show_column("status", "enum('a','it''s')", "NO", Value::from("a"), ""),
        );
        assert_eq!(status.enum_values(), ["a", "it's"]);
        assert_eq!(status.default(), Some(&DefaultValue::String("a".into())));

        let created = parse_column(
            "users",
            &show_column(
                "created_at",
                "timestamp",
                "NO",
                Value::from("CURRENT_TIMESTAMP"),
                "DEFAULT_GENERATED",
            ),
        );
        assert_eq!(
            created.default(),
            Some(&DefaultValue::expression("CURRENT_TIMESTAMP"))
        );

        let price = parse_column(
            "items",
            &show_column("price", "decimal(10,2)", "YES", Value::Null, ""),
        );
        assert_eq!((price.precision(), price.scale()), (10, 2));
    }

    #[tokio::test]
    async fn test_fetch_state_skips_foreign_key_indexes() {
        let driver = RecordingDriver::dry_run(Dialect::MySql);
        driver.respond(
            "information_schema.tables",
            vec![Row::new().with("count", 1_i64)],
        );
        driver.respond(
            "SHOW FULL COLUMNS",
            vec![
                show_column("id", "int", "NO", Value::Null, "auto_increment"),
                show_column("user_id", "int", "NO", Value::Null, ""),
                show_column("title", "varchar(120)", "NO", Value::Null, ""),
            ],
        );
        let index_part = |name: &str, column: &str, seq: i64, non_unique: i64| {
            Row::new()
                .with("Key_name", name)
                .with("Column_name", column)
                .with("Seq_in_index", seq)
                .with("Non_unique", non_unique)
                .with("Collation", "A")
        };
        driver.respond(
            "SHOW INDEXES",
            vec![
                index_part("PRIMARY", "id", 1, 0),
                index_part("posts_user_id_fk", "user_id", 1, 1),
                index_part("posts_index_title", "title", 1, 0),
            ],
        );
        driver.respond(
            "referential_constraints",
            vec![Row::new()
                .with("constraint_name", "posts_user_id_fk")
                .with("update_rule", "NO ACTION")
                .with("delete_rule", "SET NULL")
                .with("foreign_table", "users")
                .with("column_name", "user_id")
                .with("foreign_key", "id")],
        );

        let state = fetch_state(&driver, "posts").await.unwrap();
        assert_eq!(state.primary_keys(), ["id"]);
        assert_eq!(state.indexes().len(), 1);
        assert!(state.indexes()[0].is_unique());
        let fk = state.foreign_key("posts_user_id_fk").unwrap();
        assert_eq!(fk.delete_rule(), ForeignKeyAction::SetNull);
        assert_eq!(fk.foreign_keys(), ["id"]);
    }
}
