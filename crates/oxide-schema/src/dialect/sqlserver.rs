//! SQL Server dialect.
//!
//! Defaults and enum checks are named constraints owned by their column.
//! New constraints get deterministic names; introspected names are kept
//! on the column so they can be dropped before the column is altered.

use super::{
    enum_constraint_name, enum_size, group_rows, parse_literal_default, quoted_values,
    strip_parens, Capability, Dialect, DialectSpec, NativeType, ReverseRule, TypeMapping,
};
use crate::driver::{Driver, Row};
use crate::error::Result;
use crate::schema::{Column, ColumnField, ForeignKey, ForeignKeyAction, Index, SortOrder, State};

use super::AbstractType as T;

pub(super) static SPEC: DialectSpec = DialectSpec {
    dialect: Dialect::SqlServer,
    capabilities: &[
        Capability::InPlaceAlter,
        Capability::AlterPrimaryKey,
        Capability::NamedForeignKeys,
        Capability::RenameIndex,
    ],
    mapping: TypeMapping {
        forward: &[
            (T::Primary, NativeType::serial("int")),
            (T::BigPrimary, NativeType::serial("bigint")),
            (T::Enum, NativeType::plain("enum")),
            (T::Boolean, NativeType::plain("bit")),
            (T::Integer, NativeType::plain("int")),
            (T::TinyInteger, NativeType::plain("tinyint")),
            (T::SmallInteger, NativeType::plain("smallint")),
            (T::BigInteger, NativeType::plain("bigint")),
            (T::String, NativeType::sized("varchar", 255)),
            (T::Text, NativeType::sized("varchar", 0)),
            (T::TinyText, NativeType::sized("varchar", 0)),
            (T::MediumText, NativeType::sized("varchar", 0)),
            (T::LongText, NativeType::sized("varchar", 0)),
            (T::Double, NativeType::plain("float")),
            (T::Float, NativeType::plain("real")),
            (T::Decimal, NativeType::plain("decimal")),
            (T::Datetime, NativeType::plain("datetime")),
            (T::Date, NativeType::plain("date")),
            (T::Time, NativeType::plain("time")),
            (T::Timestamp, NativeType::plain("datetime")),
            (T::Binary, NativeType::sized("varbinary", 0)),
            (T::TinyBinary, NativeType::sized("varbinary", 0)),
            (T::LongBinary, NativeType::sized("varbinary", 0)),
            (T::Json, NativeType::sized("varchar", 0)),
            (T::Uuid, NativeType::plain("uniqueidentifier")),
        ],
        reverse: &[
            ReverseRule::serial(T::Primary, "int"),
            ReverseRule::serial(T::BigPrimary, "bigint"),
            ReverseRule::new(T::Enum, "enum"),
            ReverseRule::new(T::Boolean, "bit"),
            ReverseRule::new(T::Integer, "int"),
            ReverseRule::new(T::TinyInteger, "tinyint"),
            ReverseRule::new(T::SmallInteger, "smallint"),
            ReverseRule::new(T::BigInteger, "bigint"),
            ReverseRule::sized(T::Text, "varchar", 0),
            ReverseRule::sized(T::Text, "nvarchar", 0),
            ReverseRule::new(T::Text, "text"),
            ReverseRule::new(T::String, "varchar"),
            ReverseRule::new(T::String, "nvarchar"),
            ReverseRule::new(T::String, "char"),
            ReverseRule::new(T::Double, "float"),
            ReverseRule::new(T::Float, "real"),
            ReverseRule::new(T::Decimal, "decimal"),
            ReverseRule::new(T::Decimal, "numeric"),
            ReverseRule::new(T::Datetime, "datetime"),
            ReverseRule::new(T::Datetime, "datetime2"),
            ReverseRule::new(T::Date, "date"),
            ReverseRule::new(T::Time, "time"),
            ReverseRule::sized(T::Binary, "varbinary", 0),
            ReverseRule::new(T::Uuid, "uniqueidentifier"),
        ],
    },
    column_sql,
    ignored_fields: &[ColumnField::Attributes],
    forbidden_defaults: &[],
    ordered_enums: false,
};

const VARIABLE_TYPES: [&str; 4] = ["varchar", "nvarchar", "varbinary", "char"];

/// Native type, with `max` for unsized variable length types.
pub(crate) fn type_sql(column: &Column) -> String {
    let name = column.internal_type();
    if name == "enum" {
        return format!("varchar({})", enum_size(column));
    }
    if column.precision() > 0 {
        return format!("{name}({}, {})", column.precision(), column.scale());
    }
    match (VARIABLE_TYPES.contains(&name), column.size()) {
        (true, 0) => format!("{name}(max)"),
        (_, 0) => name.to_string(),
        (_, size) => format!("{name}({size})"),
    }
}

/// Name of the default constraint created for `column`.
pub(crate) fn default_constraint_name(column: &Column) -> String {
    format!("{}_{}_default", column.table(), column.name())
}

/// `CONSTRAINT [name] DEFAULT value`, if the column has a default.
pub(crate) fn default_constraint_sql(column: &Column) -> Option<String> {
    let value = column.default_sql()?;
    Some(format!(
        "CONSTRAINT {} DEFAULT {value}",
        Dialect::SqlServer.quote(&default_constraint_name(column))
    ))
}

/// `CONSTRAINT [name] CHECK (...)` for enum columns.
pub(crate) fn enum_constraint_sql(column: &Column) -> String {
    format!(
        "CONSTRAINT {} {}",
        Dialect::SqlServer.quote(&enum_constraint_name(column)),
        super::enum_check(column)
    )
}

fn column_sql(column: &Column) -> String {
    let mut sql = format!(
        "{} {}",
        Dialect::SqlServer.quote(column.name()),
        type_sql(column)
    );
    if column.is_auto_increment() {
        sql.push_str(" IDENTITY(1,1)");
    }
    sql.push_str(if column.is_nullable() { " NULL" } else { " NOT NULL" });
    if let Some(default) = default_constraint_sql(column) {
        sql.push(' ');
        sql.push_str(&default);
    }
    if column.internal_type() == "enum" {
        sql.push(' ');
        sql.push_str(&enum_constraint_sql(column));
    }
    sql
}

fn parse_column(table: &str, row: &Row) -> Column {
    let mut column = Column::new(Dialect::SqlServer, table, row.string("column_name"));
    column.internal_type = row.string("data_type").to_lowercase();
    column.nullable = row.bool("is_nullable");
    column.auto_increment = row.bool("is_identity");

    if VARIABLE_TYPES.contains(&column.internal_type.as_str()) {
        column.size = row
            .i64("max_length")
            .and_then(|length| u32::try_from(length).ok())
            .unwrap_or(0);
    }
    if matches!(column.internal_type.as_str(), "decimal" | "numeric") {
        column.precision = row
            .i64("numeric_precision")
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0);
        column.scale = row
            .i64("numeric_scale")
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0);
    }

    if let Some(name) = row.str("default_name") {
        column.constraints.push(name.to_string());
        column.default = Some(parse_literal_default(strip_parens(
            &row.string("default_value"),
        )));
    }
    column
}

/// Reads the live state of `table` from `INFORMATION_SCHEMA` and the `sys`
/// catalog views.
pub(super) async fn fetch_state(driver: &dyn Driver, table: &str) -> Result<State> {
    let mut state = State::new(table);
    let rows = driver
        .query(
            "SELECT COUNT(*) AS count FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = SCHEMA_NAME() AND TABLE_NAME = @P1",
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
            "SELECT c.COLUMN_NAME AS column_name, c.DATA_TYPE AS data_type, \
             c.IS_NULLABLE AS is_nullable, c.CHARACTER_MAXIMUM_LENGTH AS max_length, \
             c.NUMERIC_PRECISION AS numeric_precision, c.NUMERIC_SCALE AS numeric_scale, \
             COLUMNPROPERTY(OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME), c.COLUMN_NAME, 'IsIdentity') AS is_identity, \
             dc.name AS default_name, dc.definition AS default_value \
             FROM INFORMATION_SCHEMA.COLUMNS AS c \
             LEFT JOIN sys.default_constraints AS dc \
             ON dc.parent_object_id = OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME) \
             AND dc.parent_column_id = COLUMNPROPERTY(OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME), c.COLUMN_NAME, 'ColumnId') \
             WHERE c.TABLE_SCHEMA = SCHEMA_NAME() AND c.TABLE_NAME = @P1 \
             ORDER BY c.ORDINAL_POSITION",
            &[table.into()],
        )
        .await?
    {
        state.register_column(parse_column(table, &row).with_timezone(timezone));
    }

    for row in driver
        .query(
            "SELECT cc.name AS name, col.name AS column_name, cc.definition AS definition \
             FROM sys.check_constraints AS cc \
             LEFT JOIN sys.columns AS col \
             ON col.object_id = cc.parent_object_id AND col.column_id = cc.parent_column_id \
             WHERE cc.parent_object_id = OBJECT_ID(@P1)",
            &[table.into()],
        )
        .await?
    {
        let Some(column) = state.column_mut(&row.string("column_name")) else {
            continue;
        };
        column.internal_type = "enum".to_string();
        column.size = 0;
        column.enum_values = quoted_values(&row.string("definition"));
        column.constraints.push(row.string("name"));
    }

    let rows = driver
        .query(
            "SELECT i.name AS index_name, c.name AS column_name, i.is_unique, \
             i.is_primary_key, i.is_unique_constraint, ic.is_descending_key \
             FROM sys.indexes AS i \
             JOIN sys.index_columns AS ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns AS c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             WHERE i.object_id = OBJECT_ID(@P1) AND ic.key_ordinal > 0 \
             ORDER BY i.name, ic.key_ordinal",
            &[table.into()],
        )
        .await?;
    for (name, parts) in group_rows(&rows, "index_name") {
        let columns: Vec<String> = parts.iter().map(|part| part.string("column_name")).collect();
        if parts[0].bool("is_primary_key") {
            state.set_primary_keys(&columns);
            continue;
        }
        if parts[0].bool("is_unique_constraint") {
            continue;
        }
        let mut index = Index::new(Dialect::SqlServer, table, name);
        index.unique = parts[0].bool("is_unique");
        for part in parts {
            let column = part.string("column_name");
            if part.bool("is_descending_key") {
                index.sort.insert(column.clone(), SortOrder::Desc);
            }
            index.columns.push(column);
        }
        state.register_index(index);
    }

    let rows = driver
        .query(
            "SELECT fk.name AS name, OBJECT_NAME(fk.referenced_object_id) AS foreign_table, \
             pc.name AS column_name, rc.name AS foreign_key, \
             fk.delete_referential_action_desc AS delete_rule, \
             fk.update_referential_action_desc AS update_rule \
             FROM sys.foreign_keys AS fk \
             JOIN sys.foreign_key_columns AS fkc ON fkc.constraint_object_id = fk.object_id \
             JOIN sys.columns AS pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
             JOIN sys.columns AS rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
             WHERE fk.parent_object_id = OBJECT_ID(@P1) \
             ORDER BY fk.name, fkc.constraint_column_id",
            &[table.into()],
        )
        .await?;
    for (name, parts) in group_rows(&rows, "name") {
        let mut fk = ForeignKey::new(Dialect::SqlServer, table, name, driver.prefix());
        fk.columns = parts.iter().map(|part| part.string("column_name")).collect();
        fk.foreign_keys = parts.iter().map(|part| part.string("foreign_key")).collect();
        fk.foreign_table = parts[0].string("foreign_table");
        fk.on_delete = ForeignKeyAction::parse(&parts[0].string("delete_rule"));
        fk.on_update = ForeignKeyAction::parse(&parts[0].string("update_rule"));
        state.register_foreign_key(fk);
    }
    Ok(state)
}
