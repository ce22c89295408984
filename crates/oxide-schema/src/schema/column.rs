//! Column definitions.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::config::utc;
use crate::dialect::{AbstractType, Dialect};

/// Default value of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Timestamp default, rendered in the column's timezone.
    Timestamp(DateTime<Utc>),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Creates an SQL expression default.
    #[must_use]
    pub fn expression(sql: impl Into<String>) -> Self {
        Self::Expression(sql.into())
    }

    /// Returns whether this is the NULL default.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect, timezone: FixedOffset) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => match (dialect, b) {
                (Dialect::Postgres, true) => "TRUE".to_string(),
                (Dialect::Postgres, false) => "FALSE".to_string(),
                (_, b) => i64::from(*b).to_string(),
            },
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => dialect.quote_string(s),
            Self::Timestamp(t) => dialect.quote_string(
                &t.with_timezone(&timezone)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for DefaultValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// MySQL numeric attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAttributes {
    pub unsigned: bool,
    pub zerofill: bool,
}

/// Column fields a dialect may exclude from comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
    Size,
    Attributes,
    UserType,
    Timezone,
}

/// A column of one dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub(crate) dialect: Dialect,
    pub(crate) table: String,
    pub(crate) name: String,
    pub(crate) internal_type: String,
    pub(crate) size: u32,
    pub(crate) precision: u32,
    pub(crate) scale: u32,
    pub(crate) nullable: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) enum_values: Vec<String>,
    pub(crate) auto_increment: bool,
    pub(crate) attributes: ColumnAttributes,
    pub(crate) user_type: Option<String>,
    #[serde(skip, default = "utc")]
    pub(crate) timezone: FixedOffset,
    /// Names of constraints the database created for this column (default
    /// and check constraints). Never compared.
    #[serde(default)]
    pub(crate) constraints: Vec<String>,
}

impl Column {
    /// Creates an untyped, nullable column.
    #[must_use]
    pub fn new(dialect: Dialect, table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            name: name.into(),
            internal_type: String::new(),
            size: 0,
            precision: 0,
            scale: 0,
            nullable: true,
            default: None,
            enum_values: Vec::new(),
            auto_increment: false,
            attributes: ColumnAttributes::default(),
            user_type: None,
            timezone: utc(),
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native type name, lowercase.
    #[must_use]
    pub fn internal_type(&self) -> &str {
        &self.internal_type
    }

    /// Derives the abstract type from the dialect's reverse mapping.
    #[must_use]
    pub fn abstract_type(&self) -> AbstractType {
        self.dialect
            .spec()
            .mapping
            .resolve(&self.internal_type, self.size, self.auto_increment)
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.precision
    }

    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub const fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    #[must_use]
    pub const fn attributes(&self) -> ColumnAttributes {
        self.attributes
    }

    #[must_use]
    pub fn user_type(&self) -> Option<&str> {
        self.user_type.as_deref()
    }

    #[must_use]
    pub const fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Constraint names owned by this column, as introspected.
    #[must_use]
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// Sets the column type from an abstract type.
    ///
    /// Size, precision and scale are reset to the native defaults; primary
    /// key types are never nullable.
    pub fn set_type(&mut self, abstract_type: AbstractType) -> &mut Self {
        let Some(native) = self.dialect.spec().mapping.native(abstract_type) else {
            return self;
        };
        self.internal_type = native.name.to_string();
        self.size = native.size;
        self.precision = 0;
        self.scale = 0;
        self.auto_increment = native.auto_increment;
        if abstract_type != AbstractType::Enum {
            self.enum_values.clear();
        }
        if abstract_type.is_primary() {
            self.nullable = false;
        }
        self
    }

    /// Sets a native type directly, bypassing the abstract mapping.
    pub fn native_type(&mut self, name: &str, size: u32) -> &mut Self {
        self.internal_type = name.to_lowercase();
        self.size = size;
        self.precision = 0;
        self.scale = 0;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.set_type(AbstractType::Primary)
    }

    pub fn big_primary(&mut self) -> &mut Self {
        self.set_type(AbstractType::BigPrimary)
    }

    /// Enum column restricted to `values`.
    pub fn enumeration<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        self.set_type(AbstractType::Enum);
        self.enum_values = values.iter().map(|v| v.as_ref().to_string()).collect();
        self
    }

    pub fn boolean(&mut self) -> &mut Self {
        self.set_type(AbstractType::Boolean)
    }

    pub fn integer(&mut self) -> &mut Self {
        self.set_type(AbstractType::Integer)
    }

    pub fn tiny_integer(&mut self) -> &mut Self {
        self.set_type(AbstractType::TinyInteger)
    }

    pub fn small_integer(&mut self) -> &mut Self {
        self.set_type(AbstractType::SmallInteger)
    }

    pub fn big_integer(&mut self) -> &mut Self {
        self.set_type(AbstractType::BigInteger)
    }

    /// Variable length string of at most `size` characters.
    pub fn string(&mut self, size: u32) -> &mut Self {
        self.set_type(AbstractType::String);
        self.size = size;
        self
    }

    pub fn text(&mut self) -> &mut Self {
        self.set_type(AbstractType::Text)
    }

    pub fn tiny_text(&mut self) -> &mut Self {
        self.set_type(AbstractType::TinyText)
    }

    pub fn medium_text(&mut self) -> &mut Self {
        self.set_type(AbstractType::MediumText)
    }

    pub fn long_text(&mut self) -> &mut Self {
        self.set_type(AbstractType::LongText)
    }

    pub fn double(&mut self) -> &mut Self {
        self.set_type(AbstractType::Double)
    }

    pub fn float(&mut self) -> &mut Self {
        self.set_type(AbstractType::Float)
    }

    /// Exact numeric with `precision` digits, `scale` of them decimals.
    pub fn decimal(&mut self, precision: u32, scale: u32) -> &mut Self {
        self.set_type(AbstractType::Decimal);
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn datetime(&mut self) -> &mut Self {
        self.set_type(AbstractType::Datetime)
    }

    pub fn date(&mut self) -> &mut Self {
        self.set_type(AbstractType::Date)
    }

    pub fn time(&mut self) -> &mut Self {
        self.set_type(AbstractType::Time)
    }

    pub fn timestamp(&mut self) -> &mut Self {
        self.set_type(AbstractType::Timestamp)
    }

    pub fn binary(&mut self) -> &mut Self {
        self.set_type(AbstractType::Binary)
    }

    pub fn tiny_binary(&mut self) -> &mut Self {
        self.set_type(AbstractType::TinyBinary)
    }

    pub fn long_binary(&mut self) -> &mut Self {
        self.set_type(AbstractType::LongBinary)
    }

    pub fn json(&mut self) -> &mut Self {
        self.set_type(AbstractType::Json)
    }

    pub fn uuid(&mut self) -> &mut Self {
        self.set_type(AbstractType::Uuid)
    }

    pub fn nullable(&mut self, nullable: bool) -> &mut Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Removes the default value.
    pub fn no_default(&mut self) -> &mut Self {
        self.default = None;
        self
    }

    pub fn unsigned(&mut self, unsigned: bool) -> &mut Self {
        self.attributes.unsigned = unsigned;
        self
    }

    pub fn zerofill(&mut self, zerofill: bool) -> &mut Self {
        self.attributes.zerofill = zerofill;
        self
    }

    /// Sets the Postgres user defined type name.
    pub fn set_user_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.user_type = Some(name.into());
        self
    }

    /// Renders the dialect's column definition.
    #[must_use]
    pub fn sql_statement(&self) -> String {
        (self.dialect.spec().column_sql)(self)
    }

    /// Renders the default value, if any.
    #[must_use]
    pub fn default_sql(&self) -> Option<String> {
        self.default
            .as_ref()
            .map(|value| value.to_sql(self.dialect, self.timezone))
    }

    /// Returns whether the column has a non-null default its native type
    /// cannot store.
    #[must_use]
    pub fn has_forbidden_default(&self) -> bool {
        self.default.as_ref().is_some_and(|value| !value.is_null())
            && self
                .dialect
                .spec()
                .forbidden_defaults
                .iter()
                .any(|forbidden| forbidden.eq_ignore_ascii_case(&self.internal_type))
    }

    /// Compares two columns, ignoring the fields the dialect excludes,
    /// the owning table and owned constraint names.
    #[must_use]
    pub fn compare(&self, other: &Self) -> bool {
        let spec = self.dialect.spec();
        let ignores = |field: ColumnField| spec.ignored_fields.contains(&field);

        self.dialect == other.dialect
            && self.name == other.name
            && self.internal_type.eq_ignore_ascii_case(&other.internal_type)
            && (ignores(ColumnField::Size) || self.size == other.size)
            && self.precision == other.precision
            && self.scale == other.scale
            && self.nullable == other.nullable
            && self.comparable_default() == other.comparable_default()
            && self.compare_enum_values(other, spec.ordered_enums)
            && self.auto_increment == other.auto_increment
            && (ignores(ColumnField::Attributes) || self.attributes == other.attributes)
            && (ignores(ColumnField::UserType) || self.user_type == other.user_type)
            && (ignores(ColumnField::Timezone) || self.timezone == other.timezone)
    }

    /// `DEFAULT NULL` and no default are the same thing to every dialect.
    pub(crate) fn comparable_default(&self) -> Option<String> {
        self.default.as_ref().filter(|value| !value.is_null()).map(|value| match value {
            DefaultValue::Expression(expr) => expr.trim().to_uppercase(),
            other => other.to_sql(self.dialect, self.timezone),
        })
    }

    pub(crate) fn compare_enum_values(&self, other: &Self, ordered: bool) -> bool {
        if ordered {
            return self.enum_values == other.enum_values;
        }
        let mut left = self.enum_values.clone();
        let mut right = other.enum_values.clone();
        left.sort();
        right.sort();
        left == right
    }

    pub(crate) fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }
}
