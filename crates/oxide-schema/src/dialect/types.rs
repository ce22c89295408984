//! Abstract column types and per-dialect type mappings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Dialect independent column type.
///
/// Never stored on a column: it is derived from the native type, size and
/// auto-increment flag through the dialect's reverse mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbstractType {
    Primary,
    BigPrimary,
    Enum,
    Boolean,
    Integer,
    TinyInteger,
    SmallInteger,
    BigInteger,
    String,
    Text,
    TinyText,
    MediumText,
    LongText,
    Double,
    Float,
    Decimal,
    Datetime,
    Date,
    Time,
    Timestamp,
    Binary,
    TinyBinary,
    LongBinary,
    Json,
    Uuid,
    /// Native type without a reverse mapping.
    Unknown,
}

impl AbstractType {
    /// Every concrete abstract type.
    pub const ALL: [Self; 25] = [
        Self::Primary,
        Self::BigPrimary,
        Self::Enum,
        Self::Boolean,
        Self::Integer,
        Self::TinyInteger,
        Self::SmallInteger,
        Self::BigInteger,
        Self::String,
        Self::Text,
        Self::TinyText,
        Self::MediumText,
        Self::LongText,
        Self::Double,
        Self::Float,
        Self::Decimal,
        Self::Datetime,
        Self::Date,
        Self::Time,
        Self::Timestamp,
        Self::Binary,
        Self::TinyBinary,
        Self::LongBinary,
        Self::Json,
        Self::Uuid,
    ];

    /// Returns the type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::BigPrimary => "bigPrimary",
            Self::Enum => "enum",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::TinyInteger => "tinyInteger",
            Self::SmallInteger => "smallInteger",
            Self::BigInteger => "bigInteger",
            Self::String => "string",
            Self::Text => "text",
            Self::TinyText => "tinyText",
            Self::MediumText => "mediumText",
            Self::LongText => "longText",
            Self::Double => "double",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Datetime => "datetime",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::TinyBinary => "tinyBinary",
            Self::LongBinary => "longBinary",
            Self::Json => "json",
            Self::Uuid => "uuid",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether the type is an auto-incrementing primary key.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Primary | Self::BigPrimary)
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbstractType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchemaError::schema(format!("Undefined abstract type '{s}'")))
    }
}

/// Native type an abstract type is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeType {
    /// Native type name, lowercase.
    pub name: &'static str,
    /// Default size, `0` for none.
    pub size: u32,
    /// Whether the column auto-increments.
    pub auto_increment: bool,
}

impl NativeType {
    pub(crate) const fn plain(name: &'static str) -> Self {
        Self {
            name,
            size: 0,
            auto_increment: false,
        }
    }

    pub(crate) const fn sized(name: &'static str, size: u32) -> Self {
        Self {
            name,
            size,
            auto_increment: false,
        }
    }

    pub(crate) const fn serial(name: &'static str) -> Self {
        Self {
            name,
            size: 0,
            auto_increment: true,
        }
    }
}

/// Pattern mapping a native type back to an abstract type.
///
/// Optional fields only constrain the match when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseRule {
    pub target: AbstractType,
    pub name: &'static str,
    pub size: Option<u32>,
    pub auto_increment: Option<bool>,
}

impl ReverseRule {
    pub(crate) const fn new(target: AbstractType, name: &'static str) -> Self {
        Self {
            target,
            name,
            size: None,
            auto_increment: None,
        }
    }

    pub(crate) const fn sized(target: AbstractType, name: &'static str, size: u32) -> Self {
        Self {
            target,
            name,
            size: Some(size),
            auto_increment: None,
        }
    }

    pub(crate) const fn serial(target: AbstractType, name: &'static str) -> Self {
        Self {
            target,
            name,
            size: None,
            auto_increment: Some(true),
        }
    }

    fn matches(&self, name: &str, size: u32, auto_increment: bool) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && self.size.map_or(true, |expected| expected == size)
            && self
                .auto_increment
                .map_or(true, |expected| expected == auto_increment)
    }
}

/// Forward and reverse type tables of one dialect.
#[derive(Debug)]
pub struct TypeMapping {
    /// Abstract type to native type.
    pub forward: &'static [(AbstractType, NativeType)],
    /// Ordered reverse rules; the first match wins, so specific patterns
    /// precede general ones.
    pub reverse: &'static [ReverseRule],
}

impl TypeMapping {
    /// Returns the native type used to create `abstract_type`.
    #[must_use]
    pub fn native(&self, abstract_type: AbstractType) -> Option<&'static NativeType> {
        self.forward
            .iter()
            .find(|(candidate, _)| *candidate == abstract_type)
            .map(|(_, native)| native)
    }

    /// Derives the abstract type of a native column.
    #[must_use]
    pub fn resolve(&self, name: &str, size: u32, auto_increment: bool) -> AbstractType {
        self.reverse
            .iter()
            .find(|rule| rule.matches(name, size, auto_increment))
            .map_or(AbstractType::Unknown, |rule| rule.target)
    }

    /// Abstract types that survive a round trip, in reverse table order.
    #[must_use]
    pub fn reversible(&self) -> Vec<AbstractType> {
        let mut types: Vec<AbstractType> = Vec::new();
        for rule in self.reverse {
            if !types.contains(&rule.target) {
                types.push(rule.target);
            }
        }
        types
    }
}
