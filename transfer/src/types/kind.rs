use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of column types understood by the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// The type could not be determined, e.g. every value observed so far was null.
    Invalid,
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampTz,
    Decimal,
    Struct,
    Array,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Invalid => "invalid",
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Boolean => "boolean",
            Kind::Date => "date",
            Kind::Time => "time",
            Kind::TimestampNtz => "timestamp_ntz",
            Kind::TimestampTz => "timestamp_tz",
            Kind::Decimal => "decimal",
            Kind::Struct => "struct",
            Kind::Array => "array",
        };
        f.write_str(name)
    }
}

/// Width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerKind {
    SmallInt,
    Int,
    BigInt,
}

/// Precision and scale of a decimal column.
///
/// A precision of [`None`] denotes a variable-precision numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalDetails {
    precision: Option<u32>,
    scale: u32,
}

impl DecimalDetails {
    pub fn new(precision: Option<u32>, scale: u32) -> Self {
        Self { precision, scale }
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }
}

/// A [`Kind`] together with the optional refinements a destination may report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindDetails {
    pub kind: Kind,
    pub optional_string_precision: Option<u32>,
    pub optional_integer_kind: Option<IntegerKind>,
    pub extended_decimal_details: Option<DecimalDetails>,
}

impl KindDetails {
    pub const fn new(kind: Kind) -> Self {
        Self {
            kind,
            optional_string_precision: None,
            optional_integer_kind: None,
            extended_decimal_details: None,
        }
    }

    pub fn string_with_precision(precision: u32) -> Self {
        Self {
            optional_string_precision: Some(precision),
            ..Self::new(Kind::String)
        }
    }

    pub fn integer(integer_kind: IntegerKind) -> Self {
        Self {
            optional_integer_kind: Some(integer_kind),
            ..Self::new(Kind::Integer)
        }
    }

    pub fn decimal(details: DecimalDetails) -> Self {
        Self {
            extended_decimal_details: Some(details),
            ..Self::new(Kind::Decimal)
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == Kind::Invalid
    }
}

impl From<Kind> for KindDetails {
    fn from(kind: Kind) -> Self {
        Self::new(kind)
    }
}
