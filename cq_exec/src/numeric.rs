use cq_schema::{LogicalType, Scalar};
use cq_store::{Column, ColumnValues};

/// A column value widened to one of a small set of native arithmetic
/// representations, chosen so that integer aggregation stays exact (no
/// routing through `f64` and losing precision at the extremes).
#[derive(Debug, Clone, Copy)]
pub enum NumericValue {
    I64(i64),
    U64(u64),
    F64(f64),
    I128(i128),
}

impl NumericValue {
    /// `None` for non-numeric columns (`Utf8`, `Binary`, `Bool`); those
    /// aren't valid `SUM`/`MIN`/`MAX` targets numerically (string min/max is
    /// handled separately by `StringExtremum`).
    pub fn at(column: &Column, i: usize) -> Option<Self> {
        match &column.values {
            ColumnValues::Int8(v) => Some(Self::I64(v[i] as i64)),
            ColumnValues::Int16(v) => Some(Self::I64(v[i] as i64)),
            ColumnValues::Int32(v) => Some(Self::I64(v[i] as i64)),
            ColumnValues::Int64(v) => Some(Self::I64(v[i])),
            ColumnValues::UInt8(v) => Some(Self::U64(v[i] as u64)),
            ColumnValues::UInt16(v) => Some(Self::U64(v[i] as u64)),
            ColumnValues::UInt32(v) => Some(Self::U64(v[i] as u64)),
            ColumnValues::UInt64(v) => Some(Self::U64(v[i])),
            ColumnValues::Float32(v) => Some(Self::F64(v[i] as f64)),
            ColumnValues::Float64(v) => Some(Self::F64(v[i])),
            ColumnValues::Date32(v) => Some(Self::I64(v[i] as i64)),
            ColumnValues::Timestamp(v) => Some(Self::I64(v[i])),
            ColumnValues::Decimal128(v) => Some(Self::I128(v[i])),
            ColumnValues::Bool { .. } | ColumnValues::Utf8 { .. } | ColumnValues::Binary { .. } => None,
        }
    }

    pub fn to_scalar(self, logical_type: LogicalType) -> Scalar {
        match (self, logical_type) {
            (Self::I64(v), LogicalType::Int8) => Scalar::Int8(v as i8),
            (Self::I64(v), LogicalType::Int16) => Scalar::Int16(v as i16),
            (Self::I64(v), LogicalType::Int32) => Scalar::Int32(v as i32),
            (Self::I64(v), LogicalType::Date32) => Scalar::Date32(v as i32),
            (Self::I64(v), LogicalType::Timestamp(_)) => Scalar::Timestamp(v),
            (Self::I64(v), _) => Scalar::Int64(v),
            (Self::U64(v), LogicalType::UInt8) => Scalar::UInt8(v as u8),
            (Self::U64(v), LogicalType::UInt16) => Scalar::UInt16(v as u16),
            (Self::U64(v), LogicalType::UInt32) => Scalar::UInt32(v as u32),
            (Self::U64(v), _) => Scalar::UInt64(v),
            (Self::F64(v), LogicalType::Float32) => Scalar::Float32(ordered_float::OrderedFloat(v as f32)),
            (Self::F64(v), _) => Scalar::Float64(ordered_float::OrderedFloat(v)),
            (Self::I128(v), _) => Scalar::Decimal128(v),
        }
    }

    fn lt(self, other: Self) -> bool {
        match (self, other) {
            (Self::I64(a), Self::I64(b)) => a < b,
            (Self::U64(a), Self::U64(b)) => a < b,
            (Self::F64(a), Self::F64(b)) => a < b,
            (Self::I128(a), Self::I128(b)) => a < b,
            // Columns only ever produce one kind at a time; this only fires
            // if a caller mixes values from different columns.
            (a, b) => a.widen() < b.widen(),
        }
    }

    fn widen(self) -> f64 {
        match self {
            Self::I64(v) => v as f64,
            Self::U64(v) => v as f64,
            Self::F64(v) => v,
            Self::I128(v) => v as f64,
        }
    }
}

/// A running `SUM`, widened per the source column's kind and checked for
/// overflow on every addition: reports `ArithmeticOverflow` rather than
/// silently wrapping.
#[derive(Debug, Clone, Copy)]
pub enum SumAccumulator {
    I64(i64),
    U64(u64),
    F64(f64),
    I128(i128),
}

impl SumAccumulator {
    pub fn zero_for(value: NumericValue) -> Self {
        match value {
            NumericValue::I64(_) => Self::I64(0),
            NumericValue::U64(_) => Self::U64(0),
            NumericValue::F64(_) => Self::F64(0.0),
            NumericValue::I128(_) => Self::I128(0),
        }
    }

    pub fn add(&mut self, value: NumericValue, column: &str) -> Result<(), crate::error::ExecError> {
        let overflow = || crate::error::ExecError::ArithmeticOverflow { column: column.to_string() };
        match (self, value) {
            (Self::I64(acc), NumericValue::I64(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::U64(acc), NumericValue::U64(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::I128(acc), NumericValue::I128(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::F64(acc), NumericValue::F64(v)) => *acc += v,
            _ => unreachable!("a single SUM target only ever yields one NumericValue kind"),
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self, column: &str) -> Result<(), crate::error::ExecError> {
        let overflow = || crate::error::ExecError::ArithmeticOverflow { column: column.to_string() };
        match (self, other) {
            (Self::I64(acc), Self::I64(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::U64(acc), Self::U64(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::I128(acc), Self::I128(v)) => *acc = acc.checked_add(v).ok_or_else(overflow)?,
            (Self::F64(acc), Self::F64(v)) => *acc += v,
            _ => unreachable!("sum accumulator kinds must agree across workers"),
        }
        Ok(())
    }

    pub fn to_scalar(self, logical_type: LogicalType) -> Scalar {
        let widened = match self {
            Self::I64(v) => NumericValue::I64(v),
            Self::U64(v) => NumericValue::U64(v),
            Self::F64(v) => NumericValue::F64(v),
            Self::I128(v) => NumericValue::I128(v),
        };
        widened.to_scalar(logical_type)
    }

    /// Identity element for a target column's numeric kind -- what `SUM`
    /// reports over zero matched rows.
    pub fn identity_for(logical_type: LogicalType) -> Self {
        if matches!(logical_type, LogicalType::Float32 | LogicalType::Float64) {
            Self::F64(0.0)
        } else if matches!(logical_type, LogicalType::Decimal128(_, _)) {
            Self::I128(0)
        } else if matches!(
            logical_type,
            LogicalType::UInt8 | LogicalType::UInt16 | LogicalType::UInt32 | LogicalType::UInt64
        ) {
            Self::U64(0)
        } else {
            Self::I64(0)
        }
    }
}

/// Running `MIN`/`MAX` over a numeric column: `None` until the first row is
/// folded in, so the caller can tell "no rows matched" (`EmptySource`) apart
/// from "the matched value happens to be zero".
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxAccumulator {
    value: Option<NumericValue>,
}

impl MinMaxAccumulator {
    pub fn fold(&mut self, value: NumericValue, want_max: bool) {
        self.value = Some(match self.value {
            None => value,
            Some(current) => {
                let value_is_smaller = value.lt(current);
                if want_max {
                    if value_is_smaller {
                        current
                    } else {
                        value
                    }
                } else if value_is_smaller {
                    value
                } else {
                    current
                }
            }
        });
    }

    pub fn merge(&mut self, other: Self, want_max: bool) {
        if let Some(v) = other.value {
            self.fold(v, want_max);
        }
    }

    pub fn finish(self, logical_type: LogicalType, column: &str) -> Result<Scalar, crate::error::ExecError> {
        self.value
            .map(|v| v.to_scalar(logical_type))
            .ok_or_else(|| crate::error::ExecError::EmptySource(format!("no rows to aggregate for column {column:?}")))
    }
}

/// Running `MIN`/`MAX` over a `Utf8` column, byte-lexicographic like
/// `ZoneMap`'s own string min/max.
#[derive(Debug, Clone, Default)]
pub struct StringExtremumAccumulator {
    value: Option<String>,
}

impl StringExtremumAccumulator {
    pub fn fold(&mut self, candidate: &str, want_max: bool) {
        let replace = match &self.value {
            None => true,
            Some(current) => {
                if want_max {
                    candidate > current.as_str()
                } else {
                    candidate < current.as_str()
                }
            }
        };
        if replace {
            self.value = Some(candidate.to_string());
        }
    }

    pub fn merge(&mut self, other: Self, want_max: bool) {
        if let Some(v) = other.value {
            self.fold(&v, want_max);
        }
    }

    pub fn finish(self, column: &str) -> Result<Scalar, crate::error::ExecError> {
        self.value
            .map(Scalar::Utf8)
            .ok_or_else(|| crate::error::ExecError::EmptySource(format!("no rows to aggregate for column {column:?}")))
    }
}
