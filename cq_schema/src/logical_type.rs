/// The unit a [`LogicalType::Timestamp`] counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

/// The logical type of a column. Stable once a [`crate::Schema`] is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    Utf8,
    Binary,
    Date32,
    Timestamp(TimeUnit),
    /// `(precision, scale)`.
    Decimal128(u8, u8),
}

impl LogicalType {
    /// Fixed-width types can live in a single contiguous value buffer with
    /// no offsets array; `Utf8`/`Binary` are variable-length.
    pub fn is_fixed_width(self) -> bool {
        !matches!(self, Self::Utf8 | Self::Binary)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Float32
                | Self::Float64
                | Self::Date32
                | Self::Timestamp(_)
                | Self::Decimal128(_, _)
        )
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Utf8)
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int8 => write!(f, "i8"),
            Self::Int16 => write!(f, "i16"),
            Self::Int32 => write!(f, "i32"),
            Self::Int64 => write!(f, "i64"),
            Self::UInt8 => write!(f, "u8"),
            Self::UInt16 => write!(f, "u16"),
            Self::UInt32 => write!(f, "u32"),
            Self::UInt64 => write!(f, "u64"),
            Self::Float32 => write!(f, "f32"),
            Self::Float64 => write!(f, "f64"),
            Self::Bool => write!(f, "bool"),
            Self::Utf8 => write!(f, "utf8"),
            Self::Binary => write!(f, "binary"),
            Self::Date32 => write!(f, "date32"),
            Self::Timestamp(unit) => write!(f, "timestamp[{unit:?}]"),
            Self::Decimal128(p, s) => write!(f, "decimal128({p}, {s})"),
        }
    }
}
