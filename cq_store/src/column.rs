use arrow2::buffer::Buffer;

use crate::null_bitmap::NullBitmap;

/// The contiguous value storage for one column of one chunk.
///
/// Fixed-width variants are backed by `arrow2::buffer::Buffer<T>` -- a
/// cheap-to-clone, reference-counted contiguous buffer, exactly the "one
/// immutable value buffer per column" the engine's chunks are built from.
/// `Utf8`/`Binary` carry an `offsets` buffer of `len + 1` monotonically
/// non-decreasing entries alongside the flat `data` buffer, the standard
/// Arrow variable-length layout.
#[derive(Debug, Clone)]
pub enum ColumnValues {
    Int8(Buffer<i8>),
    Int16(Buffer<i16>),
    Int32(Buffer<i32>),
    Int64(Buffer<i64>),
    UInt8(Buffer<u8>),
    UInt16(Buffer<u16>),
    UInt32(Buffer<u32>),
    UInt64(Buffer<u64>),
    Float32(Buffer<f32>),
    Float64(Buffer<f64>),
    /// One bit per row, LSB-first, packed the same way as [`NullBitmap`].
    Bool { bytes: Buffer<u8>, len: usize },
    Utf8 { offsets: Buffer<i32>, data: Buffer<u8> },
    Binary { offsets: Buffer<i32>, data: Buffer<u8> },
    Date32(Buffer<i32>),
    Timestamp(Buffer<i64>),
    Decimal128(Buffer<i128>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(b) => b.len(),
            Self::Int16(b) => b.len(),
            Self::Int32(b) => b.len(),
            Self::Int64(b) => b.len(),
            Self::UInt8(b) => b.len(),
            Self::UInt16(b) => b.len(),
            Self::UInt32(b) => b.len(),
            Self::UInt64(b) => b.len(),
            Self::Float32(b) => b.len(),
            Self::Float64(b) => b.len(),
            Self::Bool { len, .. } => *len,
            Self::Utf8 { offsets, .. } => offsets.len().saturating_sub(1),
            Self::Binary { offsets, .. } => offsets.len().saturating_sub(1),
            Self::Date32(b) => b.len(),
            Self::Timestamp(b) => b.len(),
            Self::Decimal128(b) => b.len(),
        }
    }

    /// `true` if variable-length offsets are non-decreasing (chunk
    /// invariant 3 in the data model).
    pub fn offsets_are_monotonic(&self) -> bool {
        match self {
            Self::Utf8 { offsets, .. } | Self::Binary { offsets, .. } => {
                offsets.windows(2).all(|w| w[0] <= w[1])
            }
            _ => true,
        }
    }

    pub fn bool_get(&self, i: usize) -> bool {
        match self {
            Self::Bool { bytes, .. } => (bytes[i / 8] >> (i % 8)) & 1 != 0,
            _ => panic!("bool_get called on non-bool column"),
        }
    }

    pub fn utf8_get(&self, i: usize) -> &str {
        match self {
            Self::Utf8 { offsets, data } => {
                let start = offsets[i] as usize;
                let end = offsets[i + 1] as usize;
                std::str::from_utf8(&data[start..end]).expect("utf8 column holds valid UTF-8")
            }
            _ => panic!("utf8_get called on non-utf8 column"),
        }
    }

    pub fn binary_get(&self, i: usize) -> &[u8] {
        match self {
            Self::Binary { offsets, data } => {
                let start = offsets[i] as usize;
                let end = offsets[i + 1] as usize;
                &data[start..end]
            }
            _ => panic!("binary_get called on non-binary column"),
        }
    }
}

/// One column's worth of data within a [`crate::Chunk`]: values plus an
/// optional null bitmap (absent exactly when the column's null count is
/// zero, per the data-model invariant).
#[derive(Debug, Clone)]
pub struct Column {
    pub values: ColumnValues,
    pub validity: Option<NullBitmap>,
}

impl Column {
    pub fn new(values: ColumnValues, validity: Option<NullBitmap>) -> Self {
        Self { values, validity }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, NullBitmap::null_count)
    }

    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.as_ref().map_or(true, |v| v.is_valid(i))
    }
}
