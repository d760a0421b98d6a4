//! Ergonomic construction of [`Column`]s from plain Rust values, for tests,
//! `cq_testutil`'s generators, and any embedder that doesn't already hold
//! `arrow2` buffers. Mirrors the columnar layout `ColumnValues` encodes
//! directly rather than routing through an `arrow2` array builder, since
//! `Column` is not an `arrow2` array.

use crate::column::{Column, ColumnValues};
use crate::null_bitmap::NullBitmap;

fn validity_from_slice(validity: Option<&[bool]>) -> Option<NullBitmap> {
    let validity = validity?;
    if validity.iter().all(|v| *v) {
        return None;
    }
    Some(NullBitmap::from_bools(validity))
}

macro_rules! primitive_builder {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(values: Vec<$ty>, validity: Option<&[bool]>) -> Column {
            Column::new(ColumnValues::$variant(values.into()), validity_from_slice(validity))
        }
    };
}

primitive_builder!(int8_column, Int8, i8);
primitive_builder!(int16_column, Int16, i16);
primitive_builder!(int32_column, Int32, i32);
primitive_builder!(int64_column, Int64, i64);
primitive_builder!(uint8_column, UInt8, u8);
primitive_builder!(uint16_column, UInt16, u16);
primitive_builder!(uint32_column, UInt32, u32);
primitive_builder!(uint64_column, UInt64, u64);
primitive_builder!(float32_column, Float32, f32);
primitive_builder!(float64_column, Float64, f64);
primitive_builder!(date32_column, Date32, i32);
primitive_builder!(timestamp_column, Timestamp, i64);
primitive_builder!(decimal128_column, Decimal128, i128);

pub fn bool_column(values: &[bool], validity: Option<&[bool]>) -> Column {
    let mut bytes = vec![0u8; (values.len() + 7) / 8];
    for (i, v) in values.iter().enumerate() {
        if *v {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    Column::new(
        ColumnValues::Bool {
            bytes: bytes.into(),
            len: values.len(),
        },
        validity_from_slice(validity),
    )
}

pub fn utf8_column<S: AsRef<str>>(values: &[S], validity: Option<&[bool]>) -> Column {
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut data = Vec::new();
    offsets.push(0i32);
    for v in values {
        data.extend_from_slice(v.as_ref().as_bytes());
        offsets.push(data.len() as i32);
    }
    Column::new(
        ColumnValues::Utf8 {
            offsets: offsets.into(),
            data: data.into(),
        },
        validity_from_slice(validity),
    )
}

pub fn binary_column(values: &[Vec<u8>], validity: Option<&[bool]>) -> Column {
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut data = Vec::new();
    offsets.push(0i32);
    for v in values {
        data.extend_from_slice(v);
        offsets.push(data.len() as i32);
    }
    Column::new(
        ColumnValues::Binary {
            offsets: offsets.into(),
            data: data.into(),
        },
        validity_from_slice(validity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_column_roundtrips_values() {
        let col = utf8_column(&["alice", "bob", "carol"], None);
        assert_eq!(col.values.utf8_get(0), "alice");
        assert_eq!(col.values.utf8_get(2), "carol");
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn bool_column_packs_bits_lsb_first() {
        let col = bool_column(&[true, false, true, true, false, false, false, false, true], None);
        assert!(col.values.bool_get(0));
        assert!(!col.values.bool_get(1));
        assert!(col.values.bool_get(3));
        assert!(col.values.bool_get(8));
    }

    #[test]
    fn all_valid_slice_elides_the_null_bitmap() {
        let col = int32_column(vec![1, 2, 3], Some(&[true, true, true]));
        assert!(col.validity.is_none());
    }

    #[test]
    fn partial_validity_builds_a_bitmap() {
        let col = int32_column(vec![1, 2, 3], Some(&[true, false, true]));
        assert_eq!(col.null_count(), 1);
        assert!(!col.is_valid(1));
    }
}
