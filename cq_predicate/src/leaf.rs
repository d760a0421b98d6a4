use std::collections::HashSet;

use ahash::RandomState;
use cq_bitmap::Bitmap;
use cq_schema::{LogicalType, Scalar};
use cq_store::{Chunk, Column, ColumnValues};

use crate::error::PredicateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    #[inline]
    fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    StartsWith,
    Contains,
    Equals,
}

impl StringOp {
    #[inline]
    fn apply(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::StartsWith => haystack.starts_with(needle),
            Self::Contains => haystack.contains(needle),
            Self::Equals => haystack == needle,
        }
    }
}

impl std::fmt::Display for StringOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StartsWith => "starts_with",
            Self::Contains => "contains",
            Self::Equals => "str_eq",
        };
        write!(f, "{s}")
    }
}

fn check_column<'a>(chunk: &'a Chunk, column_ordinal: usize) -> Result<&'a Column, PredicateError> {
    if column_ordinal >= chunk.schema().len() {
        return Err(PredicateError::UnknownColumn(column_ordinal));
    }
    Ok(chunk.column(column_ordinal))
}

fn kind_mismatch(chunk: &Chunk, column_ordinal: usize) -> PredicateError {
    let field = chunk.schema().field(column_ordinal).expect("column_ordinal validated by check_column");
    PredicateError::KindMismatch {
        column: field.name().to_string(),
        logical_type: field.logical_type().to_string(),
    }
}

/// Bulk-ANDs the column's null bitmap into `selection` if it has one,
/// turning nulls into deselected rows before any value comparison runs
/// (step 1 of the fixed-width comparison algorithm).
fn mask_out_nulls(column: &Column, selection: &mut Bitmap) {
    if let Some(validity) = &column.validity {
        if column.null_count() > 0 {
            selection.and_with_arrow_null_bitmap(validity.as_bytes());
        }
    }
}

/// Evaluates `satisfies` over rows `[0, len)` in lanes of 8, folding each
/// lane's comparison mask into `selection` with one `and_mask8` call --
/// one AND per 8 rows instead of up to 8 individual bit clears. A row
/// already cleared is skipped rather than re-tested (its mask bit stays 0,
/// which `and_mask8` leaves cleared either way), so this costs nothing
/// extra over the scalar loop it replaces, just batched differently.
#[inline]
fn compare_lanes(selection: &mut Bitmap, len: usize, mut satisfies: impl FnMut(usize) -> bool) {
    let mut base = 0;
    while base < len {
        let lane_len = (len - base).min(8);
        let mut mask: u8 = 0;
        for j in 0..lane_len {
            let i = base + j;
            if selection.get(i) && satisfies(i) {
                mask |= 1 << j;
            }
        }
        selection.and_mask8(base, mask);
        base += 8;
    }
}

macro_rules! numeric_compare_arm {
    ($chunk:expr, $column_ordinal:expr, $column:expr, $scalar:expr, $op:expr, $selection:expr, $values:ident, $scalar_variant:ident) => {{
        let operand = match $scalar {
            Scalar::$scalar_variant(v) => *v,
            _ => return Err(kind_mismatch($chunk, $column_ordinal)),
        };
        mask_out_nulls($column, $selection);
        compare_lanes($selection, $values.len(), |i| $op.apply($values[i], operand));
        Ok(())
    }};
}

/// Evaluates a comparison predicate (one of the six `ComparisonOp`
/// variants) over `column`, clearing bits in `selection` for rows that
/// don't satisfy `op(column[i], operand)`. Already-cleared bits stay
/// cleared: conjunctive narrowing only.
pub fn evaluate_compare(
    chunk: &Chunk,
    column_ordinal: usize,
    op: ComparisonOp,
    operand: &Scalar,
    selection: &mut Bitmap,
) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    match &column.values {
        ColumnValues::Int8(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Int8),
        ColumnValues::Int16(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Int16),
        ColumnValues::Int32(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Int32),
        ColumnValues::Int64(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Int64),
        ColumnValues::UInt8(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, UInt8),
        ColumnValues::UInt16(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, UInt16),
        ColumnValues::UInt32(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, UInt32),
        ColumnValues::UInt64(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, UInt64),
        ColumnValues::Date32(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Date32),
        ColumnValues::Timestamp(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Timestamp),
        ColumnValues::Decimal128(v) => numeric_compare_arm!(chunk, column_ordinal, column, operand, op, selection, v, Decimal128),
        ColumnValues::Float32(v) => {
            let want = match operand {
                Scalar::Float32(f) => f.0,
                _ => return Err(kind_mismatch(chunk, column_ordinal)),
            };
            mask_out_nulls(column, selection);
            compare_lanes(selection, v.len(), |i| op.apply(v[i], want));
            Ok(())
        }
        ColumnValues::Float64(v) => {
            let want = match operand {
                Scalar::Float64(f) => f.0,
                _ => return Err(kind_mismatch(chunk, column_ordinal)),
            };
            mask_out_nulls(column, selection);
            compare_lanes(selection, v.len(), |i| op.apply(v[i], want));
            Ok(())
        }
        ColumnValues::Utf8 { .. } => {
            let want = operand.as_str().ok_or_else(|| kind_mismatch(chunk, column_ordinal))?;
            mask_out_nulls(column, selection);
            compare_lanes(selection, column.len(), |i| op.apply(column.values.utf8_get(i), want));
            Ok(())
        }
        _ => Err(kind_mismatch(chunk, column_ordinal)),
    }
}

pub fn evaluate_is_null(chunk: &Chunk, column_ordinal: usize, selection: &mut Bitmap) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    match &column.validity {
        None => selection.and(&Bitmap::new(selection.len(), cq_bitmap::Fill::AllClear)),
        Some(validity) => {
            for i in 0..column.len() {
                if selection.get(i) && validity.is_valid(i) {
                    selection.clear(i);
                }
            }
        }
    }
    Ok(())
}

pub fn evaluate_is_not_null(chunk: &Chunk, column_ordinal: usize, selection: &mut Bitmap) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    if let Some(validity) = &column.validity {
        for i in 0..column.len() {
            if selection.get(i) && !validity.is_valid(i) {
                selection.clear(i);
            }
        }
    }
    Ok(())
}

pub fn evaluate_bool(chunk: &Chunk, column_ordinal: usize, want: bool, selection: &mut Bitmap) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    if !matches!(column.values, ColumnValues::Bool { .. }) {
        return Err(kind_mismatch(chunk, column_ordinal));
    }
    mask_out_nulls(column, selection);
    for i in 0..column.len() {
        if selection.get(i) && column.values.bool_get(i) != want {
            selection.clear(i);
        }
    }
    Ok(())
}

pub fn evaluate_string(
    chunk: &Chunk,
    column_ordinal: usize,
    op: StringOp,
    pattern: &str,
    selection: &mut Bitmap,
) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    if !matches!(column.values, ColumnValues::Utf8 { .. }) {
        return Err(kind_mismatch(chunk, column_ordinal));
    }
    mask_out_nulls(column, selection);
    for i in 0..column.len() {
        if selection.get(i) && !op.apply(column.values.utf8_get(i), pattern) {
            selection.clear(i);
        }
    }
    Ok(())
}

/// Canonical byte encoding of a `Scalar` used as a hashset key for `IN`
/// membership probes. Two scalars of the same logical value but different
/// numeric width never arise here since the set is built against one
/// column's logical type.
fn scalar_key(scalar: &Scalar) -> Vec<u8> {
    match scalar {
        Scalar::Null => vec![0],
        Scalar::Bool(b) => vec![*b as u8],
        Scalar::Int8(v) => v.to_le_bytes().to_vec(),
        Scalar::Int16(v) => v.to_le_bytes().to_vec(),
        Scalar::Int32(v) => v.to_le_bytes().to_vec(),
        Scalar::Int64(v) => v.to_le_bytes().to_vec(),
        Scalar::UInt8(v) => v.to_le_bytes().to_vec(),
        Scalar::UInt16(v) => v.to_le_bytes().to_vec(),
        Scalar::UInt32(v) => v.to_le_bytes().to_vec(),
        Scalar::UInt64(v) => v.to_le_bytes().to_vec(),
        Scalar::Float32(v) => v.0.to_le_bytes().to_vec(),
        Scalar::Float64(v) => v.0.to_le_bytes().to_vec(),
        Scalar::Utf8(s) => s.as_bytes().to_vec(),
        Scalar::Binary(b) => b.clone(),
        Scalar::Date32(v) => v.to_le_bytes().to_vec(),
        Scalar::Timestamp(v) => v.to_le_bytes().to_vec(),
        Scalar::Decimal128(v) => v.to_le_bytes().to_vec(),
    }
}

/// Pre-hashed `IN (...)` operand set: built once per predicate, probed once
/// per row. Small and large sets share this representation -- `ahash` is
/// fast enough at small N that a separate SIMD-broadcast path isn't worth
/// the branch, unlike the numeric-compare lane path above.
#[derive(Debug, Clone)]
pub struct InSetValues {
    keys: HashSet<Vec<u8>, RandomState>,
}

impl InSetValues {
    pub fn new(values: &[Scalar]) -> Self {
        let mut keys = HashSet::with_hasher(RandomState::new());
        keys.extend(values.iter().map(scalar_key));
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sorted hex-encoded operand keys, used by `Predicate::canonical_text`
    /// to render a deterministic fingerprint independent of hashset
    /// iteration order.
    pub fn sorted_key_hex(&self) -> Vec<String> {
        let mut hex: Vec<String> = self.keys.iter().map(|k| k.iter().map(|b| format!("{b:02x}")).collect()).collect();
        hex.sort();
        hex
    }
}

pub fn evaluate_in_set(
    chunk: &Chunk,
    column_ordinal: usize,
    values: &InSetValues,
    selection: &mut Bitmap,
) -> Result<(), PredicateError> {
    let column = check_column(chunk, column_ordinal)?;
    mask_out_nulls(column, selection);
    let logical_type = chunk
        .schema()
        .field(column_ordinal)
        .expect("column_ordinal validated by check_column")
        .logical_type();

    macro_rules! probe_numeric {
        ($values:expr) => {
            for i in 0..$values.len() {
                if selection.get(i) {
                    let key = $values[i].to_le_bytes();
                    if !values.keys.contains(key.as_slice()) {
                        selection.clear(i);
                    }
                }
            }
        };
    }

    match (&column.values, logical_type) {
        (ColumnValues::Int8(v), LogicalType::Int8) => probe_numeric!(v),
        (ColumnValues::Int16(v), LogicalType::Int16) => probe_numeric!(v),
        (ColumnValues::Int32(v), LogicalType::Int32) => probe_numeric!(v),
        (ColumnValues::Int64(v), LogicalType::Int64) => probe_numeric!(v),
        (ColumnValues::UInt8(v), LogicalType::UInt8) => probe_numeric!(v),
        (ColumnValues::UInt16(v), LogicalType::UInt16) => probe_numeric!(v),
        (ColumnValues::UInt32(v), LogicalType::UInt32) => probe_numeric!(v),
        (ColumnValues::UInt64(v), LogicalType::UInt64) => probe_numeric!(v),
        (ColumnValues::Date32(v), LogicalType::Date32) => probe_numeric!(v),
        (ColumnValues::Timestamp(v), LogicalType::Timestamp(_)) => probe_numeric!(v),
        (ColumnValues::Decimal128(v), LogicalType::Decimal128(_, _)) => probe_numeric!(v),
        (ColumnValues::Utf8 { .. }, LogicalType::Utf8) => {
            for i in 0..column.len() {
                if selection.get(i) && !values.keys.contains(column.values.utf8_get(i).as_bytes()) {
                    selection.clear(i);
                }
            }
        }
        _ => return Err(kind_mismatch(chunk, column_ordinal)),
    }
    Ok(())
}
