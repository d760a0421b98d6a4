use std::sync::Arc;

use cq_schema::{LogicalType, Scalar, Schema};

use crate::chunk::Chunk;
use crate::column::{Column, ColumnValues};
use crate::source::ColumnarSource;
use crate::zonemap::{BloomFilter, ZoneMap};

/// A column is considered for a bloom filter when its chunk holds no more
/// than this many distinct values -- a cheap proxy for "low cardinality"
/// that avoids a full distinct-count pass.
const BLOOM_CANDIDATE_MAX_DISTINCT: usize = 512;

/// An immutable, in-memory [`ColumnarSource`]: a schema plus a sequence of
/// frozen chunks. Once built, a `Table` is never mutated -- row count,
/// chunk boundaries, and zone maps are fixed for the table's lifetime and
/// may be shared across threads with no locking.
pub struct Table {
    schema: Arc<Schema>,
    chunks: Vec<Chunk>,
    /// `zone_maps[chunk_index][column_ordinal]`.
    zone_maps: Vec<Vec<ZoneMap>>,
}

impl Table {
    pub fn builder(schema: Schema) -> TableBuilder {
        TableBuilder {
            schema: Arc::new(schema),
            chunks: Vec::new(),
            enable_zone_maps: true,
            enable_bloom_filters: true,
        }
    }

    pub fn schema_arc(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl ColumnarSource for Table {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn chunk(&self, index: usize) -> &Chunk {
        &self.chunks[index]
    }

    fn zone_map(&self, chunk_index: usize, column_ordinal: usize) -> Option<&ZoneMap> {
        self.zone_maps.get(chunk_index)?.get(column_ordinal)
    }
}

/// Builds a [`Table`] one chunk at a time, computing each chunk's zone maps
/// as it is appended (mirrors ingest-time statistics collection: the core
/// never recomputes a zone map after a chunk is frozen).
pub struct TableBuilder {
    schema: Arc<Schema>,
    chunks: Vec<Chunk>,
    enable_zone_maps: bool,
    enable_bloom_filters: bool,
}

impl TableBuilder {
    pub fn enable_zone_maps(mut self, enabled: bool) -> Self {
        self.enable_zone_maps = enabled;
        self
    }

    pub fn enable_bloom_filters(mut self, enabled: bool) -> Self {
        self.enable_bloom_filters = enabled;
        self
    }

    pub fn add_chunk(mut self, columns: Vec<Column>) -> Result<Self, cq_error::Error> {
        let len = columns.first().map_or(0, Column::len);
        let chunk = Chunk::new(Arc::clone(&self.schema), columns, len)?;
        self.chunks.push(chunk);
        Ok(self)
    }

    pub fn build(self) -> Table {
        let zone_maps = if self.enable_zone_maps {
            self.chunks
                .iter()
                .map(|chunk| {
                    self.schema
                        .fields()
                        .iter()
                        .map(|field| {
                            compute_zone_map(chunk.column(field.ordinal()), field.logical_type(), self.enable_bloom_filters)
                        })
                        .collect()
                })
                .collect()
        } else {
            vec![Vec::new(); self.chunks.len()]
        };

        Table {
            schema: self.schema,
            chunks: self.chunks,
            zone_maps,
        }
    }
}

fn compute_zone_map(column: &Column, logical_type: LogicalType, enable_bloom: bool) -> ZoneMap {
    let len = column.len();
    let null_count = column.null_count();
    if null_count == len {
        return ZoneMap::all_null(len);
    }

    macro_rules! numeric_minmax {
        ($values:expr, $variant:ident) => {{
            let mut min: Option<_> = None;
            let mut max: Option<_> = None;
            let mut distinct: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();
            for i in 0..len {
                if !column.is_valid(i) {
                    continue;
                }
                let v = $values[i];
                min = Some(min.map_or(v, |m: _| if v < m { v } else { m }));
                max = Some(max.map_or(v, |m: _| if v > m { v } else { m }));
                if enable_bloom && distinct.len() <= BLOOM_CANDIDATE_MAX_DISTINCT {
                    distinct.insert(v.to_le_bytes().to_vec());
                }
            }
            let bloom = build_bloom_if_low_cardinality(enable_bloom, &distinct);
            ZoneMap {
                min: min.map(Scalar::$variant),
                max: max.map(Scalar::$variant),
                null_count: null_count as u64,
                distinct_bloom: bloom,
            }
        }};
    }

    match (&column.values, logical_type) {
        (ColumnValues::Int8(v), LogicalType::Int8) => numeric_minmax!(v, Int8),
        (ColumnValues::Int16(v), LogicalType::Int16) => numeric_minmax!(v, Int16),
        (ColumnValues::Int32(v), LogicalType::Int32) => numeric_minmax!(v, Int32),
        (ColumnValues::Int64(v), LogicalType::Int64) => numeric_minmax!(v, Int64),
        (ColumnValues::UInt8(v), LogicalType::UInt8) => numeric_minmax!(v, UInt8),
        (ColumnValues::UInt16(v), LogicalType::UInt16) => numeric_minmax!(v, UInt16),
        (ColumnValues::UInt32(v), LogicalType::UInt32) => numeric_minmax!(v, UInt32),
        (ColumnValues::UInt64(v), LogicalType::UInt64) => numeric_minmax!(v, UInt64),
        (ColumnValues::Date32(v), LogicalType::Date32) => numeric_minmax!(v, Date32),
        (ColumnValues::Timestamp(v), LogicalType::Timestamp(_)) => numeric_minmax!(v, Timestamp),
        (ColumnValues::Decimal128(v), LogicalType::Decimal128(_, _)) => numeric_minmax!(v, Decimal128),
        (ColumnValues::Float32(v), LogicalType::Float32) => {
            let mut min: Option<f32> = None;
            let mut max: Option<f32> = None;
            for i in 0..len {
                if !column.is_valid(i) {
                    continue;
                }
                let x = v[i];
                min = Some(min.map_or(x, |m| x.min(m)));
                max = Some(max.map_or(x, |m| x.max(m)));
            }
            ZoneMap {
                min: min.map(|v| Scalar::Float32(ordered_float::OrderedFloat(v))),
                max: max.map(|v| Scalar::Float32(ordered_float::OrderedFloat(v))),
                null_count: null_count as u64,
                distinct_bloom: None,
            }
        }
        (ColumnValues::Float64(v), LogicalType::Float64) => {
            let mut min: Option<f64> = None;
            let mut max: Option<f64> = None;
            for i in 0..len {
                if !column.is_valid(i) {
                    continue;
                }
                let x = v[i];
                min = Some(min.map_or(x, |m| x.min(m)));
                max = Some(max.map_or(x, |m| x.max(m)));
            }
            ZoneMap {
                min: min.map(|v| Scalar::Float64(ordered_float::OrderedFloat(v))),
                max: max.map(|v| Scalar::Float64(ordered_float::OrderedFloat(v))),
                null_count: null_count as u64,
                distinct_bloom: None,
            }
        }
        (ColumnValues::Bool { .. }, LogicalType::Bool) => {
            let mut any_true = false;
            let mut any_false = false;
            for i in 0..len {
                if !column.is_valid(i) {
                    continue;
                }
                if column.values.bool_get(i) {
                    any_true = true;
                } else {
                    any_false = true;
                }
            }
            let min = if !any_false && any_true { Scalar::Bool(true) } else { Scalar::Bool(false) };
            let max = if any_true { Scalar::Bool(true) } else { Scalar::Bool(false) };
            ZoneMap {
                min: Some(min),
                max: Some(max),
                null_count: null_count as u64,
                distinct_bloom: None,
            }
        }
        (ColumnValues::Utf8 { .. }, LogicalType::Utf8) => {
            let mut min: Option<String> = None;
            let mut max: Option<String> = None;
            let mut distinct: std::collections::HashSet<String> = std::collections::HashSet::new();
            for i in 0..len {
                if !column.is_valid(i) {
                    continue;
                }
                let s = column.values.utf8_get(i);
                if min.as_deref().map_or(true, |m| s < m) {
                    min = Some(s.to_string());
                }
                if max.as_deref().map_or(true, |m| s > m) {
                    max = Some(s.to_string());
                }
                if enable_bloom && distinct.len() <= BLOOM_CANDIDATE_MAX_DISTINCT {
                    distinct.insert(s.to_string());
                }
            }
            let bloom = build_bloom_if_low_cardinality_str(enable_bloom, &distinct);
            ZoneMap {
                min: min.map(Scalar::Utf8),
                max: max.map(Scalar::Utf8),
                null_count: null_count as u64,
                distinct_bloom: bloom,
            }
        }
        _ => ZoneMap {
            min: None,
            max: None,
            null_count: null_count as u64,
            distinct_bloom: None,
        },
    }
}

fn build_bloom_if_low_cardinality(enable_bloom: bool, distinct: &std::collections::HashSet<Vec<u8>>) -> Option<BloomFilter> {
    if !enable_bloom || distinct.len() > BLOOM_CANDIDATE_MAX_DISTINCT || distinct.is_empty() {
        return None;
    }
    let mut bf = BloomFilter::new(distinct.len(), 4);
    for v in distinct {
        bf.insert(v);
    }
    Some(bf)
}

fn build_bloom_if_low_cardinality_str(enable_bloom: bool, distinct: &std::collections::HashSet<String>) -> Option<BloomFilter> {
    if !enable_bloom || distinct.len() > BLOOM_CANDIDATE_MAX_DISTINCT || distinct.is_empty() {
        return None;
    }
    let mut bf = BloomFilter::new(distinct.len(), 4);
    for v in distinct {
        bf.insert(v.as_bytes());
    }
    Some(bf)
}

#[cfg(test)]
mod tests {
    use cq_schema::FieldSpec;

    use super::*;

    #[test]
    fn zone_map_tracks_min_max_and_nulls() {
        let schema = Schema::new([FieldSpec::new("x", LogicalType::Int32, true)]).unwrap();
        let values = ColumnValues::Int32(vec![5, 1, 9, 3].into());
        let validity = crate::null_bitmap::NullBitmap::from_bools(&[true, true, false, true]);
        let column = Column::new(values, Some(validity));

        let table = Table::builder(schema)
            .add_chunk(vec![column])
            .unwrap()
            .build();

        let zm = table.zone_map(0, 0).unwrap();
        assert_eq!(zm.min.as_ref().unwrap().as_f64(), Some(1.0));
        assert_eq!(zm.max.as_ref().unwrap().as_f64(), Some(5.0));
        assert_eq!(zm.null_count, 1);
    }

    #[test]
    fn all_null_column_has_no_range() {
        let schema = Schema::new([FieldSpec::new("x", LogicalType::Int32, true)]).unwrap();
        let values = ColumnValues::Int32(vec![0, 0, 0].into());
        let validity = crate::null_bitmap::NullBitmap::from_bools(&[false, false, false]);
        let column = Column::new(values, Some(validity));

        let table = Table::builder(schema).add_chunk(vec![column]).unwrap().build();
        let zm = table.zone_map(0, 0).unwrap();
        assert!(!zm.has_range());
        assert_eq!(zm.null_count, 3);
    }
}
