use cq_bitmap::{Bitmap, Fill};
use cq_schema::Scalar;
use cq_store::{Chunk, ZoneMap};

use crate::error::PredicateError;
use crate::leaf::{self, ComparisonOp, InSetValues, StringOp};
use crate::selectivity;

/// A column predicate: a leaf comparison or a composite of other
/// predicates. Filters a chunk into a selection bitmap; never widens an
/// already-cleared bit (conjunctive narrowing).
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        column: usize,
        op: ComparisonOp,
        operand: Scalar,
    },
    IsNull {
        column: usize,
    },
    IsNotNull {
        column: usize,
    },
    InSet {
        column: usize,
        values: InSetValues,
    },
    StringOp {
        column: usize,
        op: StringOp,
        pattern: String,
    },
    Bool {
        column: usize,
        want: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Always unsatisfiable, for any schema: evaluates by clearing every
    /// bit without touching column data. The optimizer's sole producer --
    /// the canonical replacement for a Filter whose predicate set is
    /// proven contradictory (`a > 10 AND a < 5`).
    Never,
}

/// How a chunk relates to a predicate, decided from the chunk's zone maps
/// before `Predicate::evaluate` is ever called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// The predicate can't be satisfied anywhere in the chunk; skip it.
    Skip,
    /// The predicate holds for every row in the chunk; evaluating would be
    /// wasted work.
    TriviallyTrue,
    /// No shortcut available; call `evaluate`.
    Evaluate,
}

impl Predicate {
    /// Narrows `selection` to rows satisfying `self`, given `chunk`.
    /// Idempotent: calling `evaluate` again on the result changes nothing,
    /// since every leaf only ever clears bits that are already clear for a
    /// row failing the predicate, irrespective of the starting selection.
    pub fn evaluate(&self, chunk: &Chunk, selection: &mut Bitmap) -> Result<(), PredicateError> {
        match self {
            Predicate::Compare { column, op, operand } => leaf::evaluate_compare(chunk, *column, *op, operand, selection),
            Predicate::IsNull { column } => leaf::evaluate_is_null(chunk, *column, selection),
            Predicate::IsNotNull { column } => leaf::evaluate_is_not_null(chunk, *column, selection),
            Predicate::InSet { column, values } => leaf::evaluate_in_set(chunk, *column, values, selection),
            Predicate::StringOp { column, op, pattern } => leaf::evaluate_string(chunk, *column, *op, pattern, selection),
            Predicate::Bool { column, want } => leaf::evaluate_bool(chunk, *column, *want, selection),
            Predicate::And(children) => {
                for child in children {
                    if selection.is_all_clear() {
                        // Early exit: no evaluation of a child can set a bit
                        // that conjunction hasn't already cleared.
                        break;
                    }
                    child.evaluate(chunk, selection)?;
                }
                Ok(())
            }
            Predicate::Or(children) => {
                let input = selection.clone();
                let mut accumulated = Bitmap::new(selection.len(), Fill::AllClear);
                for child in children {
                    let mut temp = input.clone();
                    child.evaluate(chunk, &mut temp)?;
                    accumulated.or(&temp);
                }
                accumulated.and(&input);
                *selection = accumulated;
                Ok(())
            }
            Predicate::Not(child) => {
                let input = selection.clone();
                let mut temp = input.clone();
                child.evaluate(chunk, &mut temp)?;
                temp.not();
                temp.and(&input);
                *selection = temp;
                Ok(())
            }
            Predicate::Never => {
                selection.reset(selection.len(), Fill::AllClear);
                Ok(())
            }
        }
    }

    /// Rewrites every column reference through `map`, used by the optimizer
    /// to push a `Filter` below a `Project` (mapping projected-output
    /// ordinals back to the child's source ordinals).
    pub fn remap_columns(&self, map: &impl Fn(usize) -> usize) -> Predicate {
        match self {
            Predicate::Compare { column, op, operand } => Predicate::Compare {
                column: map(*column),
                op: *op,
                operand: operand.clone(),
            },
            Predicate::IsNull { column } => Predicate::IsNull { column: map(*column) },
            Predicate::IsNotNull { column } => Predicate::IsNotNull { column: map(*column) },
            Predicate::InSet { column, values } => Predicate::InSet {
                column: map(*column),
                values: values.clone(),
            },
            Predicate::StringOp { column, op, pattern } => Predicate::StringOp {
                column: map(*column),
                op: *op,
                pattern: pattern.clone(),
            },
            Predicate::Bool { column, want } => Predicate::Bool { column: map(*column), want: *want },
            Predicate::And(children) => Predicate::And(children.iter().map(|c| c.remap_columns(map)).collect()),
            Predicate::Or(children) => Predicate::Or(children.iter().map(|c| c.remap_columns(map)).collect()),
            Predicate::Not(child) => Predicate::Not(Box::new(child.remap_columns(map))),
            Predicate::Never => Predicate::Never,
        }
    }

    /// Every column ordinal this predicate (transitively) references.
    pub fn referenced_columns(&self, out: &mut Vec<usize>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column }
            | Predicate::InSet { column, .. }
            | Predicate::StringOp { column, .. }
            | Predicate::Bool { column, .. } => out.push(*column),
            Predicate::And(children) | Predicate::Or(children) => children.iter().for_each(|c| c.referenced_columns(out)),
            Predicate::Not(child) => child.referenced_columns(out),
            Predicate::Never => {}
        }
    }

    /// Whether `self` is a tautology that can be dropped from a Filter:
    /// `col is not null` over a column the schema already marks
    /// non-nullable.
    pub fn is_tautology(&self, nullable: &impl Fn(usize) -> bool) -> bool {
        matches!(self, Predicate::IsNotNull { column } if !nullable(*column))
    }

    /// Whether `self`, combined with `other`, can never be satisfied --
    /// e.g. `a > 10` and `a < 5` on the same column. Conservative: only
    /// recognizes a numeric-range contradiction between two `Compare` leaves
    /// on the same column.
    pub fn contradicts(&self, other: &Predicate) -> bool {
        let (Predicate::Compare { column: c1, op: op1, operand: v1 }, Predicate::Compare { column: c2, op: op2, operand: v2 }) =
            (self, other)
        else {
            return false;
        };
        if c1 != c2 {
            return false;
        }
        let (Some(a), Some(b)) = (v1.as_f64(), v2.as_f64()) else { return false };
        use ComparisonOp::*;
        matches!(
            (op1, op2),
            (Gt | Ge, Lt | Le) | (Lt | Le, Gt | Ge)
        ) && {
            let (lower, upper, lower_inclusive, upper_inclusive) = if matches!(op1, Gt | Ge) {
                (a, b, *op1 == Ge, *op2 == Le)
            } else {
                (b, a, *op2 == Ge, *op1 == Le)
            };
            lower > upper || (lower == upper && !(lower_inclusive && upper_inclusive))
        }
    }

    /// Deterministic pre-order textual rendering: operator names, column
    /// ordinals, and operand literals, with no dependence on hashset or
    /// `Vec` allocation order. Used as (part of) the logical plan's
    /// cache-key fingerprint.
    pub fn canonical_text(&self) -> String {
        match self {
            Predicate::Compare { column, op, operand } => format!("cmp(#{column} {op} {operand})"),
            Predicate::IsNull { column } => format!("is_null(#{column})"),
            Predicate::IsNotNull { column } => format!("is_not_null(#{column})"),
            Predicate::InSet { column, values } => format!("in_set(#{column} [{}])", values.sorted_key_hex().join(",")),
            Predicate::StringOp { column, op, pattern } => format!("str({op} #{column} {pattern:?})"),
            Predicate::Bool { column, want } => format!("bool(#{column} == {want})"),
            Predicate::And(children) => format!("and({})", children.iter().map(Predicate::canonical_text).collect::<Vec<_>>().join(",")),
            Predicate::Or(children) => format!("or({})", children.iter().map(Predicate::canonical_text).collect::<Vec<_>>().join(",")),
            Predicate::Not(child) => format!("not({})", child.canonical_text()),
            Predicate::Never => "never()".to_string(),
        }
    }

    /// Estimated fraction of rows this predicate retains, refined by the
    /// chunk's zone maps when available. Drives the optimizer's ascending-
    /// selectivity reordering of `And` children.
    pub fn estimate_selectivity(&self, zone_maps: &[ZoneMap]) -> f64 {
        match self {
            Predicate::Compare { column, op, operand } => {
                selectivity::estimate_compare_selectivity(*op, operand, zone_maps.get(*column))
            }
            Predicate::IsNull { column } => zone_maps
                .get(*column)
                .map(|zm| if zm.null_count > 0 { 1.0 } else { 0.0 })
                .unwrap_or(0.0),
            Predicate::IsNotNull { .. } => 1.0,
            Predicate::InSet { values, .. } => (values.len() as f64 * selectivity::DEFAULT_EQUALITY_SELECTIVITY).min(1.0),
            Predicate::StringOp { .. } => selectivity::DEFAULT_RANGE_SELECTIVITY,
            Predicate::Bool { .. } => selectivity::estimate_bool_selectivity(),
            Predicate::And(children) => children.iter().map(|c| c.estimate_selectivity(zone_maps)).product(),
            Predicate::Or(children) => {
                let all_fail: f64 = children.iter().map(|c| 1.0 - c.estimate_selectivity(zone_maps)).product();
                1.0 - all_fail
            }
            Predicate::Not(child) => 1.0 - child.estimate_selectivity(zone_maps),
            Predicate::Never => 0.0,
        }
    }

    /// Zone-map-driven chunk pruning, applied by the executor before
    /// `evaluate` runs. Only `Compare` and `IsNull`/`IsNotNull` leaves have
    /// a pruning rule; composites recurse but fall back to `Evaluate` when
    /// their children disagree (e.g. an `Or` whose branches disagree).
    pub fn chunk_disposition(&self, zone_maps: &[ZoneMap]) -> ChunkDisposition {
        match self {
            Predicate::Compare { column, op, operand } => {
                let Some(zone_map) = zone_maps.get(*column) else {
                    return ChunkDisposition::Evaluate;
                };
                if !zone_map.has_range() {
                    return if zone_map.null_count > 0 {
                        ChunkDisposition::Skip
                    } else {
                        ChunkDisposition::Evaluate
                    };
                }
                let (Some(min), Some(max), Some(target)) = (
                    zone_map.min.as_ref().and_then(Scalar::as_f64),
                    zone_map.max.as_ref().and_then(Scalar::as_f64),
                    operand.as_f64(),
                ) else {
                    return compare_against_bloom(zone_map, op, operand);
                };
                match op {
                    ComparisonOp::Gt if max <= target => ChunkDisposition::Skip,
                    ComparisonOp::Ge if max < target => ChunkDisposition::Skip,
                    ComparisonOp::Lt if min >= target => ChunkDisposition::Skip,
                    ComparisonOp::Le if min > target => ChunkDisposition::Skip,
                    ComparisonOp::Eq if target < min || target > max => ChunkDisposition::Skip,
                    ComparisonOp::Gt if min > target => ChunkDisposition::TriviallyTrue,
                    ComparisonOp::Ge if min >= target => ChunkDisposition::TriviallyTrue,
                    ComparisonOp::Lt if max < target => ChunkDisposition::TriviallyTrue,
                    ComparisonOp::Le if max <= target => ChunkDisposition::TriviallyTrue,
                    _ => ChunkDisposition::Evaluate,
                }
            }
            Predicate::InSet { .. } => ChunkDisposition::Evaluate,
            Predicate::Never => ChunkDisposition::Skip,
            Predicate::And(children) => {
                let mut all_trivial = true;
                for child in children {
                    match child.chunk_disposition(zone_maps) {
                        ChunkDisposition::Skip => return ChunkDisposition::Skip,
                        ChunkDisposition::TriviallyTrue => {}
                        ChunkDisposition::Evaluate => all_trivial = false,
                    }
                }
                if all_trivial {
                    ChunkDisposition::TriviallyTrue
                } else {
                    ChunkDisposition::Evaluate
                }
            }
            _ => ChunkDisposition::Evaluate,
        }
    }
}

fn compare_against_bloom(zone_map: &ZoneMap, op: &ComparisonOp, operand: &Scalar) -> ChunkDisposition {
    if *op != ComparisonOp::Eq {
        return ChunkDisposition::Evaluate;
    }
    match (&zone_map.distinct_bloom, operand.as_str()) {
        (Some(bloom), Some(s)) if !bloom.might_contain(s.as_bytes()) => ChunkDisposition::Skip,
        _ => ChunkDisposition::Evaluate,
    }
}
