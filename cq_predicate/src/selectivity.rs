use cq_schema::Scalar;
use cq_store::ZoneMap;

use crate::leaf::ComparisonOp;

/// Default, operator-based selectivity estimates, used when no zone map (or
/// no usable min/max) is available for the column.
pub const DEFAULT_EQUALITY_SELECTIVITY: f64 = 0.1;
pub const DEFAULT_RANGE_SELECTIVITY: f64 = 0.3;
pub const DEFAULT_BOOL_TRUE_SELECTIVITY: f64 = 0.5;

/// Estimates the fraction of rows a comparison predicate is expected to
/// retain, refining the operator-based default with the zone map's
/// min/max under a uniform-distribution assumption when one is available.
pub fn estimate_compare_selectivity(op: ComparisonOp, operand: &Scalar, zone_map: Option<&ZoneMap>) -> f64 {
    let default = match op {
        ComparisonOp::Eq | ComparisonOp::Ne => DEFAULT_EQUALITY_SELECTIVITY,
        ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge => DEFAULT_RANGE_SELECTIVITY,
    };

    let Some(zone_map) = zone_map else { return default };
    let (Some(min), Some(max), Some(target)) = (
        zone_map.min.as_ref().and_then(Scalar::as_f64),
        zone_map.max.as_ref().and_then(Scalar::as_f64),
        operand.as_f64(),
    ) else {
        return default;
    };
    if max <= min {
        return default;
    }
    let span = max - min;
    let fraction_le = ((target - min) / span).clamp(0.0, 1.0);

    match op {
        ComparisonOp::Eq => (1.0 / span.max(1.0)).clamp(0.0, 1.0),
        ComparisonOp::Ne => 1.0 - (1.0 / span.max(1.0)).clamp(0.0, 1.0),
        ComparisonOp::Lt | ComparisonOp::Le => fraction_le,
        ComparisonOp::Gt | ComparisonOp::Ge => 1.0 - fraction_le,
    }
}

pub fn estimate_is_null_selectivity(len: usize, zone_map: Option<&ZoneMap>) -> f64 {
    match zone_map {
        Some(zm) if len > 0 => zm.null_count as f64 / len as f64,
        _ => 0.0,
    }
}

pub fn estimate_bool_selectivity() -> f64 {
    DEFAULT_BOOL_TRUE_SELECTIVITY
}
