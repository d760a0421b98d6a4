//! Frozen schema, logical types, and scalar values -- the vocabulary every
//! other `cq` crate builds on.

mod field;
mod logical_type;
mod scalar;
mod schema;

pub use field::{Field, FieldSpec};
pub use logical_type::{LogicalType, TimeUnit};
pub use scalar::Scalar;
pub use schema::{DuplicateFieldName, Schema};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new([
            FieldSpec::new("id", LogicalType::Int32, false),
            FieldSpec::new("name", LogicalType::Utf8, true),
            FieldSpec::new("age", LogicalType::Int32, true),
        ])
        .unwrap()
    }

    #[test]
    fn ordinals_are_assigned_in_order() {
        let schema = sample_schema();
        assert_eq!(schema.field(0).unwrap().name(), "id");
        assert_eq!(schema.field(1).unwrap().name(), "name");
        assert_eq!(schema.field(2).unwrap().name(), "age");
        assert_eq!(schema.ordinal_of("age"), Some(2));
        assert_eq!(schema.ordinal_of("missing"), None);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Schema::new([
            FieldSpec::new("id", LogicalType::Int32, false),
            FieldSpec::new("id", LogicalType::Int32, false),
        ])
        .unwrap_err();
        assert_eq!(err.0, "id");
    }

    #[test]
    fn project_renumbers_ordinals() {
        let schema = sample_schema();
        let projected = schema.project(&[2, 0]);
        assert_eq!(projected.field(0).unwrap().name(), "age");
        assert_eq!(projected.field(0).unwrap().ordinal(), 0);
        assert_eq!(projected.field(1).unwrap().name(), "id");
        assert_eq!(projected.field(1).unwrap().ordinal(), 1);
    }

    #[test]
    fn scalar_total_order_on_floats() {
        let mut v = vec![
            Scalar::Float64(ordered_float::OrderedFloat(3.0)),
            Scalar::Float64(ordered_float::OrderedFloat(1.0)),
            Scalar::Float64(ordered_float::OrderedFloat(2.0)),
        ];
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(v[0].as_f64(), Some(1.0));
        assert_eq!(v[2].as_f64(), Some(3.0));
    }
}
