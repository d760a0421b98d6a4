use std::sync::Arc;

use crate::field::{Field, FieldSpec};

/// An ordered, immutable sequence of [`Field`]s.
///
/// Construction is the only place ordinals are assigned; after that a
/// `Schema` never changes, so it is cheap to share (`Arc`-wrapped) across
/// chunks, plans, and worker threads with no locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Arc<[Field]>,
}

/// Raised when a [`Schema`] is constructed with a duplicate column name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate column name in schema: {0:?}")]
pub struct DuplicateFieldName(pub String);

impl Schema {
    pub fn new(specs: impl IntoIterator<Item = FieldSpec>) -> Result<Self, DuplicateFieldName> {
        let mut seen = std::collections::HashSet::new();
        let fields: Vec<Field> = specs
            .into_iter()
            .enumerate()
            .map(|(ordinal, spec)| {
                if !seen.insert(spec.name.clone()) {
                    return Err(DuplicateFieldName(spec.name));
                }
                Ok(Field::new(spec.name, spec.logical_type, spec.nullable, ordinal))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            fields: fields.into(),
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, ordinal: usize) -> Option<&Field> {
        self.fields.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a column name to its ordinal. Linear scan: schemas are small
    /// (tens of columns) and this only runs at plan-build time, never in a
    /// per-row hot loop.
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Build the schema that results from keeping only the named output
    /// columns, in the given order (used by `Project`).
    pub fn project(&self, ordinals: &[usize]) -> Schema {
        let fields = ordinals
            .iter()
            .enumerate()
            .map(|(new_ordinal, &old_ordinal)| {
                let f = &self.fields[old_ordinal];
                Field::new(f.name().to_string(), f.logical_type(), f.nullable(), new_ordinal)
            })
            .collect::<Vec<_>>();
        Schema { fields: fields.into() }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        write!(f, "]")
    }
}
