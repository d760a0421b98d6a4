use crate::LogicalType;

/// One column of a [`crate::Schema`].
///
/// Once a schema is frozen, a field's name, type, nullability, and ordinal
/// never change -- the ordinal is the one piece of identity the rest of the
/// engine carries around (predicates, logical-plan nodes, zone maps all key
/// off of it rather than the name, so lookups never touch a string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    logical_type: LogicalType,
    nullable: bool,
    ordinal: usize,
}

impl Field {
    pub(crate) fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
            ordinal,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}{}",
            self.name,
            self.logical_type,
            if self.nullable { "?" } else { "" }
        )
    }
}

/// A field description before a [`crate::Schema`] assigns it an ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }
}
