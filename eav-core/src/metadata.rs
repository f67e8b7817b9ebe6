//! Scheme, structure and type definitions.
//!
//! A scheme is the EAV counterpart of a table definition: a named shape made
//! of structures (attributes), each typed by a [`TypeInfo`].

use crate::{SchemeId, TypeId};
use serde::{Deserialize, Serialize};

/// An attribute of a scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub id: i64,
    pub scheme_id: SchemeId,
    pub name: String,
    pub type_id: TypeId,
    pub is_array: bool,
    pub is_required: bool,
}

/// Object type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    pub id: SchemeId,
    pub name: String,
    pub alias: Option<String>,
    pub parent_id: Option<SchemeId>,
    pub structures: Vec<Structure>,
}

impl Scheme {
    /// A scheme with no parent and no structures.
    pub fn new(id: SchemeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alias: None,
            parent_id: None,
            structures: Vec::new(),
        }
    }

    /// Attach a structure.
    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structures.push(structure);
        self
    }

    /// Look up a structure by name.
    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }
}

/// Value type of a structure, e.g. `String` stored in the `_String` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    pub db_type: String,
}

impl TypeInfo {
    pub fn new(id: TypeId, name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            db_type: db_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_lookup() {
        let scheme = Scheme::new(7, "Invoice").with_structure(Structure {
            id: 70,
            scheme_id: 7,
            name: "Total".to_string(),
            type_id: 3,
            is_array: false,
            is_required: true,
        });

        assert_eq!(scheme.structure("Total").map(|s| s.id), Some(70));
        assert!(scheme.structure("Missing").is_none());
    }
}
