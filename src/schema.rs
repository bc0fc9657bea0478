//! Strongly-typed schema model. The resolver produces it, the emitters read it,
//! and the normalizer writes `type` attributes in exactly this shape.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One type expression.
///
/// Serializes as the oneof wrapper used by the canonical form:
/// `{"name": "File"}`, `{"array": {"items": ..}}`, `{"oneof": {"types": [..]}}`,
/// `{"record": {"name": .., "fields": [..]}}`, `{"enum": {"name": .., "symbols": [..]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSchema {
    #[serde(rename = "name")]
    NamedRef(String),
    #[serde(rename = "array")]
    ArrayOf(ArraySchema),
    #[serde(rename = "oneof")]
    OneOf(OneOfSchema),
    #[serde(rename = "record")]
    Record(RecordSchema),
    #[serde(rename = "enum")]
    Enum(EnumSchema),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArraySchema {
    pub items: Box<TypeSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OneOfSchema {
    pub types: Vec<TypeSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumSchema {
    #[serde(default)]
    pub name: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl TypeSchema {
    pub fn named(name: impl Into<String>) -> Self {
        TypeSchema::NamedRef(name.into())
    }

    pub fn array_of(items: TypeSchema) -> Self {
        TypeSchema::ArrayOf(ArraySchema { items: Box::new(items) })
    }

    pub fn one_of(types: Vec<TypeSchema>) -> Self {
        TypeSchema::OneOf(OneOfSchema { types })
    }

    /// `true` for the Avro `null` type reference.
    pub fn is_null(&self) -> bool {
        matches!(self, TypeSchema::NamedRef(n) if n == "null")
    }

    /// The name a reference, record or enum is known by.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            TypeSchema::NamedRef(n) => Some(n),
            TypeSchema::Record(r) => Some(&r.name),
            TypeSchema::Enum(e) => Some(&e.name),
            TypeSchema::ArrayOf(_) | TypeSchema::OneOf(_) => None,
        }
    }

    /// Drop `null` members of a union; a union left with one member collapses
    /// to that member.
    pub fn without_null(&self) -> TypeSchema {
        match self {
            TypeSchema::OneOf(u) => {
                let mut rest: Vec<TypeSchema> = u.types.iter().filter(|t| !t.is_null()).cloned().collect();
                if rest.len() == 1 {
                    rest.remove(0)
                } else {
                    TypeSchema::one_of(rest)
                }
            }
            other => other.clone(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// Parent names with any `prefix#` stripped.
    pub extends: Vec<String>,
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub symbols: Vec<String>,
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Record(RecordDef),
    Enum(EnumDef),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Record(r) => &r.name,
            Definition::Enum(e) => &e.name,
        }
    }
}

/// Name → definition, in the order definitions were first seen.
/// Built once per schema-compiler run; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    defs: IndexMap<String, Definition>,
}

impl Registry {
    pub(crate) fn from_defs(defs: IndexMap<String, Definition>) -> Self {
        Self { defs }
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.defs.get(name)
    }

    pub fn record(&self, name: &str) -> Option<&RecordDef> {
        match self.defs.get(name) {
            Some(Definition::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordDef> {
        self.defs.values().filter_map(|d| match d {
            Definition::Record(r) => Some(r),
            Definition::Enum(_) => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDef> {
        self.defs.values().filter_map(|d| match d {
            Definition::Enum(e) => Some(e),
            Definition::Record(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
