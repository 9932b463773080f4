//! Core data types shared by the index, the graph walker, and the stores.

use serde::{Deserialize, Serialize};

/// One extracted text value of a record, attributed to the entity that owns
/// the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchableValueEntry {
    pub record_id: String,
    pub owner_entity_id: String,
    pub value: String,
}

/// A catalog entity. Only the id and kind matter to resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub kind: String,
}

/// A directed, typed edge between two entities.
///
/// Traversal treats every edge as usable in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from_entity_id: String,
    pub from_kind: String,
    pub to_entity_id: String,
    pub to_kind: String,
}

/// An entity adjacent to another, as returned by neighbor lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Neighbor {
    pub entity_id: String,
    pub kind: String,
}

/// Declared datatype of a record field, which decides how searchable text
/// is derived from its value.
///
/// Datatype tags arrive as strings from the catalog schema; anything not
/// recognized maps to [`ValueKind::Unknown`] and contributes no text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueKind {
    /// Localized string: `{"en": {"value": "..."}}`.
    PlainText,
    /// A single controlled-vocabulary value id.
    SingleReference,
    /// A list of controlled-vocabulary value ids.
    ReferenceList,
    /// Related-resource references: `[{"resourceId": "..."}]`.
    ResourceList,
    Unknown(String),
}

impl ValueKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "plainText" | "string" => Self::PlainText,
            "singleReference" | "concept" => Self::SingleReference,
            "referenceList" | "concept-list" => Self::ReferenceList,
            "resourceList" | "resource-instance" | "resource-instance-list" => Self::ResourceList,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PlainText => "plainText",
            Self::SingleReference => "singleReference",
            Self::ReferenceList => "referenceList",
            Self::ResourceList => "resourceList",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether values of this kind can produce searchable text at all.
    pub fn is_indexable(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for ValueKind {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<ValueKind> for String {
    fn from(kind: ValueKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One field of a structured record, with its declared kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field_id: String,
    pub kind: ValueKind,
    pub value: serde_json::Value,
}

/// A structured record as handed over by the record-save workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub owner_entity_id: String,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

/// The values extracted from one record, ready to be written to an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub record_id: String,
    pub owner_entity_id: String,
    pub values: Vec<String>,
}

/// Inputs for one relationship-aware search.
#[derive(Debug, Clone)]
pub struct ResolutionQuery {
    pub terms: Vec<String>,
    pub target_kind: String,
    pub max_depth: usize,
}

/// Case folding used on both stored values and query terms.
///
/// Matching is containment of the folded term within the folded value.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
