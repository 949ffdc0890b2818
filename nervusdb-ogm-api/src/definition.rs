//! Declarative schema documents.
//!
//! A schema document maps model names to a map of declaration keys:
//!
//! ```json
//! {
//!   "Person": {
//!     "labels": ["Person"],
//!     "person_id": { "type": "uuid", "primary": true },
//!     "name": "string",
//!     "knows": {
//!       "type": "relationships", "relationship": "KNOWS", "direction": "out",
//!       "target": "Person", "eager": true, "alias": "friend",
//!       "properties": { "since": "datetime" }
//!     }
//!   }
//! }
//! ```
//!
//! Declarations whose `type` is `node`, `nodes`, `relationship` or
//! `relationships` declare relationships; everything else is a property.

use crate::error::SchemaError;
use crate::schema::{
    Cascade, Direction, EntityType, Property, PropertyType, Registry, RelationshipDeclaration,
    RelationshipShape, Target,
};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SchemaDefinition {
    pub models: IndexMap<String, ModelDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub entries: IndexMap<String, EntryDefinition>,
}

/// A declaration written either as a bare type name or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryDefinition {
    Type(String),
    Declaration(DeclarationDefinition),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeclarationDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub primary: bool,
    pub required: bool,
    pub unique: bool,
    pub index: bool,
    pub hidden: bool,
    pub readonly: bool,
    pub protected: bool,
    pub default: Option<serde_json::Value>,
    pub relationship: Option<String>,
    pub direction: Option<Direction>,
    pub target: Option<String>,
    pub eager: bool,
    pub cascade: Option<Cascade>,
    pub alias: Option<String>,
    pub properties: IndexMap<String, EntryDefinition>,
}

impl SchemaDefinition {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds every model and registers it in declaration order.
    pub fn into_registry(self) -> Result<Registry, SchemaError> {
        let mut registry = Registry::new();
        for (name, model) in self.models {
            registry.register(model.into_entity_type(name)?)?;
        }
        Ok(registry)
    }
}

impl ModelDefinition {
    pub fn into_entity_type(self, name: String) -> Result<EntityType, SchemaError> {
        let mut builder = EntityType::builder(name.clone());
        for label in self.labels {
            builder = builder.label(label);
        }
        for (key, entry) in self.entries {
            let decl = entry.into_declaration();
            match relationship_shape(&decl.kind) {
                Some(shape) => {
                    builder = builder.relationship(relationship(&name, key, shape, decl)?);
                }
                None => builder = builder.property(property(&name, key, decl)?),
            }
        }
        builder.build()
    }
}

impl EntryDefinition {
    fn into_declaration(self) -> DeclarationDefinition {
        match self {
            EntryDefinition::Type(kind) => DeclarationDefinition {
                kind,
                ..Default::default()
            },
            EntryDefinition::Declaration(decl) => decl,
        }
    }
}

fn relationship_shape(kind: &str) -> Option<RelationshipShape> {
    match kind {
        "node" => Some(RelationshipShape::SingleNode),
        "nodes" => Some(RelationshipShape::NodeList),
        "relationship" => Some(RelationshipShape::SingleRelationship),
        "relationships" => Some(RelationshipShape::RelationshipList),
        _ => None,
    }
}

fn property(model: &str, key: String, decl: DeclarationDefinition) -> Result<Property, SchemaError> {
    let kind: PropertyType = decl.kind.parse().map_err(|_| SchemaError::InvalidDefinition {
        model: model.to_string(),
        key: key.clone(),
        message: format!("unknown type {:?}", decl.kind),
    })?;
    let mut property = Property::new(key, kind);
    if decl.primary {
        property = property.primary();
    }
    property.required |= decl.required;
    property.unique |= decl.unique;
    property.indexed |= decl.index;
    property.hidden |= decl.hidden;
    property.readonly |= decl.readonly;
    property.protected |= decl.protected;
    if let Some(default) = decl.default {
        property = property.with_default(Value::from(default));
    }
    Ok(property)
}

fn relationship(
    model: &str,
    key: String,
    shape: RelationshipShape,
    decl: DeclarationDefinition,
) -> Result<RelationshipDeclaration, SchemaError> {
    let Some(rel_type) = decl.relationship else {
        return Err(SchemaError::InvalidDefinition {
            model: model.to_string(),
            key,
            message: "missing relationship type".into(),
        });
    };
    let target = match decl.target.as_deref() {
        None | Some("*") => Target::Any,
        Some(name) => Target::Model(name.to_string()),
    };
    let mut rel = RelationshipDeclaration::new(
        key,
        shape,
        rel_type,
        decl.direction.unwrap_or(Direction::Out),
        target,
    )
    .cascade(decl.cascade.unwrap_or_default());
    if decl.eager {
        rel = rel.eager();
    }
    if let Some(alias) = decl.alias {
        rel = rel.node_alias(alias);
    }
    for (prop_key, entry) in decl.properties {
        rel = rel.property(property(model, prop_key, entry.into_declaration())?);
    }
    Ok(rel)
}
