//! Result hydration, the inverse of the eager projection.
//!
//! A node arrives either as a projected map carrying the `__EAGER_*__`
//! markers or as a raw driver node. Eager fields are read from projected maps
//! only, and only where the projection compiled at the same depth would have
//! expanded them.

use crate::entity::{Collection, Eager, Node, Relationship};
use nervusdb_ogm_api::{
    Direction, EntityType, Identity, PropertyMap, Registry, RelationshipDeclaration,
    RelationshipShape, RelationshipValue, Row, Value,
};
use nervusdb_ogm_query::{EAGER_ID, EAGER_LABELS, EAGER_TYPE, MAX_EAGER_DEPTH};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HydrateError {
    #[error("column {0:?} is not in the result")]
    MissingColumn(String),

    #[error("{context} has no identity marker")]
    MissingIdentity { context: String },

    #[error("no registered model has labels {0:?}")]
    UnknownLabels(Vec<String>),

    #[error("relationship {relationship:?} of {model} targets unregistered model {target:?}")]
    UnresolvedTarget {
        model: String,
        relationship: String,
        target: String,
    },

    #[error("eager field {field:?} missing from {model} result")]
    MissingEagerField { model: String, field: String },

    #[error("expected {expected} for {context}, found {found}")]
    UnexpectedValue {
        context: String,
        expected: &'static str,
        found: &'static str,
    },
}

type Result<T> = std::result::Result<T, HydrateError>;

/// Rebuilds entities from result rows.
#[derive(Debug, Clone, Copy)]
pub struct Hydrator<'a> {
    registry: &'a Registry,
    max_depth: usize,
}

impl<'a> Hydrator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            max_depth: MAX_EAGER_DEPTH,
        }
    }

    /// Must match the depth the projections were compiled with.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Hydrates column `alias` of every row. Null values are skipped.
    pub fn hydrate(
        &self,
        rows: &[Row],
        alias: &str,
        model: Option<&Arc<EntityType>>,
    ) -> Result<Collection<Node>> {
        rows.iter()
            .filter_map(|row| match row.get(alias) {
                None => Some(Err(HydrateError::MissingColumn(alias.to_string()))),
                Some(Value::Null) => None,
                Some(value) => Some(self.node(value, model, 1)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Collection::new)
    }

    /// Hydrates column `alias` of the first row.
    pub fn hydrate_first(
        &self,
        rows: &[Row],
        alias: &str,
        model: Option<&Arc<EntityType>>,
    ) -> Result<Option<Node>> {
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        match row.get(alias) {
            None => Err(HydrateError::MissingColumn(alias.to_string())),
            Some(Value::Null) => Ok(None),
            Some(value) => self.node(value, model, 1).map(Some),
        }
    }

    /// Hydrates one node value at projection depth `depth` (the root is 1).
    pub fn node(
        &self,
        value: &Value,
        model: Option<&Arc<EntityType>>,
        depth: usize,
    ) -> Result<Node> {
        self.build(value, model, depth, true)
    }

    /// The far side of an untyped relationship is projected without eager
    /// fields, whatever type its labels resolve to.
    fn target(
        &self,
        value: &Value,
        target: Option<&Arc<EntityType>>,
        depth: usize,
    ) -> Result<Node> {
        self.build(value, target, depth, target.is_some())
    }

    fn build(
        &self,
        value: &Value,
        model: Option<&Arc<EntityType>>,
        depth: usize,
        typed: bool,
    ) -> Result<Node> {
        let (identity, labels, fields, projected) = match value {
            Value::Map(map) => {
                let identity = map
                    .get(EAGER_ID)
                    .and_then(Value::as_identity)
                    .ok_or_else(|| HydrateError::MissingIdentity {
                        context: model.map_or("node", |m| m.name()).to_string(),
                    })?;
                let labels = map
                    .get(EAGER_LABELS)
                    .and_then(Value::as_list)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|l| l.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                (identity, labels, map, true)
            }
            Value::Node(node) => (node.identity, node.labels.clone(), &node.properties, false),
            other => {
                return Err(HydrateError::UnexpectedValue {
                    context: model.map_or("node", |m| m.name()).to_string(),
                    expected: "node",
                    found: other.type_name(),
                });
            }
        };

        let model = match model {
            Some(model) => Arc::clone(model),
            None => Arc::clone(
                self.registry
                    .by_labels(&labels)
                    .ok_or_else(|| HydrateError::UnknownLabels(labels.clone()))?,
            ),
        };

        let properties: PropertyMap = model
            .properties()
            .filter(|p| !p.hidden)
            .filter_map(|p| fields.get(&p.name).map(|v| (p.name.clone(), v.clone())))
            .collect();

        let mut eager = BTreeMap::new();
        if typed && projected && depth <= self.max_depth {
            for rel in model.eager() {
                let field = fields
                    .get(&rel.name)
                    .ok_or_else(|| HydrateError::MissingEagerField {
                        model: model.name().to_string(),
                        field: rel.name.clone(),
                    })?;
                let value = self.eager(&model, rel, identity, field, depth)?;
                eager.insert(rel.name.clone(), value);
            }
        }

        Ok(Node::new(identity, labels, model, properties, eager))
    }

    fn eager(
        &self,
        model: &EntityType,
        rel: &RelationshipDeclaration,
        subject: Identity,
        field: &Value,
        depth: usize,
    ) -> Result<Eager> {
        let target = self
            .registry
            .target(rel)
            .map_err(|_| HydrateError::UnresolvedTarget {
                model: model.name().to_string(),
                relationship: rel.name.clone(),
                target: rel.target_name().unwrap_or_default().to_string(),
            })?;
        let context = || format!("{}.{}", model.name(), rel.name);

        let list = |value: &'_ Value| -> Result<Vec<Value>> {
            match value {
                Value::List(items) => Ok(items.clone()),
                other => Err(HydrateError::UnexpectedValue {
                    context: context(),
                    expected: "list",
                    found: other.type_name(),
                }),
            }
        };

        Ok(match rel.shape {
            RelationshipShape::SingleNode => match field {
                Value::Null => Eager::Node(None),
                value => Eager::Node(Some(Box::new(self.target(value, target, depth + 1)?))),
            },
            RelationshipShape::NodeList => Eager::Nodes(
                list(field)?
                    .iter()
                    .map(|item| self.target(item, target, depth + 1))
                    .collect::<Result<Collection<_>>>()?,
            ),
            RelationshipShape::SingleRelationship => match field {
                Value::Null => Eager::Relationship(None),
                value => Eager::Relationship(Some(Box::new(
                    self.relationship(rel, target, subject, value, depth)?,
                ))),
            },
            RelationshipShape::RelationshipList => Eager::Relationships(
                list(field)?
                    .iter()
                    .map(|item| self.relationship(rel, target, subject, item, depth))
                    .collect::<Result<Collection<_>>>()?,
            ),
        })
    }

    fn relationship(
        &self,
        rel: &RelationshipDeclaration,
        target: Option<&Arc<EntityType>>,
        subject: Identity,
        value: &Value,
        depth: usize,
    ) -> Result<Relationship> {
        let Value::Map(map) = value else {
            return Err(HydrateError::UnexpectedValue {
                context: rel.name.clone(),
                expected: "relationship projection",
                found: value.type_name(),
            });
        };
        let identity = map
            .get(EAGER_ID)
            .and_then(Value::as_identity)
            .ok_or_else(|| HydrateError::MissingIdentity {
                context: rel.name.clone(),
            })?;
        let rel_type = map
            .get(EAGER_TYPE)
            .and_then(Value::as_str)
            .unwrap_or(&rel.rel_type)
            .to_string();
        let node = map
            .get(&rel.node_alias)
            .ok_or_else(|| HydrateError::MissingEagerField {
                model: rel.name.clone(),
                field: rel.node_alias.clone(),
            })?;
        let other = self.target(node, target, depth + 1)?;
        let properties = declared(rel, map);

        let (start, end) = if rel.direction == Direction::In {
            (other.identity(), subject)
        } else {
            (subject, other.identity())
        };
        Ok(Relationship::new(
            identity,
            rel_type,
            rel.name.clone(),
            rel.node_alias.clone(),
            properties,
            start,
            end,
            other,
        ))
    }

    /// Builds a relationship from a raw driver relationship and its already
    /// hydrated far node.
    pub fn raw_relationship(
        &self,
        rel: &RelationshipDeclaration,
        raw: &RelationshipValue,
        other: Node,
    ) -> Relationship {
        Relationship::new(
            raw.identity,
            raw.rel_type.clone(),
            rel.name.clone(),
            rel.node_alias.clone(),
            declared(rel, &raw.properties),
            raw.start,
            raw.end,
            other,
        )
    }
}

fn declared(rel: &RelationshipDeclaration, fields: &PropertyMap) -> PropertyMap {
    rel.properties
        .iter()
        .filter(|p| !p.hidden)
        .filter_map(|p| fields.get(&p.name).map(|v| (p.name.clone(), v.clone())))
        .collect()
}
