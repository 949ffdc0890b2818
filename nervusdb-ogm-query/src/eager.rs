//! Eager-fetch projections.
//!
//! An entity is returned as one map projection that inlines every eager
//! relationship as a pattern comprehension:
//!
//! ```text
//! this { .name, __EAGER_ID__: id(this), __EAGER_LABELS__: labels(this),
//!        knows: [ (this)-[this_knows_rel:KNOWS]->(this_knows_node:Person) | this_knows_node { ... } ] }
//! ```
//!
//! The root projection is at depth 1. A node projection at depth `d` expands
//! its eager relationships only while `d <= max_depth`; their targets are
//! projected at `d + 1`. That bound is what terminates self-referential
//! schemas.

use crate::ast::{
    NodePattern, PathElement, Pattern, RelationshipPattern, nested_alias, write_name,
};
use crate::error::{Error, Result};
use nervusdb_ogm_api::{EntityType, Registry, RelationshipDeclaration, RelationshipShape};
use std::fmt;

pub const EAGER_ID: &str = "__EAGER_ID__";
pub const EAGER_LABELS: &str = "__EAGER_LABELS__";
pub const EAGER_TYPE: &str = "__EAGER_TYPE__";

pub const MAX_EAGER_DEPTH: usize = 3;

/// Projection tree produced by [`EagerCompiler::projection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Node {
        alias: String,
        /// Declared property keys; `None` projects every property (`.*`).
        properties: Option<Vec<String>>,
        eager: Vec<EagerField>,
    },
    Relationship {
        alias: String,
        properties: Vec<String>,
        /// Key the far node is projected under.
        node_alias: String,
        node: Box<Projection>,
    },
}

/// `name: [ pattern | projection ]`, optionally narrowed to its first element.
#[derive(Debug, Clone, PartialEq)]
pub struct EagerField {
    pub name: String,
    pub pattern: Pattern,
    pub single: bool,
    pub projection: Projection,
}

impl Projection {
    pub fn alias(&self) -> &str {
        match self {
            Projection::Node { alias, .. } | Projection::Relationship { alias, .. } => alias,
        }
    }

    /// Number of nested node projections along the deepest path, this one included.
    pub fn depth(&self) -> usize {
        match self {
            Projection::Node { eager, .. } => {
                1 + eager
                    .iter()
                    .map(|field| field.projection.depth())
                    .max()
                    .unwrap_or(0)
            }
            Projection::Relationship { node, .. } => node.depth(),
        }
    }
}

fn write_properties(f: &mut fmt::Formatter<'_>, properties: Option<&[String]>) -> fmt::Result {
    match properties {
        None => f.write_str(".*"),
        Some(keys) => {
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(".")?;
                write_name(f, key)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Node {
                alias,
                properties,
                eager,
            } => {
                write!(f, "{alias} {{ ")?;
                if properties.as_ref().is_none_or(|keys| !keys.is_empty()) {
                    write_properties(f, properties.as_deref())?;
                    f.write_str(", ")?;
                }
                write!(f, "{EAGER_ID}: id({alias}), {EAGER_LABELS}: labels({alias})")?;
                for field in eager {
                    write!(f, ", {field}")?;
                }
                f.write_str(" }")
            }
            Projection::Relationship {
                alias,
                properties,
                node_alias,
                node,
            } => {
                write!(f, "{alias} {{ ")?;
                if !properties.is_empty() {
                    write_properties(f, Some(properties))?;
                    f.write_str(", ")?;
                }
                write!(f, "{EAGER_ID}: id({alias}), {EAGER_TYPE}: type({alias}), ")?;
                write_name(f, node_alias)?;
                write!(f, ": {node} }}")
            }
        }
    }
}

impl fmt::Display for EagerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_name(f, &self.name)?;
        write!(f, ": [ {} | {} ]", self.pattern, self.projection)?;
        if self.single {
            f.write_str("[0]")?;
        }
        Ok(())
    }
}

/// Compiles eager projections against a registry.
#[derive(Debug, Clone, Copy)]
pub struct EagerCompiler<'a> {
    registry: &'a Registry,
    max_depth: usize,
}

impl<'a> EagerCompiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            max_depth: MAX_EAGER_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Builds the projection of `alias` at `depth`. An untyped node projects
    /// `.*` and nothing eager.
    pub fn projection(
        &self,
        alias: &str,
        model: Option<&EntityType>,
        depth: usize,
    ) -> Result<Projection> {
        let Some(model) = model else {
            return Ok(Projection::Node {
                alias: alias.to_string(),
                properties: None,
                eager: Vec::new(),
            });
        };

        let properties = model
            .properties()
            .filter(|p| !p.hidden)
            .map(|p| p.name.clone())
            .collect();
        let eager = if depth <= self.max_depth {
            model
                .eager()
                .map(|rel| self.field(alias, model, rel, depth))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        Ok(Projection::Node {
            alias: alias.to_string(),
            properties: Some(properties),
            eager,
        })
    }

    fn field(
        &self,
        alias: &str,
        model: &EntityType,
        rel: &RelationshipDeclaration,
        depth: usize,
    ) -> Result<EagerField> {
        let rel_alias = nested_alias(alias, &rel.name, "rel");
        let node_alias = nested_alias(alias, &rel.name, "node");
        let target: Option<&EntityType> = self
            .registry
            .target(rel)
            .map_err(|_| Error::UnresolvedTarget {
                relationship: rel.name.clone(),
                model: model.name().to_string(),
            })?
            .map(|t| &**t);

        let pattern = Pattern {
            elements: vec![
                PathElement::Node(NodePattern {
                    variable: Some(alias.to_string()),
                    ..Default::default()
                }),
                PathElement::Relationship(RelationshipPattern {
                    variable: Some(rel_alias.clone()),
                    types: vec![rel.rel_type.clone()],
                    direction: rel.direction,
                    variable_length: None,
                }),
                PathElement::Node(NodePattern {
                    variable: Some(node_alias.clone()),
                    labels: target.map(|t| t.labels().to_vec()).unwrap_or_default(),
                    properties: Vec::new(),
                }),
            ],
        };

        let node = self.projection(&node_alias, target, depth + 1)?;
        let projection = match rel.shape {
            RelationshipShape::SingleNode | RelationshipShape::NodeList => node,
            RelationshipShape::SingleRelationship | RelationshipShape::RelationshipList => {
                Projection::Relationship {
                    alias: rel_alias,
                    properties: rel.properties.iter().map(|p| p.name.clone()).collect(),
                    node_alias: rel.node_alias.clone(),
                    node: Box::new(node),
                }
            }
        };

        Ok(EagerField {
            name: rel.name.clone(),
            pattern,
            single: !rel.shape.is_collection(),
            projection,
        })
    }

    /// Renders the root projection of `alias`.
    pub fn compile(&self, alias: &str, model: &EntityType) -> Result<String> {
        Ok(self.projection(alias, Some(model), 1)?.to_string())
    }

    /// `RETURN` item for the root projection: `alias { ... } AS alias`.
    pub fn return_expression(&self, alias: &str, model: &EntityType) -> Result<String> {
        Ok(format!("{} AS {alias}", self.compile(alias, model)?))
    }
}
