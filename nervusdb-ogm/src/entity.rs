//! Hydrated entities.
//!
//! [`Node`]s and [`Relationship`]s are only built by the hydrator. A
//! relationship owns the hydrated node on its far side and refers to the
//! subject by identity only.

use nervusdb_ogm_api::{EntityType, Identity, NodeValue, PropertyMap, Value};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Node {
    identity: Identity,
    labels: Vec<String>,
    model: Arc<EntityType>,
    properties: PropertyMap,
    eager: BTreeMap<String, Eager>,
}

/// Eagerly loaded value of one relationship declaration.
#[derive(Debug, Clone)]
pub enum Eager {
    Node(Option<Box<Node>>),
    Nodes(Collection<Node>),
    Relationship(Option<Box<Relationship>>),
    Relationships(Collection<Relationship>),
}

#[derive(Debug, Clone)]
pub struct Relationship {
    identity: Identity,
    rel_type: String,
    /// Declaration the relationship was loaded through.
    name: String,
    node_alias: String,
    properties: PropertyMap,
    start: Identity,
    end: Identity,
    other: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl Node {
    pub(crate) fn new(
        identity: Identity,
        labels: Vec<String>,
        model: Arc<EntityType>,
        properties: PropertyMap,
        eager: BTreeMap<String, Eager>,
    ) -> Self {
        Self {
            identity,
            labels,
            model,
            properties,
            eager,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn model(&self) -> &Arc<EntityType> {
        &self.model
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Eager value loaded for the relationship declared as `name`.
    pub fn eager(&self, name: &str) -> Option<&Eager> {
        self.eager.get(name)
    }

    pub fn eager_values(&self) -> &BTreeMap<String, Eager> {
        &self.eager
    }

    /// A value that nested writes resolve by identity instead of merging.
    pub fn reference(&self) -> Value {
        Value::Node(NodeValue {
            identity: self.identity,
            labels: self.labels.clone(),
            properties: self.properties.clone(),
        })
    }

    /// `{ "_id": .., "_labels": [..], ...properties, ...eager }`
    pub fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("_id".into(), Json::from(self.identity));
        out.insert("_labels".into(), Json::from(self.labels.clone()));
        for (key, value) in &self.properties {
            out.insert(key.clone(), value.to_json());
        }
        for (key, eager) in &self.eager {
            out.insert(key.clone(), eager.to_json());
        }
        Json::Object(out)
    }
}

impl Eager {
    pub fn to_json(&self) -> Json {
        match self {
            Eager::Node(node) => node.as_ref().map_or(Json::Null, |n| n.to_json()),
            Eager::Nodes(nodes) => nodes.to_json(),
            Eager::Relationship(rel) => rel.as_ref().map_or(Json::Null, |r| r.to_json()),
            Eager::Relationships(rels) => rels.to_json(),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Eager::Node(node) => node.as_deref(),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&Collection<Node>> {
        match self {
            Eager::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Eager::Relationship(rel) => rel.as_deref(),
            _ => None,
        }
    }

    pub fn as_relationships(&self) -> Option<&Collection<Relationship>> {
        match self {
            Eager::Relationships(rels) => Some(rels),
            _ => None,
        }
    }
}

impl Relationship {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        identity: Identity,
        rel_type: String,
        name: String,
        node_alias: String,
        properties: PropertyMap,
        start: Identity,
        end: Identity,
        other: Node,
    ) -> Self {
        Self {
            identity,
            rel_type,
            name,
            node_alias,
            properties,
            start,
            end,
            other: Box::new(other),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn start_identity(&self) -> Identity {
        self.start
    }

    pub fn end_identity(&self) -> Identity {
        self.end
    }

    /// The node on the far side from the entity the relationship was loaded from.
    pub fn other(&self) -> &Node {
        &self.other
    }

    /// `{ "_id": .., "_type": .., ...properties, <node alias>: {..} }`
    pub fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("_id".into(), Json::from(self.identity));
        out.insert("_type".into(), Json::from(self.rel_type.clone()));
        for (key, value) in &self.properties {
            out.insert(key.clone(), value.to_json());
        }
        out.insert(self.node_alias.clone(), self.other.to_json());
        Json::Object(out)
    }
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Collection<Node> {
    pub fn to_json(&self) -> Json {
        Json::Array(self.items.iter().map(Node::to_json).collect())
    }
}

impl Collection<Relationship> {
    pub fn to_json(&self) -> Json {
        Json::Array(self.items.iter().map(Relationship::to_json).collect())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for Relationship {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
