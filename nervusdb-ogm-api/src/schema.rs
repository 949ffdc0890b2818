use crate::error::SchemaError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    #[serde(alias = "int")]
    Integer,
    Float,
    Number,
    #[serde(alias = "bool")]
    Boolean,
    Uuid,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "localdatetime")]
    LocalDateTime,
    #[serde(rename = "localtime", alias = "time")]
    LocalTime,
    Point,
    Any,
}

impl FromStr for PropertyType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "string" => PropertyType::String,
            "int" | "integer" => PropertyType::Integer,
            "float" => PropertyType::Float,
            "number" => PropertyType::Number,
            "bool" | "boolean" => PropertyType::Boolean,
            "uuid" => PropertyType::Uuid,
            "date" => PropertyType::Date,
            "datetime" => PropertyType::DateTime,
            "localdatetime" => PropertyType::LocalDateTime,
            "time" | "localtime" => PropertyType::LocalTime,
            "point" => PropertyType::Point,
            "any" => PropertyType::Any,
            _ => return Err(SchemaError::UnknownPropertyType(s.to_string())),
        })
    }
}

/// Default applied to a property missing from a create payload.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Generator(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// A named, typed property declaration.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub kind: PropertyType,
    pub primary: bool,
    pub required: bool,
    pub unique: bool,
    pub indexed: bool,
    pub hidden: bool,
    pub readonly: bool,
    /// Settable only when the entity is created.
    pub protected: bool,
    pub default: Option<DefaultValue>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
            primary: false,
            required: false,
            unique: false,
            indexed: false,
            hidden: false,
            readonly: false,
            protected: false,
            default: None,
        }
    }

    /// Marks the property as the primary key. Primary keys are unique and protected.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self.protected = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn with_generator(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Generator(Arc::new(f)));
        self
    }
}

/// What a relationship declaration materializes as on the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipShape {
    SingleNode,
    NodeList,
    SingleRelationship,
    RelationshipList,
}

impl RelationshipShape {
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            RelationshipShape::NodeList | RelationshipShape::RelationshipList
        )
    }

    /// Whether the relationship itself (its identity and properties) is exposed.
    pub fn is_relationship(self) -> bool {
        matches!(
            self,
            RelationshipShape::SingleRelationship | RelationshipShape::RelationshipList
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Both,
}

/// What happens to the far side of a relationship when its owner is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cascade {
    #[default]
    None,
    Detach,
    Delete,
}

/// Target entity type of a relationship, looked up by name when compiling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Model(String),
    /// Any node; the far side is never typed.
    Any,
}

#[derive(Debug, Clone)]
pub struct RelationshipDeclaration {
    /// Key under which the relationship appears on the owning entity.
    pub name: String,
    pub shape: RelationshipShape,
    pub rel_type: String,
    pub direction: Direction,
    pub target: Target,
    pub eager: bool,
    pub cascade: Cascade,
    /// Key holding the far node inside a relationship-shaped value.
    pub node_alias: String,
    pub properties: Vec<Property>,
}

impl RelationshipDeclaration {
    pub fn new(
        name: impl Into<String>,
        shape: RelationshipShape,
        rel_type: impl Into<String>,
        direction: Direction,
        target: Target,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            rel_type: rel_type.into(),
            direction,
            target,
            eager: false,
            cascade: Cascade::None,
            node_alias: "node".to_string(),
            properties: Vec::new(),
        }
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    pub fn cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn node_alias(mut self, alias: impl Into<String>) -> Self {
        self.node_alias = alias.into();
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn target_name(&self) -> Option<&str> {
        match &self.target {
            Target::Model(name) => Some(name),
            Target::Any => None,
        }
    }

    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A declared node type.
///
/// The sorted label list is the structural identity used to map result
/// nodes back onto their type.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    labels: Vec<String>,
    properties: IndexMap<String, Property>,
    relationships: IndexMap<String, RelationshipDeclaration>,
    primary_key: Option<String>,
    unique_keys: Vec<String>,
    indexed_keys: Vec<String>,
    hidden_keys: Vec<String>,
    readonly_keys: Vec<String>,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipDeclaration> {
        self.relationships.values()
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDeclaration> {
        self.relationships.get(name)
    }

    /// Relationships fetched together with the entity.
    pub fn eager(&self) -> impl Iterator<Item = &RelationshipDeclaration> {
        self.relationships.values().filter(|r| r.eager)
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    pub fn indexed_keys(&self) -> &[String] {
        &self.indexed_keys
    }

    pub fn hidden_keys(&self) -> &[String] {
        &self.hidden_keys
    }

    pub fn readonly_keys(&self) -> &[String] {
        &self.readonly_keys
    }

    /// Keys a MERGE pattern matches on: the primary key and unique keys.
    pub fn merge_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        if let Some(pk) = &self.primary_key {
            fields.push(pk);
        }
        for key in &self.unique_keys {
            if !fields.contains(&key.as_str()) {
                fields.push(key);
            }
        }
        fields
    }

    /// Compares against an arbitrary label list, ignoring order.
    pub fn has_labels(&self, labels: &[String]) -> bool {
        let mut sorted = labels.to_vec();
        sorted.sort();
        sorted.dedup();
        sorted == self.labels
    }

    /// Starts a derived type carrying every declaration of `self` plus `label`.
    ///
    /// `self` is left untouched; the caller adds further declarations to the
    /// returned builder and builds the new type.
    pub fn extend(&self, name: impl Into<String>, label: impl Into<String>) -> EntityTypeBuilder {
        let mut builder = EntityTypeBuilder::new(name);
        builder.labels = self.labels.clone();
        builder.labels.push(label.into());
        builder.properties = self.properties.clone();
        builder.relationships = self.relationships.clone();
        builder
    }
}

#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    name: String,
    labels: Vec<String>,
    properties: IndexMap<String, Property>,
    relationships: IndexMap<String, RelationshipDeclaration>,
}

impl EntityTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            properties: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    /// Adds a label. Without any label the type is labelled with its name.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Declares (or redeclares) a property.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    /// Declares (or redeclares) a relationship.
    pub fn relationship(mut self, relationship: RelationshipDeclaration) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn build(self) -> Result<EntityType, SchemaError> {
        let mut labels = if self.labels.is_empty() {
            vec![self.name.clone()]
        } else {
            self.labels
        };
        labels.sort();
        labels.dedup();

        if let Some(key) = self
            .relationships
            .keys()
            .find(|k| self.properties.contains_key(*k))
        {
            return Err(SchemaError::DuplicateKey {
                model: self.name,
                key: key.clone(),
            });
        }

        let mut primary_key: Option<String> = None;
        let mut unique_keys = Vec::new();
        let mut indexed_keys = Vec::new();
        let mut hidden_keys = Vec::new();
        let mut readonly_keys = Vec::new();

        for property in self.properties.values() {
            if property.primary {
                if let Some(first) = &primary_key {
                    return Err(SchemaError::MultiplePrimaryKeys {
                        model: self.name.clone(),
                        first: first.clone(),
                        second: property.name.clone(),
                    });
                }
                primary_key = Some(property.name.clone());
            } else if property.unique {
                unique_keys.push(property.name.clone());
            }
            if property.indexed {
                indexed_keys.push(property.name.clone());
            }
            if property.hidden {
                hidden_keys.push(property.name.clone());
            }
            if property.readonly {
                readonly_keys.push(property.name.clone());
            }
        }

        Ok(EntityType {
            name: self.name,
            labels,
            properties: self.properties,
            relationships: self.relationships,
            primary_key,
            unique_keys,
            indexed_keys,
            hidden_keys,
            readonly_keys,
        })
    }
}

/// The set of registered entity types, looked up by name or by label set.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: IndexMap<String, Arc<EntityType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: EntityType) -> Result<Arc<EntityType>, SchemaError> {
        if self.models.contains_key(model.name()) {
            return Err(SchemaError::DuplicateModel(model.name().to_string()));
        }
        let model = Arc::new(model);
        self.models
            .insert(model.name().to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Registers a type derived from `parent` with one extra label.
    pub fn extend(
        &mut self,
        parent: &str,
        name: impl Into<String>,
        label: impl Into<String>,
        additions: impl FnOnce(EntityTypeBuilder) -> EntityTypeBuilder,
    ) -> Result<Arc<EntityType>, SchemaError> {
        let builder = self.model(parent)?.extend(name, label);
        self.register(additions(builder).build()?)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.models.get(name)
    }

    pub fn model(&self, name: &str) -> Result<&Arc<EntityType>, SchemaError> {
        self.models
            .get(name)
            .ok_or_else(|| SchemaError::UnknownModel(name.to_string()))
    }

    /// Finds the type whose label set equals `labels` (order-insensitive).
    pub fn by_labels(&self, labels: &[String]) -> Option<&Arc<EntityType>> {
        self.models.values().find(|m| m.has_labels(labels))
    }

    /// Resolves the far side of a relationship. `Target::Any` resolves to `None`.
    pub fn target(
        &self,
        relationship: &RelationshipDeclaration,
    ) -> Result<Option<&Arc<EntityType>>, SchemaError> {
        match &relationship.target {
            Target::Model(name) => self.model(name).map(Some),
            Target::Any => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> EntityType {
        EntityType::builder("Person")
            .property(Property::new("person_id", PropertyType::Uuid).primary())
            .property(Property::new("email", PropertyType::String).unique().indexed())
            .property(Property::new("secret", PropertyType::String).hidden())
            .relationship(
                RelationshipDeclaration::new(
                    "knows",
                    RelationshipShape::NodeList,
                    "KNOWS",
                    Direction::Out,
                    Target::Model("Person".into()),
                )
                .eager(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn derived_key_sets() {
        let p = person();
        assert_eq!(p.labels(), ["Person"]);
        assert_eq!(p.primary_key(), Some("person_id"));
        assert_eq!(p.unique_keys(), ["email"]);
        assert_eq!(p.indexed_keys(), ["email"]);
        assert_eq!(p.hidden_keys(), ["secret"]);
        assert_eq!(p.merge_fields(), vec!["person_id", "email"]);
        assert!(p.property("person_id").unwrap().protected);
        assert_eq!(p.eager().count(), 1);
    }

    #[test]
    fn rejects_second_primary_key() {
        let err = EntityType::builder("Thing")
            .property(Property::new("a", PropertyType::String).primary())
            .property(Property::new("b", PropertyType::String).primary())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MultiplePrimaryKeys { .. }));
    }

    #[test]
    fn extend_leaves_parent_untouched() {
        let mut registry = Registry::new();
        registry.register(person()).unwrap();
        let admin = registry
            .extend("Person", "Admin", "Admin", |b| {
                b.property(Property::new("level", PropertyType::Integer))
            })
            .unwrap();

        assert_eq!(admin.labels(), ["Admin", "Person"]);
        assert!(admin.has_property("email"));
        assert!(admin.has_property("level"));
        let parent = registry.model("Person").unwrap();
        assert!(!parent.has_property("level"));
        assert_eq!(parent.labels(), ["Person"]);
    }

    #[test]
    fn lookup_by_labels_ignores_order() {
        let mut registry = Registry::new();
        registry.register(person()).unwrap();
        registry
            .extend("Person", "Admin", "Admin", |b| b)
            .unwrap();

        let found = registry
            .by_labels(&["Person".to_string(), "Admin".to_string()])
            .unwrap();
        assert_eq!(found.name(), "Admin");
        assert!(registry.by_labels(&["Robot".to_string()]).is_none());
    }

    #[test]
    fn unknown_target_is_reported_by_name() {
        let registry = Registry::new();
        let rel = RelationshipDeclaration::new(
            "owner",
            RelationshipShape::SingleNode,
            "OWNS",
            Direction::In,
            Target::Model("Ghost".into()),
        );
        assert_eq!(
            registry.target(&rel).unwrap_err(),
            SchemaError::UnknownModel("Ghost".into())
        );
    }
}
