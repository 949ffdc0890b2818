//! Constraint and index statements derived from the schema.
//!
//! Primary and unique properties get a uniqueness constraint, other indexed
//! properties an index. Existence constraints on required properties are an
//! enterprise feature and only emitted on request.

use crate::ast::quote_name;
use crate::builder::CompiledQuery;
use nervusdb_ogm_api::{EntityType, PropertyMap, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Unique,
    Exists,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SchemaItem {
    kind: Kind,
    name: String,
    label: String,
    property: String,
}

impl SchemaItem {
    fn new(kind: Kind, label: &str, property: &str) -> Self {
        let suffix = match kind {
            Kind::Unique => "unique",
            Kind::Exists => "exists",
            Kind::Index => "index",
        };
        let name = format!("{label}_{property}_{suffix}")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self {
            kind,
            name,
            label: label.to_string(),
            property: property.to_string(),
        }
    }

    fn install(&self) -> String {
        let label = quote_name(&self.label);
        let property = quote_name(&self.property);
        match self.kind {
            Kind::Unique => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS UNIQUE",
                self.name
            ),
            Kind::Exists => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS NOT NULL",
                self.name
            ),
            Kind::Index => format!(
                "CREATE INDEX {} IF NOT EXISTS FOR (n:{label}) ON (n.{property})",
                self.name
            ),
        }
    }

    fn drop(&self) -> String {
        match self.kind {
            Kind::Unique | Kind::Exists => format!("DROP CONSTRAINT {} IF EXISTS", self.name),
            Kind::Index => format!("DROP INDEX {} IF EXISTS", self.name),
        }
    }
}

/// Label constraints are attached to: the model name when it is one of the
/// labels, otherwise the first label.
fn schema_label(model: &EntityType) -> &str {
    model
        .labels()
        .iter()
        .find(|label| *label == model.name())
        .or_else(|| model.labels().first())
        .map_or(model.name(), String::as_str)
}

fn items(registry: &Registry, enterprise: bool) -> Vec<SchemaItem> {
    let mut items: Vec<SchemaItem> = Vec::new();
    let mut push = |item: SchemaItem| {
        if !items.iter().any(|existing| existing.name == item.name) {
            items.push(item);
        }
    };

    for model in registry.iter() {
        let label = schema_label(model);
        for property in model.properties() {
            if property.unique {
                push(SchemaItem::new(Kind::Unique, label, &property.name));
            } else if property.indexed {
                push(SchemaItem::new(Kind::Index, label, &property.name));
            }
            if enterprise && property.required {
                push(SchemaItem::new(Kind::Exists, label, &property.name));
            }
        }
    }
    items
}

/// Statements creating every constraint and index, skipping existing ones.
pub fn install(registry: &Registry, enterprise: bool) -> Vec<CompiledQuery> {
    items(registry, enterprise)
        .iter()
        .map(|item| CompiledQuery::new(item.install(), PropertyMap::new()))
        .collect()
}

/// Statements dropping everything [`install`] creates.
pub fn drop(registry: &Registry, enterprise: bool) -> Vec<CompiledQuery> {
    items(registry, enterprise)
        .iter()
        .map(|item| CompiledQuery::new(item.drop(), PropertyMap::new()))
        .collect()
}
