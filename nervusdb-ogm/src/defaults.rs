use async_trait::async_trait;
use nervusdb_ogm_api::{EntityType, PropertyMap, PropertyType, Value};
use nervusdb_ogm_query::write::mark_defaulted;

/// Fills in values a create payload left out.
#[async_trait]
pub trait DefaultValues: Send + Sync {
    async fn apply(&self, model: &EntityType, properties: PropertyMap) -> PropertyMap;
}

/// Applies declared defaults, and a fresh v4 id to every uuid property
/// that has neither a value nor a default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDefaults;

#[async_trait]
impl DefaultValues for SchemaDefaults {
    async fn apply(&self, model: &EntityType, mut properties: PropertyMap) -> PropertyMap {
        for property in model.properties() {
            if properties.get(&property.name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let value = match (&property.default, property.kind) {
                (Some(default), _) => default.resolve(),
                (None, PropertyType::Uuid) => Value::String(uuid::Uuid::new_v4().to_string()),
                (None, _) => continue,
            };
            properties.insert(property.name.clone(), value);
        }
        properties
    }
}

/// Runs `defaults` over a payload and records which declared properties it
/// filled in, so that a merge writes them only when it creates the entity.
pub async fn fill_defaults(
    defaults: &dyn DefaultValues,
    model: &EntityType,
    properties: PropertyMap,
) -> PropertyMap {
    let missing: Vec<String> = model
        .properties()
        .filter(|p| properties.get(&p.name).is_none_or(Value::is_null))
        .map(|p| p.name.clone())
        .collect();
    let mut properties = defaults.apply(model, properties).await;
    let filled = missing
        .into_iter()
        .filter(|name| properties.get(name).is_some_and(|v| !v.is_null()))
        .collect();
    mark_defaulted(&mut properties, filled);
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use nervusdb_ogm_api::Property;
    use nervusdb_ogm_query::DEFAULTED_KEYS;

    #[test]
    fn fills_only_missing_values() {
        let model = EntityType::builder("Task")
            .property(Property::new("id", PropertyType::Uuid).primary())
            .property(Property::new("done", PropertyType::Boolean).with_default(false))
            .property(Property::new("title", PropertyType::String))
            .build()
            .unwrap();

        let out = block_on(SchemaDefaults.apply(
            &model,
            PropertyMap::from([("done".to_string(), Value::Bool(true))]),
        ));

        assert_eq!(out.get("done"), Some(&Value::Bool(true)));
        assert!(!out.contains_key("title"));
        let id = out.get("id").and_then(Value::as_str).unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn records_the_keys_it_filled_in() {
        let model = EntityType::builder("Task")
            .property(Property::new("id", PropertyType::Uuid).primary())
            .property(Property::new("done", PropertyType::Boolean).with_default(false))
            .property(Property::new("title", PropertyType::String))
            .build()
            .unwrap();

        let out = block_on(fill_defaults(
            &SchemaDefaults,
            &model,
            PropertyMap::from([("done".to_string(), Value::Bool(true))]),
        ));

        assert_eq!(
            out.get(DEFAULTED_KEYS),
            Some(&Value::List(vec![Value::from("id")]))
        );
    }
}
