//! T84: the hydrator reads back exactly the eager depth the compiler projects

use nervusdb_ogm::{
    Direction, Eager, EntityType, HydrateError, Hydrator, Node, Property, PropertyMap,
    PropertyType, Registry, RelationshipDeclaration, RelationshipShape, Target, Value,
};
use nervusdb_ogm_query::eager::Projection;
use nervusdb_ogm_query::{EAGER_ID, EAGER_LABELS, EAGER_TYPE, EagerCompiler, MAX_EAGER_DEPTH};

fn self_referential() -> Registry {
    let person = EntityType::builder("Person")
        .property(Property::new("name", PropertyType::String))
        .relationship(
            RelationshipDeclaration::new(
                "friend",
                RelationshipShape::SingleNode,
                "KNOWS",
                Direction::Both,
                Target::Model("Person".into()),
            )
            .eager(),
        )
        .relationship(
            RelationshipDeclaration::new(
                "mentors",
                RelationshipShape::RelationshipList,
                "MENTORS",
                Direction::Out,
                Target::Model("Person".into()),
            )
            .eager()
            .node_alias("mentee"),
        )
        .build()
        .unwrap();
    let mut registry = Registry::new();
    registry.register(person).unwrap();
    registry
}

/// A result value with exactly the shape `projection` returns.
fn sample(projection: &Projection, next_id: &mut i64) -> Value {
    *next_id += 1;
    let mut map = PropertyMap::from([(EAGER_ID.to_string(), Value::Int(*next_id))]);
    match projection {
        Projection::Node {
            properties, eager, ..
        } => {
            map.insert(
                EAGER_LABELS.to_string(),
                Value::List(vec![Value::from("Person")]),
            );
            for key in properties.iter().flatten() {
                map.insert(key.clone(), Value::from(format!("{key} {next_id}")));
            }
            for field in eager {
                let value = sample(&field.projection, next_id);
                let value = if field.single {
                    value
                } else {
                    Value::List(vec![value])
                };
                map.insert(field.name.clone(), value);
            }
        }
        Projection::Relationship {
            node_alias, node, ..
        } => {
            map.insert(EAGER_TYPE.to_string(), Value::from("MENTORS"));
            map.insert(node_alias.clone(), sample(node, next_id));
        }
    }
    Value::Map(map)
}

/// Nodes along the `friend` chain, the root included.
fn friend_chain(node: &Node) -> usize {
    1 + node
        .eager("friend")
        .and_then(Eager::as_node)
        .map_or(0, friend_chain)
}

fn hydrate(
    registry: &Registry,
    compiled_with: usize,
    read_with: usize,
) -> Result<Node, HydrateError> {
    let person = registry.model("Person").unwrap();
    let projection = EagerCompiler::new(registry)
        .with_max_depth(compiled_with)
        .projection("this", Some(person), 1)
        .unwrap();
    let value = sample(&projection, &mut 0);
    Hydrator::new(registry)
        .with_max_depth(read_with)
        .node(&value, Some(person), 1)
}

#[test]
fn default_depth_round_trips_to_the_last_projected_level() {
    let registry = self_referential();
    let person = registry.model("Person").unwrap();
    let projection = EagerCompiler::new(&registry)
        .projection("this", Some(person), 1)
        .unwrap();
    assert_eq!(projection.depth(), MAX_EAGER_DEPTH + 1);

    let node = hydrate(&registry, MAX_EAGER_DEPTH, MAX_EAGER_DEPTH).unwrap();
    assert_eq!(friend_chain(&node), projection.depth());

    let mut deepest = &node;
    while let Some(next) = deepest.eager("friend").and_then(Eager::as_node) {
        deepest = next;
    }
    // The last level carries properties but no eager fields.
    assert!(deepest.get("name").is_some());
    assert!(deepest.eager_values().is_empty());

    let mentee = node
        .eager("mentors")
        .and_then(Eager::as_relationships)
        .and_then(|rels| rels.first())
        .map(|rel| rel.other())
        .unwrap();
    assert!(!mentee.eager_values().is_empty());
}

#[test]
fn every_configured_depth_agrees() {
    let registry = self_referential();
    for max in 0..6 {
        let node = hydrate(&registry, max, max).unwrap();
        assert_eq!(friend_chain(&node), max + 1, "max depth {max}");
    }
}

#[test]
fn reading_deeper_than_compiled_reports_the_missing_field() {
    let registry = self_referential();
    let err = hydrate(&registry, 1, 2).unwrap_err();
    assert!(matches!(err, HydrateError::MissingEagerField { field, .. } if field == "friend"));
}
