//! Nested create/merge compilation.
//!
//! A property bag may carry related entities under relationship keys. The
//! compiler first plans the whole write as a [`WritePlan`] tree, then renders
//! the tree into a [`QueryBuilder`]:
//!
//! ```text
//! CREATE (this:Person { name: $this_name })
//! WITH this
//! MERGE (this_employer_node:Company { name: $this_employer_node_name })
//! CREATE (this)-[this_employer_rel:WORKS_AT]->(this_employer_node)
//! ```
//!
//! Related entities are referenced in one of three ways: a node returned by
//! an earlier query (matched by identity), a scalar (merged on the target's
//! primary key), or a nested property bag (planned recursively in merge mode).

use crate::ast::{nested_alias, quote_name};
use crate::builder::{Labels, QueryBuilder};
use crate::error::{Error, Result};
use nervusdb_ogm_api::{
    Direction, EntityType, Identity, PropertyMap, Registry, RelationshipDeclaration, Value,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_CREATE_DEPTH: usize = 99;

/// Alias of the root entity of a write.
pub const ORIGINAL_ALIAS: &str = "this";

/// Payload key listing the properties that were filled in by defaults rather
/// than supplied. A merge writes those only when it creates the entity.
pub const DEFAULTED_KEYS: &str = "__DEFAULTED__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Create,
    Merge,
}

/// What happens to relationship payloads nested deeper than the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop them and log a warning.
    #[default]
    Truncate,
    /// Fail with [`Error::DepthExceeded`].
    Error,
}

/// One entity written by the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub mode: WriteMode,
    pub alias: String,
    pub labels: Vec<String>,
    /// Written inside the CREATE/MERGE pattern.
    pub inline: PropertyMap,
    /// Written only when a MERGE creates the entity.
    pub on_create: PropertyMap,
    pub set: PropertyMap,
    pub relationships: Vec<WriteRelationship>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRelationship {
    pub name: String,
    pub rel_type: String,
    pub direction: Direction,
    pub alias: String,
    pub properties: PropertyMap,
    pub target: WriteTarget,
}

/// How the far side of a relationship is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteTarget {
    /// `MATCH (alias) WHERE id(alias) = $p`
    Existing { alias: String, identity: Identity },
    /// `MERGE (alias:Labels { key: $p })`
    Reference {
        alias: String,
        labels: Vec<String>,
        key: String,
        value: Value,
    },
    Nested(Box<WritePlan>),
}

impl WriteTarget {
    pub fn alias(&self) -> &str {
        match self {
            WriteTarget::Existing { alias, .. } | WriteTarget::Reference { alias, .. } => alias,
            WriteTarget::Nested(plan) => &plan.alias,
        }
    }
}

impl WritePlan {
    /// Entities written, this one included.
    pub fn node_count(&self) -> usize {
        1 + self
            .relationships
            .iter()
            .map(|rel| match &rel.target {
                WriteTarget::Nested(plan) => plan.node_count(),
                _ => 1,
            })
            .sum::<usize>()
    }

    /// Levels of nesting below this entity.
    pub fn depth(&self) -> usize {
        self.relationships
            .iter()
            .map(|rel| match &rel.target {
                WriteTarget::Nested(plan) => 1 + plan.depth(),
                _ => 1,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Splits the declared scalar properties of a bag by where they are written.
///
/// Returns `(inline, on_create, set)`. In create mode everything is inline.
/// In merge mode the merge fields are inline, protected and readonly
/// properties are only written on create, and the rest is SET. A type
/// without merge fields is merged on all of its properties.
///
/// Keys listed under [`DEFAULTED_KEYS`] are written on create only, unless
/// the bag supplies no other key to merge on.
pub fn split_properties(
    mode: WriteMode,
    model: &EntityType,
    props: &PropertyMap,
) -> (PropertyMap, PropertyMap, PropertyMap) {
    let mut inline = PropertyMap::new();
    let mut on_create = PropertyMap::new();
    let mut set = PropertyMap::new();
    let merge_fields = model.merge_fields();

    let defaulted = defaulted_keys(props);
    let supplied = |name: &str| {
        props.get(name).is_some_and(|v| !v.is_null()) && !defaulted.contains(&name)
    };
    let keyed = if merge_fields.is_empty() {
        model.properties().any(|p| supplied(&p.name))
    } else {
        merge_fields.iter().copied().any(supplied)
    };

    for property in model.properties() {
        let Some(value) = props.get(&property.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let value = value.clone();
        let name = property.name.clone();
        match mode {
            WriteMode::Create => {
                inline.insert(name, value);
            }
            WriteMode::Merge if keyed && defaulted.contains(&property.name.as_str()) => {
                on_create.insert(name, value);
            }
            WriteMode::Merge if merge_fields.is_empty() => {
                inline.insert(name, value);
            }
            WriteMode::Merge => {
                if merge_fields.contains(&property.name.as_str()) {
                    inline.insert(name, value);
                } else if property.primary || property.protected || property.readonly {
                    on_create.insert(name, value);
                } else {
                    set.insert(name, value);
                }
            }
        }
    }

    (inline, on_create, set)
}

fn defaulted_keys(props: &PropertyMap) -> Vec<&str> {
    match props.get(DEFAULTED_KEYS) {
        Some(Value::List(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Records `keys` as filled in by defaults, see [`DEFAULTED_KEYS`].
pub fn mark_defaulted(props: &mut PropertyMap, keys: Vec<String>) {
    if !keys.is_empty() {
        props.insert(
            DEFAULTED_KEYS.to_string(),
            Value::List(keys.into_iter().map(Value::String).collect()),
        );
    }
}

/// Relationships need a direction when written.
fn write_direction(direction: Direction) -> Direction {
    match direction {
        Direction::In => Direction::In,
        Direction::Out | Direction::Both => Direction::Out,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteCompiler<'a> {
    registry: &'a Registry,
    max_depth: usize,
    overflow: OverflowPolicy,
}

impl<'a> WriteCompiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            max_depth: MAX_CREATE_DEPTH,
            overflow: OverflowPolicy::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Plans a write of `props` as `model` under `alias`.
    pub fn plan(
        &self,
        mode: WriteMode,
        alias: &str,
        model: &EntityType,
        props: &PropertyMap,
    ) -> Result<WritePlan> {
        self.plan_node(mode, alias, model, props, 0)
    }

    /// Plans the write and renders it into `builder`.
    pub fn compile(
        &self,
        builder: &mut QueryBuilder,
        mode: WriteMode,
        alias: &str,
        model: &EntityType,
        props: &PropertyMap,
    ) -> Result<WritePlan> {
        let plan = self.plan(mode, alias, model, props)?;
        render(builder, &plan);
        Ok(plan)
    }

    fn plan_node(
        &self,
        mode: WriteMode,
        alias: &str,
        model: &EntityType,
        props: &PropertyMap,
        depth: usize,
    ) -> Result<WritePlan> {
        let (inline, on_create, set) = split_properties(mode, model, props);
        let mut relationships = Vec::new();

        for rel in model.relationships() {
            let Some(value) = props.get(&rel.name).filter(|v| !v.is_null()) else {
                continue;
            };
            if depth + 1 > self.max_depth {
                match self.overflow {
                    OverflowPolicy::Truncate => {
                        warn!(
                            model = model.name(),
                            relationship = %rel.name,
                            limit = self.max_depth,
                            "nested write exceeds the depth limit, dropping the deeper payload"
                        );
                        continue;
                    }
                    OverflowPolicy::Error => {
                        return Err(Error::DepthExceeded {
                            limit: self.max_depth,
                            relationship: rel.name.clone(),
                        });
                    }
                }
            }

            let target = self
                .registry
                .target(rel)
                .ok()
                .flatten()
                .ok_or_else(|| Error::UnresolvedTarget {
                    relationship: rel.name.clone(),
                    model: model.name().to_string(),
                })?;

            let items: Vec<&Value> = match value {
                Value::List(items) if rel.shape.is_collection() => items.iter().collect(),
                other => vec![other],
            };
            for (idx, item) in items.into_iter().enumerate() {
                let suffix = if rel.shape.is_collection() {
                    format!("_{idx}")
                } else {
                    String::new()
                };
                let node_alias = nested_alias(alias, &rel.name, "node") + &suffix;
                let rel_alias = nested_alias(alias, &rel.name, "rel") + &suffix;

                let (node, properties) = if rel.shape.is_relationship() {
                    self.split_relationship(model, rel, item)?
                } else {
                    (item, PropertyMap::new())
                };

                let target = self.target(model, rel, target, node_alias, node, depth + 1)?;
                relationships.push(WriteRelationship {
                    name: rel.name.clone(),
                    rel_type: rel.rel_type.clone(),
                    direction: write_direction(rel.direction),
                    alias: rel_alias,
                    properties,
                    target,
                });
            }
        }

        Ok(WritePlan {
            mode,
            alias: alias.to_string(),
            labels: model.labels().to_vec(),
            inline,
            on_create,
            set,
            relationships,
        })
    }

    /// Separates the far node of a relationship-shaped value from the
    /// relationship's own declared properties.
    fn split_relationship<'v>(
        &self,
        model: &EntityType,
        rel: &RelationshipDeclaration,
        item: &'v Value,
    ) -> Result<(&'v Value, PropertyMap)> {
        let Value::Map(map) = item else {
            return Err(Error::InvalidReference {
                relationship: rel.name.clone(),
                model: model.name().to_string(),
                found: item.type_name(),
            });
        };
        let node = map
            .get(&rel.node_alias)
            .ok_or_else(|| Error::MissingRelationshipNode {
                relationship: rel.name.clone(),
                model: model.name().to_string(),
                key: rel.node_alias.clone(),
            })?;
        let properties = map
            .iter()
            .filter(|(key, value)| rel.get_property(key).is_some() && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok((node, properties))
    }

    fn target(
        &self,
        model: &EntityType,
        rel: &RelationshipDeclaration,
        target: &EntityType,
        alias: String,
        value: &Value,
        depth: usize,
    ) -> Result<WriteTarget> {
        match value {
            Value::Node(node) => Ok(WriteTarget::Existing {
                alias,
                identity: node.identity,
            }),
            Value::Map(props) => Ok(WriteTarget::Nested(Box::new(self.plan_node(
                WriteMode::Merge,
                &alias,
                target,
                props,
                depth,
            )?))),
            scalar if scalar.is_scalar() => {
                let key = target
                    .primary_key()
                    .ok_or_else(|| Error::MissingPrimaryKey {
                        relationship: rel.name.clone(),
                        model: model.name().to_string(),
                        target: target.name().to_string(),
                    })?;
                Ok(WriteTarget::Reference {
                    alias,
                    labels: target.labels().to_vec(),
                    key: key.to_string(),
                    value: scalar.clone(),
                })
            }
            other => Err(Error::InvalidReference {
                relationship: rel.name.clone(),
                model: model.name().to_string(),
                found: other.type_name(),
            }),
        }
    }
}

/// Renders a plan into `builder`, one statement group per entity.
///
/// Before each relationship the aliases of the entity and of all its
/// ancestors are carried forward with `WITH`.
pub fn render(builder: &mut QueryBuilder, plan: &WritePlan) {
    let mut scope = Vec::new();
    render_plan(builder, plan, &mut scope);
}

fn open(
    builder: &mut QueryBuilder,
    mode: WriteMode,
    alias: &str,
    labels: Labels,
    props: &PropertyMap,
) {
    match mode {
        WriteMode::Create => builder.create_node(alias, labels, props),
        WriteMode::Merge => builder.merge_node(alias, labels, props),
    };
}

fn render_plan(builder: &mut QueryBuilder, plan: &WritePlan, scope: &mut Vec<String>) {
    open(
        builder,
        plan.mode,
        &plan.alias,
        Labels::from(plan.labels.clone()),
        &plan.inline,
    );
    for (key, value) in &plan.on_create {
        builder.on_create_set(&format!("{}.{}", plan.alias, quote_name(key)), value.clone());
    }
    builder.set_props(&plan.alias, &plan.set);

    scope.push(plan.alias.clone());
    for rel in &plan.relationships {
        builder.with(scope.iter().cloned());
        let target = render_target(builder, &rel.target, scope);
        open(
            builder,
            plan.mode,
            &plan.alias,
            Labels::none(),
            &PropertyMap::new(),
        );
        builder
            .relationship(&rel.rel_type, rel.direction, Some(&rel.alias))
            .to(target, Labels::none())
            .set_props(&rel.alias, &rel.properties);
    }
    scope.pop();
}

fn render_target<'p>(
    builder: &mut QueryBuilder,
    target: &'p WriteTarget,
    scope: &mut Vec<String>,
) -> &'p str {
    match target {
        WriteTarget::Existing { alias, identity } => {
            builder.match_node(alias, Labels::none()).where_id(alias, *identity);
        }
        WriteTarget::Reference {
            alias,
            labels,
            key,
            value,
        } => {
            let props = PropertyMap::from([(key.clone(), value.clone())]);
            builder.merge_node(alias, Labels::from(labels.clone()), &props);
        }
        WriteTarget::Nested(plan) => render_plan(builder, plan, scope),
    }
    target.alias()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nervusdb_ogm_api::{NodeValue, Property, PropertyType, RelationshipShape, Target};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                EntityType::builder("Company")
                    .property(Property::new("name", PropertyType::String).primary())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityType::builder("Person")
                    .property(Property::new("id", PropertyType::Uuid).primary())
                    .property(Property::new("email", PropertyType::String).unique())
                    .property(Property::new("name", PropertyType::String))
                    .property(Property::new("created", PropertyType::Integer).readonly())
                    .relationship(RelationshipDeclaration::new(
                        "employer",
                        RelationshipShape::SingleNode,
                        "WORKS_AT",
                        Direction::Out,
                        Target::Model("Company".into()),
                    ))
                    .relationship(RelationshipDeclaration::new(
                        "knows",
                        RelationshipShape::NodeList,
                        "KNOWS",
                        Direction::Both,
                        Target::Model("Person".into()),
                    ))
                    .relationship(
                        RelationshipDeclaration::new(
                            "follows",
                            RelationshipShape::RelationshipList,
                            "FOLLOWS",
                            Direction::In,
                            Target::Model("Person".into()),
                        )
                        .node_alias("follower")
                        .property(Property::new("since", PropertyType::Integer)),
                    )
                    .relationship(RelationshipDeclaration::new(
                        "anything",
                        RelationshipShape::SingleNode,
                        "LINKS",
                        Direction::Out,
                        Target::Any,
                    ))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    fn bag(entries: &[(&str, Value)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn compile(mode: WriteMode, props: &PropertyMap) -> Result<String> {
        let registry = registry();
        let person = registry.model("Person").unwrap();
        let mut builder = QueryBuilder::new();
        WriteCompiler::new(&registry).compile(&mut builder, mode, ORIGINAL_ALIAS, person, props)?;
        Ok(builder.build().query)
    }

    #[test]
    fn create_writes_everything_inline_and_ignores_undeclared_keys() {
        let props = bag(&[
            ("name", Value::from("Ann")),
            ("email", Value::from("ann@example.com")),
            ("shoe_size", Value::from(42i64)),
        ]);
        assert_eq!(
            compile(WriteMode::Create, &props).unwrap(),
            "CREATE (this:Person { email: $this_email, name: $this_name })"
        );
    }

    #[test]
    fn merge_splits_inline_on_create_and_set() {
        let props = bag(&[
            ("id", Value::from("p1")),
            ("email", Value::from("ann@example.com")),
            ("name", Value::from("Ann")),
            ("created", Value::from(1i64)),
        ]);
        assert_eq!(
            compile(WriteMode::Merge, &props).unwrap(),
            "MERGE (this:Person { email: $this_email, id: $this_id })\n\
             ON CREATE SET this.created = $set_this_created\n\
             SET this.name = $set_this_name"
        );
    }

    #[test]
    fn merge_writes_defaulted_keys_on_create_only() {
        let mut props = bag(&[
            ("id", Value::from("generated")),
            ("email", Value::from("ann@example.com")),
            ("name", Value::from("Ann")),
        ]);
        mark_defaulted(&mut props, vec!["id".into(), "name".into()]);
        assert_eq!(
            compile(WriteMode::Merge, &props).unwrap(),
            "MERGE (this:Person { email: $this_email })\n\
             ON CREATE SET this.id = $set_this_id, this.name = $set_this_name"
        );
        assert_eq!(
            compile(WriteMode::Create, &props).unwrap(),
            "CREATE (this:Person { email: $this_email, id: $this_id, name: $this_name })"
        );
    }

    #[test]
    fn defaulted_key_stays_in_the_pattern_when_nothing_else_identifies() {
        let mut props = bag(&[("id", Value::from("generated")), ("name", Value::from("Ann"))]);
        mark_defaulted(&mut props, vec!["id".into()]);
        assert_eq!(
            compile(WriteMode::Merge, &props).unwrap(),
            "MERGE (this:Person { id: $this_id })\n\
             SET this.name = $set_this_name"
        );
    }

    #[test]
    fn non_identifier_relationship_names_give_bare_aliases() {
        let mut registry = registry();
        let member = registry
            .register(
                EntityType::builder("Member")
                    .relationship(RelationshipDeclaration::new(
                        "best-friend",
                        RelationshipShape::SingleNode,
                        "KNOWS",
                        Direction::Out,
                        Target::Model("Company".into()),
                    ))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mut builder = QueryBuilder::new();
        WriteCompiler::new(&registry)
            .compile(
                &mut builder,
                WriteMode::Create,
                ORIGINAL_ALIAS,
                &member,
                &bag(&[("best-friend", Value::from("Acme"))]),
            )
            .unwrap();
        let compiled = builder.build();
        assert_eq!(
            compiled.query,
            "CREATE (this:Member)\n\
             WITH this\n\
             MERGE (this_best_friend_node:Company { name: $this_best_friend_node_name })\n\
             CREATE (this)-[this_best_friend_rel:KNOWS]->(this_best_friend_node)"
        );
        assert!(compiled.params.contains_key("this_best_friend_node_name"));
    }

    #[test]
    fn relationship_targets_by_reference_identity_and_payload() {
        let props = bag(&[
            ("name", Value::from("Ann")),
            ("employer", Value::from("Acme")),
            (
                "knows",
                Value::List(vec![
                    Value::Node(NodeValue {
                        identity: 7,
                        labels: vec!["Person".into()],
                        properties: PropertyMap::new(),
                    }),
                    Value::Map(bag(&[("id", Value::from("p2")), ("name", Value::from("Bob"))])),
                ]),
            ),
        ]);
        assert_eq!(
            compile(WriteMode::Create, &props).unwrap(),
            "CREATE (this:Person { name: $this_name })\n\
             WITH this\n\
             MERGE (this_employer_node:Company { name: $this_employer_node_name })\n\
             CREATE (this)-[this_employer_rel:WORKS_AT]->(this_employer_node)\n\
             WITH this\n\
             MATCH (this_knows_node_0)\n\
             WHERE (id(this_knows_node_0) = $where_id_this_knows_node_0)\n\
             CREATE (this)-[this_knows_rel_0:KNOWS]->(this_knows_node_0)\n\
             WITH this\n\
             MERGE (this_knows_node_1:Person { id: $this_knows_node_1_id })\n\
             SET this_knows_node_1.name = $set_this_knows_node_1_name\n\
             CREATE (this)-[this_knows_rel_1:KNOWS]->(this_knows_node_1)"
        );
    }

    #[test]
    fn relationship_shape_reads_node_alias_and_sets_properties() {
        let follow = Value::Map(bag(&[
            ("follower", Value::from("p9")),
            ("since", Value::from(2020i64)),
            ("ignored", Value::from(true)),
        ]));
        let props = bag(&[("id", Value::from("p1")), ("follows", follow)]);
        assert_eq!(
            compile(WriteMode::Merge, &props).unwrap(),
            "MERGE (this:Person { id: $this_id })\n\
             WITH this\n\
             MERGE (this_follows_node_0:Person { id: $this_follows_node_0_id })\n\
             MERGE (this)<-[this_follows_rel_0:FOLLOWS]-(this_follows_node_0)\n\
             SET this_follows_rel_0.since = $set_this_follows_rel_0_since"
        );
    }

    #[test]
    fn nested_payload_carries_every_ancestor() {
        let grandchild = Value::Map(bag(&[("id", Value::from("p3"))]));
        let child = Value::Map(bag(&[("id", Value::from("p2")), ("knows", grandchild)]));
        let props = bag(&[("id", Value::from("p1")), ("knows", child)]);

        let registry = registry();
        let person = registry.model("Person").unwrap();
        let plan = WriteCompiler::new(&registry)
            .plan(WriteMode::Merge, ORIGINAL_ALIAS, person, &props)
            .unwrap();
        assert_eq!(plan.depth(), 2);
        assert_eq!(plan.node_count(), 3);

        let query = compile(WriteMode::Merge, &props).unwrap();
        assert!(query.contains("WITH this, this_knows_node_0\n"));
        assert!(query.ends_with(
            "MERGE (this_knows_node_0)-[this_knows_node_0_knows_rel_0:KNOWS]->(this_knows_node_0_knows_node_0)\n\
             MERGE (this)-[this_knows_rel_0:KNOWS]->(this_knows_node_0)"
        ));
    }

    #[test]
    fn configuration_errors_name_the_relationship() {
        let err = compile(WriteMode::Create, &bag(&[("anything", Value::from("x"))])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedTarget { relationship, model } if relationship == "anything" && model == "Person"
        ));

        let err = compile(
            WriteMode::Create,
            &bag(&[("follows", Value::Map(bag(&[("since", Value::from(1i64))])))]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingRelationshipNode { key, .. } if key == "follower"));

        let query = compile(WriteMode::Create, &bag(&[("employer", Value::from(1.5f64))])).unwrap();
        assert!(query.contains("MERGE (this_employer_node:Company"));

        let err = compile(
            WriteMode::Create,
            &bag(&[("employer", Value::List(vec![Value::from("a")]))]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidReference { found: "list", .. }));
    }

    #[test]
    fn scalar_reference_requires_a_primary_key() {
        let mut registry = Registry::new();
        registry
            .register(EntityType::builder("Tag").build().unwrap())
            .unwrap();
        let post = registry
            .register(
                EntityType::builder("Post")
                    .relationship(RelationshipDeclaration::new(
                        "tag",
                        RelationshipShape::SingleNode,
                        "TAGGED",
                        Direction::Out,
                        Target::Model("Tag".into()),
                    ))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let err = WriteCompiler::new(&registry)
            .plan(WriteMode::Create, "this", &post, &bag(&[("tag", Value::from("rust"))]))
            .unwrap_err();
        assert!(matches!(err, Error::MissingPrimaryKey { target, .. } if target == "Tag"));
    }

    #[test]
    fn overflow_policy_decides_between_truncation_and_error() {
        let props = bag(&[
            ("id", Value::from("p1")),
            ("knows", Value::Map(bag(&[("id", Value::from("p2"))]))),
        ]);
        let registry = registry();
        let person = registry.model("Person").unwrap();

        let truncated = WriteCompiler::new(&registry)
            .with_max_depth(0)
            .plan(WriteMode::Create, "this", person, &props)
            .unwrap();
        assert!(truncated.relationships.is_empty());

        let err = WriteCompiler::new(&registry)
            .with_max_depth(0)
            .with_overflow(OverflowPolicy::Error)
            .plan(WriteMode::Create, "this", person, &props)
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 0, .. }));
    }
}
