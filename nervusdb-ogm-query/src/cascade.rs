//! Cascade deletes.
//!
//! Deleting an entity also deletes everything reachable through relationships
//! declared with `Cascade::Delete`, up to a depth limit:
//!
//! ```text
//! MATCH (this:Person)
//! WHERE (id(this) = $where_id_this)
//! OPTIONAL MATCH (this)-[this_posts_rel:WROTE]->(this_posts_node:Post)
//! DETACH DELETE this_posts_node, this
//! ```
//!
//! `Cascade::Detach` adds nothing: `DETACH DELETE` on the owner already
//! removes the relationship and leaves the far node in place.

use crate::ast::nested_alias;
use crate::builder::{Labels, QueryBuilder};
use crate::error::{Error, Result};
use nervusdb_ogm_api::{Cascade, Direction, EntityType, Identity, Registry};

pub const MAX_CASCADE_DEPTH: usize = 10;

/// An entity removed by a cascade, with the entities it pulls along.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeNode {
    pub alias: String,
    pub labels: Vec<String>,
    pub children: Vec<CascadeEdge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeEdge {
    pub rel_alias: String,
    pub rel_type: String,
    pub direction: Direction,
    pub node: CascadeNode,
}

impl CascadeNode {
    /// Entities deleted, this one included.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|edge| edge.node.node_count())
            .sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|edge| 1 + edge.node.depth())
            .max()
            .unwrap_or(0)
    }

    /// Aliases of every descendant, depth-first.
    pub fn descendants(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

fn collect<'a>(node: &'a CascadeNode, out: &mut Vec<&'a str>) {
    for edge in &node.children {
        out.push(&edge.node.alias);
        collect(&edge.node, out);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CascadeCompiler<'a> {
    registry: &'a Registry,
    max_depth: usize,
}

impl<'a> CascadeCompiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            max_depth: MAX_CASCADE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn plan(&self, alias: &str, model: &EntityType) -> Result<CascadeNode> {
        self.plan_node(alias, Some(model), 0)
    }

    fn plan_node(
        &self,
        alias: &str,
        model: Option<&EntityType>,
        depth: usize,
    ) -> Result<CascadeNode> {
        let mut node = CascadeNode {
            alias: alias.to_string(),
            labels: model.map(|m| m.labels().to_vec()).unwrap_or_default(),
            children: Vec::new(),
        };
        let Some(model) = model else {
            return Ok(node);
        };
        if depth + 1 > self.max_depth {
            return Ok(node);
        }

        for rel in model
            .relationships()
            .filter(|rel| rel.cascade == Cascade::Delete)
        {
            let target: Option<&EntityType> = self
                .registry
                .target(rel)
                .map_err(|_| Error::UnresolvedTarget {
                    relationship: rel.name.clone(),
                    model: model.name().to_string(),
                })?
                .map(|t| &**t);
            let child_alias = nested_alias(alias, &rel.name, "node");
            node.children.push(CascadeEdge {
                rel_alias: nested_alias(alias, &rel.name, "rel"),
                rel_type: rel.rel_type.clone(),
                direction: rel.direction,
                node: self.plan_node(&child_alias, target, depth + 1)?,
            });
        }
        Ok(node)
    }

    /// Compiles the delete of the entity with `identity`.
    pub fn compile(
        &self,
        builder: &mut QueryBuilder,
        alias: &str,
        model: &EntityType,
        identity: Identity,
    ) -> Result<CascadeNode> {
        let plan = self.plan(alias, model)?;
        render(builder, &plan, identity);
        Ok(plan)
    }
}

/// Renders a cascade plan: the root match, one `OPTIONAL MATCH` per edge and
/// a single `DETACH DELETE` over every alias, the root last.
pub fn render(builder: &mut QueryBuilder, plan: &CascadeNode, identity: Identity) {
    builder
        .match_node(&plan.alias, Labels::from(plan.labels.clone()))
        .where_id(&plan.alias, identity);
    render_edges(builder, plan);
    for alias in plan.descendants() {
        builder.detach_delete(alias);
    }
    builder.detach_delete(plan.alias.as_str());
}

fn render_edges(builder: &mut QueryBuilder, node: &CascadeNode) {
    for edge in &node.children {
        builder
            .optional_match(&node.alias, Labels::none())
            .relationship(&edge.rel_type, edge.direction, Some(&edge.rel_alias))
            .to(&edge.node.alias, Labels::from(edge.node.labels.clone()));
        render_edges(builder, &edge.node);
    }
}

/// `MATCH (alias:Labels) DETACH DELETE alias`
pub fn delete_all(builder: &mut QueryBuilder, alias: &str, model: &EntityType) {
    builder.match_node(alias, model).detach_delete(alias);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nervusdb_ogm_api::{
        Property, PropertyType, RelationshipDeclaration, RelationshipShape, Target, Value,
    };

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(EntityType::builder("Comment").build().unwrap())
            .unwrap();
        registry
            .register(
                EntityType::builder("Post")
                    .relationship(
                        RelationshipDeclaration::new(
                            "comments",
                            RelationshipShape::NodeList,
                            "HAS_COMMENT",
                            Direction::Out,
                            Target::Model("Comment".into()),
                        )
                        .cascade(Cascade::Delete),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                EntityType::builder("Person")
                    .property(Property::new("name", PropertyType::String))
                    .relationship(
                        RelationshipDeclaration::new(
                            "posts",
                            RelationshipShape::NodeList,
                            "WROTE",
                            Direction::Out,
                            Target::Model("Post".into()),
                        )
                        .cascade(Cascade::Delete),
                    )
                    .relationship(
                        RelationshipDeclaration::new(
                            "friends",
                            RelationshipShape::NodeList,
                            "KNOWS",
                            Direction::Both,
                            Target::Model("Person".into()),
                        )
                        .cascade(Cascade::Detach),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn follows_delete_cascades_and_ignores_detach() {
        let registry = registry();
        let person = registry.model("Person").unwrap();
        let mut builder = QueryBuilder::new();
        let plan = CascadeCompiler::new(&registry)
            .compile(&mut builder, "this", person, 42)
            .unwrap();
        let query = builder.build();

        assert_eq!(plan.node_count(), 3);
        assert_eq!(
            query.query,
            "MATCH (this:Person)\n\
             WHERE (id(this) = $where_id_this)\n\
             OPTIONAL MATCH (this)-[this_posts_rel:WROTE]->(this_posts_node:Post)\n\
             OPTIONAL MATCH (this_posts_node)-[this_posts_node_comments_rel:HAS_COMMENT]->(this_posts_node_comments_node:Comment)\n\
             DETACH DELETE this_posts_node, this_posts_node_comments_node, this"
        );
        assert_eq!(query.params["where_id_this"], Value::Int(42));
    }

    #[test]
    fn depth_limit_cuts_the_chain() {
        let registry = registry();
        let person = registry.model("Person").unwrap();
        let plan = CascadeCompiler::new(&registry)
            .with_max_depth(1)
            .plan("this", person)
            .unwrap();
        assert_eq!(plan.depth(), 1);
        assert_eq!(plan.descendants(), ["this_posts_node"]);
    }

    #[test]
    fn aliases_stay_bare_identifiers_for_any_relationship_name() {
        let mut registry = registry();
        let blog = registry
            .register(
                EntityType::builder("Blog")
                    .relationship(
                        RelationshipDeclaration::new(
                            "draft posts",
                            RelationshipShape::NodeList,
                            "DRAFTED",
                            Direction::Out,
                            Target::Model("Post".into()),
                        )
                        .cascade(Cascade::Delete),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mut builder = QueryBuilder::new();
        CascadeCompiler::new(&registry)
            .with_max_depth(1)
            .compile(&mut builder, "this", &blog, 1)
            .unwrap();
        assert_eq!(
            builder.build().query,
            "MATCH (this:Blog)\n\
             WHERE (id(this) = $where_id_this)\n\
             OPTIONAL MATCH (this)-[this_draft_posts_rel:DRAFTED]->(this_draft_posts_node:Post)\n\
             DETACH DELETE this_draft_posts_node, this"
        );
    }

    #[test]
    fn delete_all_detaches_every_entity_of_the_type() {
        let registry = registry();
        let mut builder = QueryBuilder::new();
        delete_all(&mut builder, "this", registry.model("Post").unwrap());
        assert_eq!(builder.build().query, "MATCH (this:Post)\nDETACH DELETE this");
    }
}
