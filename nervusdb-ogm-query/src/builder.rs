//! Fluent query assembly.
//!
//! A [`QueryBuilder`] owns the statements of one query and its parameter
//! table. Values only ever reach the query text as `$param` references; the
//! builder generates a collision-free parameter name for each of them.

use crate::ast::{
    ComparisonOperator, Condition, Connector, NodePattern, OrderByItem, PathElement, Pattern,
    Predicate, PropertyPair, RelationshipPattern, SetItem, SetOperator, SortOrder,
    VariableLength, WhereGroup, identifier_part, quote_name,
};
use crate::error::{Error, Result};
use crate::statement::{Statement, StatementHead};
use nervusdb_ogm_api::{
    AccessMode, Direction, Driver, EntityType, Identity, PropertyMap, Row, Value,
};
use std::sync::Arc;
use tracing::debug;

/// Final query text and its parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: String,
    pub params: PropertyMap,
}

impl CompiledQuery {
    pub fn new(query: impl Into<String>, params: PropertyMap) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    /// Runs the query, wrapping any driver failure with the query text and
    /// parameters that produced it.
    pub async fn execute<D: Driver>(&self, driver: &D, mode: AccessMode) -> Result<Vec<Row>> {
        debug!(?mode, params = self.params.len(), query = %self.query, "executing query");
        driver
            .run(mode, &self.query, &self.params)
            .await
            .map_err(|source| Error::Execution {
                query: self.query.clone(),
                params: self.params.clone(),
                source,
            })
    }
}

/// Label list for a node pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<String>);

impl Labels {
    /// An unlabelled node.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&EntityType> for Labels {
    fn from(model: &EntityType) -> Self {
        Labels(model.labels().to_vec())
    }
}

impl From<&Arc<EntityType>> for Labels {
    fn from(model: &Arc<EntityType>) -> Self {
        Labels::from(model.as_ref())
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels(vec![label.to_string()])
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Labels(labels)
    }
}

impl From<&[String]> for Labels {
    fn from(labels: &[String]) -> Self {
        Labels(labels.to_vec())
    }
}

impl<T: Into<Labels>> From<Option<T>> for Labels {
    fn from(labels: Option<T>) -> Self {
        labels.map(Into::into).unwrap_or_default()
    }
}

/// Assembles one query out of consecutive statements.
///
/// Methods that add to a statement panic when no statement has been opened
/// with `match_node`, `optional_match`, `create_node`, `merge_node` or
/// `with`: that is a bug in the calling code, not a runtime condition.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    statements: Vec<Statement>,
    current: Option<Statement>,
    params: PropertyMap,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under a name derived from `base` and returns the name.
    ///
    /// The base is reduced to `[A-Za-z0-9_]`; if the name is taken, `_2`,
    /// `_3`, ... is appended until it is free.
    pub fn add_param(&mut self, base: &str, value: impl Into<Value>) -> String {
        let mut sanitized = identifier_part(base);
        if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
            sanitized.insert_str(0, "p_");
        }

        let mut name = sanitized.clone();
        let mut n = 2;
        while self.params.contains_key(&name) {
            name = format!("{sanitized}_{n}");
            n += 1;
        }
        self.params.insert(name.clone(), value.into());
        name
    }

    pub fn params(&self) -> &PropertyMap {
        &self.params
    }

    /// Head and pattern of the open statement, or an empty string.
    pub fn pattern(&self) -> String {
        self.current
            .as_ref()
            .map(Statement::pattern)
            .unwrap_or_default()
    }

    fn open(&mut self, head: StatementHead) -> &mut Statement {
        if let Some(done) = self.current.take() {
            self.statements.push(done);
        }
        self.current.insert(Statement::new(head))
    }

    #[track_caller]
    fn statement(&mut self) -> &mut Statement {
        match self.current.as_mut() {
            Some(statement) => statement,
            None => panic!(
                "no statement is open: call match_node, optional_match, create_node, merge_node or with first"
            ),
        }
    }

    #[track_caller]
    fn path(&mut self) -> &mut Pattern {
        match self.statement().patterns.last_mut() {
            Some(path) => path,
            None => panic!("the open statement has no pattern to extend"),
        }
    }

    fn node(&mut self, alias: &str, labels: Labels, props: &PropertyMap) -> NodePattern {
        let mut properties = Vec::new();
        for (key, value) in props.iter().filter(|(_, v)| !v.is_null()) {
            let param = self.add_param(&format!("{alias}_{key}"), value.clone());
            properties.push(PropertyPair {
                key: key.clone(),
                param,
            });
        }
        NodePattern {
            variable: (!alias.is_empty()).then(|| alias.to_string()),
            labels: labels.0,
            properties,
        }
    }

    fn open_node(
        &mut self,
        head: StatementHead,
        alias: &str,
        labels: Labels,
        props: &PropertyMap,
    ) -> &mut Self {
        let node = self.node(alias, labels, props);
        self.open(head).patterns.push(Pattern {
            elements: vec![PathElement::Node(node)],
        });
        self
    }

    // ---- statement heads ----

    /// `MATCH (alias:Labels)`
    pub fn match_node(&mut self, alias: &str, labels: impl Into<Labels>) -> &mut Self {
        self.open_node(StatementHead::Match, alias, labels.into(), &PropertyMap::new())
    }

    /// `MATCH (alias:Labels { k: $alias_k })`
    pub fn match_with(
        &mut self,
        alias: &str,
        labels: impl Into<Labels>,
        props: &PropertyMap,
    ) -> &mut Self {
        self.open_node(StatementHead::Match, alias, labels.into(), props)
    }

    pub fn optional_match(&mut self, alias: &str, labels: impl Into<Labels>) -> &mut Self {
        self.open_node(
            StatementHead::OptionalMatch,
            alias,
            labels.into(),
            &PropertyMap::new(),
        )
    }

    pub fn create_node(
        &mut self,
        alias: &str,
        labels: impl Into<Labels>,
        props: &PropertyMap,
    ) -> &mut Self {
        self.open_node(StatementHead::Create, alias, labels.into(), props)
    }

    pub fn merge_node(
        &mut self,
        alias: &str,
        labels: impl Into<Labels>,
        props: &PropertyMap,
    ) -> &mut Self {
        self.open_node(StatementHead::Merge, alias, labels.into(), props)
    }

    /// Adds another comma-separated path to the open statement: `MATCH (a), (b)`.
    pub fn and_node(&mut self, alias: &str, labels: impl Into<Labels>) -> &mut Self {
        let node = self.node(alias, labels.into(), &PropertyMap::new());
        self.statement().patterns.push(Pattern {
            elements: vec![PathElement::Node(node)],
        });
        self
    }

    /// Closes the open statement and carries `aliases` into the next one.
    pub fn with<I, S>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = aliases.into_iter().map(Into::into).collect();
        self.open(StatementHead::With(aliases));
        self
    }

    // ---- pattern extension ----

    fn push_relationship(
        &mut self,
        types: Vec<String>,
        direction: Direction,
        alias: Option<&str>,
        variable_length: Option<VariableLength>,
    ) -> &mut Self {
        let rel = RelationshipPattern {
            variable: alias.map(str::to_string),
            types,
            direction,
            variable_length,
        };
        self.path().elements.push(PathElement::Relationship(rel));
        self
    }

    /// Extends the open path with `-[alias:TYPE]->`. Follow with [`Self::to`].
    pub fn relationship(
        &mut self,
        rel_type: &str,
        direction: Direction,
        alias: Option<&str>,
    ) -> &mut Self {
        self.push_relationship(vec![rel_type.to_string()], direction, alias, None)
    }

    /// Variable-length variant of [`Self::relationship`]: `-[:TYPE*min..max]->`.
    pub fn relationship_hops(
        &mut self,
        rel_type: &str,
        direction: Direction,
        alias: Option<&str>,
        min: Option<u32>,
        max: Option<u32>,
    ) -> &mut Self {
        self.push_relationship(
            vec![rel_type.to_string()],
            direction,
            alias,
            Some(VariableLength { min, max }),
        )
    }

    /// An untyped relationship.
    pub fn any_relationship(&mut self, direction: Direction, alias: Option<&str>) -> &mut Self {
        self.push_relationship(Vec::new(), direction, alias, None)
    }

    /// Ends the open path in `(alias:Labels)`.
    pub fn to(&mut self, alias: &str, labels: impl Into<Labels>) -> &mut Self {
        self.to_with(alias, labels, &PropertyMap::new())
    }

    pub fn to_with(
        &mut self,
        alias: &str,
        labels: impl Into<Labels>,
        props: &PropertyMap,
    ) -> &mut Self {
        let node = self.node(alias, labels.into(), props);
        self.path().elements.push(PathElement::Node(node));
        self
    }

    // ---- filters ----

    fn push_predicate(&mut self, condition: Condition, negated: bool) -> &mut Self {
        let filter = &mut self.statement().filter;
        if filter.groups.is_empty() {
            filter.groups.push(WhereGroup::default());
        }
        if let Some(group) = filter.groups.last_mut() {
            group.predicates.push(Predicate { condition, negated });
        }
        self
    }

    /// `left = $where_left`
    pub fn where_eq(&mut self, left: &str, value: impl Into<Value>) -> &mut Self {
        self.where_op(left, ComparisonOperator::Equals, value)
    }

    pub fn where_op(
        &mut self,
        left: &str,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.statement();
        let param = self.add_param(&format!("where_{left}"), value);
        self.push_predicate(
            Condition::Compare {
                left: left.to_string(),
                operator,
                param,
            },
            false,
        )
    }

    /// `NOT (left = $where_left)`
    pub fn where_not(&mut self, left: &str, value: impl Into<Value>) -> &mut Self {
        self.statement();
        let param = self.add_param(&format!("where_{left}"), value);
        self.push_predicate(
            Condition::Compare {
                left: left.to_string(),
                operator: ComparisonOperator::Equals,
                param,
            },
            true,
        )
    }

    /// `$floor <= expression <= $ceiling`
    pub fn where_between(
        &mut self,
        expression: &str,
        floor: impl Into<Value>,
        ceiling: impl Into<Value>,
    ) -> &mut Self {
        self.statement();
        let floor = self.add_param(&format!("where_{expression}_floor"), floor);
        let ceiling = self.add_param(&format!("where_{expression}_ceiling"), ceiling);
        self.push_predicate(
            Condition::Between {
                expression: expression.to_string(),
                floor,
                ceiling,
            },
            false,
        )
    }

    /// `id(alias) = $where_id_alias`
    pub fn where_id(&mut self, alias: &str, identity: Identity) -> &mut Self {
        self.statement();
        let param = self.add_param(&format!("where_id_{alias}"), identity);
        self.push_predicate(
            Condition::Identity {
                variable: alias.to_string(),
                param,
            },
            false,
        )
    }

    /// Appends caller-written text verbatim. Bind its values with [`Self::add_param`].
    pub fn where_raw(&mut self, text: impl Into<String>) -> &mut Self {
        self.push_predicate(Condition::Raw(text.into()), false)
    }

    /// One equality per entry: `alias.key = $where_alias_key`.
    pub fn where_props(&mut self, alias: &str, props: &PropertyMap) -> &mut Self {
        for (key, value) in props {
            self.where_eq(&format!("{alias}.{}", quote_name(key)), value.clone());
        }
        self
    }

    /// Opens a new filter group attached to the previous one by `join`, whose
    /// own predicates are combined with `connector`.
    pub fn open_group(&mut self, join: Connector, connector: Connector) -> &mut Self {
        self.statement().filter.groups.push(WhereGroup {
            join,
            connector,
            predicates: Vec::new(),
        });
        self
    }

    pub fn and(&mut self) -> &mut Self {
        self.open_group(Connector::And, Connector::And)
    }

    pub fn or(&mut self) -> &mut Self {
        self.open_group(Connector::Or, Connector::And)
    }

    pub fn xor(&mut self) -> &mut Self {
        self.open_group(Connector::Xor, Connector::And)
    }

    // ---- mutations ----

    fn set_item(&mut self, target: &str, value: Value) -> SetItem {
        self.statement();
        let param = self.add_param(&format!("set_{target}"), value);
        SetItem::Param {
            target: target.to_string(),
            operator: SetOperator::Assign,
            param,
        }
    }

    /// `SET target = $set_target`
    pub fn set(&mut self, target: &str, value: impl Into<Value>) -> &mut Self {
        let item = self.set_item(target, value.into());
        self.statement().set.push(item);
        self
    }

    /// `SET alias += $set_alias`
    pub fn set_merge(&mut self, alias: &str, props: PropertyMap) -> &mut Self {
        self.statement();
        let param = self.add_param(&format!("set_{alias}"), props);
        self.statement().set.push(SetItem::Param {
            target: alias.to_string(),
            operator: SetOperator::Merge,
            param,
        });
        self
    }

    pub fn set_raw(&mut self, text: impl Into<String>) -> &mut Self {
        self.statement().set.push(SetItem::Raw(text.into()));
        self
    }

    /// One `SET alias.key = $set_alias_key` per entry.
    pub fn set_props(&mut self, alias: &str, props: &PropertyMap) -> &mut Self {
        for (key, value) in props {
            self.set(&format!("{alias}.{}", quote_name(key)), value.clone());
        }
        self
    }

    pub fn on_create_set(&mut self, target: &str, value: impl Into<Value>) -> &mut Self {
        let item = self.set_item(target, value.into());
        self.statement().on_create_set.push(item);
        self
    }

    pub fn on_match_set(&mut self, target: &str, value: impl Into<Value>) -> &mut Self {
        let item = self.set_item(target, value.into());
        self.statement().on_match_set.push(item);
        self
    }

    pub fn remove(&mut self, expression: impl Into<String>) -> &mut Self {
        self.statement().remove.push(expression.into());
        self
    }

    pub fn delete(&mut self, alias: impl Into<String>) -> &mut Self {
        self.statement().delete.push(alias.into());
        self
    }

    pub fn detach_delete(&mut self, alias: impl Into<String>) -> &mut Self {
        self.statement().detach_delete.push(alias.into());
        self
    }

    // ---- output ----

    pub fn returning<I, S>(&mut self, expressions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statement = self.statement();
        statement
            .returns
            .extend(expressions.into_iter().map(Into::into));
        self
    }

    pub fn return_distinct<I, S>(&mut self, expressions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statement().distinct = true;
        self.returning(expressions)
    }

    pub fn order_by(&mut self, expression: impl Into<String>, order: SortOrder) -> &mut Self {
        self.statement().order_by.push(OrderByItem {
            expression: expression.into(),
            order,
        });
        self
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.statement().skip = Some(skip);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.statement().limit = Some(limit);
        self
    }

    // ---- serialization ----

    /// Serializes every statement, one per line group, with the parameter table.
    pub fn build(mut self) -> CompiledQuery {
        if let Some(done) = self.current.take() {
            self.statements.push(done);
        }
        let query = self
            .statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        debug!(
            statements = self.statements.len(),
            params = self.params.len(),
            "compiled query"
        );
        CompiledQuery {
            query,
            params: self.params,
        }
    }

    pub async fn execute<D: Driver>(self, driver: &D, mode: AccessMode) -> Result<Vec<Row>> {
        self.build().execute(driver, mode).await
    }
}
