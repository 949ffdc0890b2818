//! Clause fragments.
//!
//! Every fragment renders to its exact Cypher text through `Display`. Values
//! never appear inline: fragments only carry parameter names (`$name`), so the
//! builder is the single place where caller data enters a query.

use nervusdb_ogm_api::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Writes a label, relationship type or property key, backtick-quoting it
/// unless it is a plain identifier.
pub fn write_name(f: &mut impl fmt::Write, name: &str) -> fmt::Result {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        f.write_str(name)
    } else {
        write!(f, "`{}`", name.replace('`', "``"))
    }
}

pub fn quote_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let _ = write_name(&mut out, name);
    out
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn identifier_part(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Alias of one side (`node` or `rel`) of relationship `name` under `parent`.
/// Aliases are written bare, so the relationship name is reduced first.
pub fn nested_alias(parent: &str, name: &str, side: &str) -> String {
    format!("{parent}_{}_{side}", identifier_part(name))
}

/// `key: $param` inside a node pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyPair {
    pub key: String,
    pub param: String,
}

impl fmt::Display for PropertyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_name(f, &self.key)?;
        write!(f, ": ${}", self.param)
    }
}

/// `(alias:Label {key: $param})`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<PropertyPair>,
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        if let Some(var) = &self.variable {
            f.write_str(var)?;
        }
        for label in &self.labels {
            f.write_str(":")?;
            write_name(f, label)?;
        }
        if !self.properties.is_empty() {
            f.write_str(" { ")?;
            for (i, pair) in self.properties.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{pair}")?;
            }
            f.write_str(" }")?;
        }
        f.write_str(")")
    }
}

/// `*min..max` on a relationship arrow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VariableLength {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl fmt::Display for VariableLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => f.write_str("*"),
            (Some(min), Some(max)) if min == max => write!(f, "*{min}"),
            (Some(min), Some(max)) => write!(f, "*{min}..{max}"),
            (Some(min), None) => write!(f, "*{min}.."),
            (None, Some(max)) => write!(f, "*..{max}"),
        }
    }
}

/// `-[alias:TYPE]->`, `<-[alias:TYPE]-` or `-[alias:TYPE]-`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub direction: Direction,
    pub variable_length: Option<VariableLength>,
}

impl fmt::Display for RelationshipPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == Direction::In {
            f.write_str("<")?;
        }
        f.write_str("-")?;
        let has_detail =
            self.variable.is_some() || !self.types.is_empty() || self.variable_length.is_some();
        if has_detail {
            f.write_str("[")?;
            if let Some(var) = &self.variable {
                f.write_str(var)?;
            }
            for (i, ty) in self.types.iter().enumerate() {
                f.write_str(if i == 0 { ":" } else { "|" })?;
                write_name(f, ty)?;
            }
            if let Some(len) = &self.variable_length {
                write!(f, "{len}")?;
            }
            f.write_str("]")?;
        }
        f.write_str("-")?;
        if self.direction == Direction::Out {
            f.write_str(">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PathElement {
    Node(NodePattern),
    Relationship(RelationshipPattern),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Node(n) => n.fmt(f),
            PathElement::Relationship(r) => r.fmt(f),
        }
    }
}

/// One comma-separated path of a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Pattern {
    pub elements: Vec<PathElement>,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for el in &self.elements {
            write!(f, "{el}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl ComparisonOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOperator::Equals => "=",
            ComparisonOperator::NotEquals => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterEqual => ">=",
            ComparisonOperator::In => "IN",
            ComparisonOperator::Contains => "CONTAINS",
            ComparisonOperator::StartsWith => "STARTS WITH",
            ComparisonOperator::EndsWith => "ENDS WITH",
            ComparisonOperator::Matches => "=~",
        }
    }
}

/// Leaf of a filter expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Condition {
    /// `left op $param`
    Compare {
        left: String,
        operator: ComparisonOperator,
        param: String,
    },
    /// `$floor <= expr <= $ceiling`
    Between {
        expression: String,
        floor: String,
        ceiling: String,
    },
    /// `id(alias) = $param`
    Identity { variable: String, param: String },
    Raw(String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare {
                left,
                operator,
                param,
            } => write!(f, "{left} {} ${param}", operator.as_str()),
            Condition::Between {
                expression,
                floor,
                ceiling,
            } => write!(f, "${floor} <= {expression} <= ${ceiling}"),
            Condition::Identity { variable, param } => write!(f, "id({variable}) = ${param}"),
            Condition::Raw(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Predicate {
    pub condition: Condition,
    pub negated: bool,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT ({})", self.condition)
        } else {
            self.condition.fmt(f)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Connector {
    #[default]
    And,
    Or,
    Xor,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::Xor => "XOR",
        }
    }
}

/// A parenthesized run of predicates sharing one connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WhereGroup {
    /// How this group attaches to the group before it.
    pub join: Connector,
    /// How the predicates inside the group are combined.
    pub connector: Connector,
    pub predicates: Vec<Predicate>,
}

impl fmt::Display for WhereGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.connector.as_str())?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// The `WHERE` section of a statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Filter {
    pub groups: Vec<WhereGroup>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.predicates.is_empty())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for group in self.groups.iter().filter(|g| !g.predicates.is_empty()) {
            if first {
                f.write_str("WHERE ")?;
                first = false;
            } else {
                write!(f, " {} ", group.join.as_str())?;
            }
            write!(f, "{group}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetOperator {
    Assign,
    Merge,
}

impl SetOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SetOperator::Assign => "=",
            SetOperator::Merge => "+=",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SetItem {
    /// `target op $param`
    Param {
        target: String,
        operator: SetOperator,
        param: String,
    },
    Raw(String),
}

impl fmt::Display for SetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetItem::Param {
                target,
                operator,
                param,
            } => write!(f, "{target} {} ${param}", operator.as_str()),
            SetItem::Raw(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderByItem {
    pub expression: String,
    pub order: SortOrder,
}

impl fmt::Display for OrderByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        write!(f, "{} {dir}", self.expression)
    }
}
