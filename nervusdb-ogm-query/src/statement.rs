use crate::ast::{Filter, OrderByItem, Pattern, SetItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword a statement opens with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StatementHead {
    Match,
    OptionalMatch,
    Create,
    Merge,
    /// `WITH a, b`: carries aliases from the previous statement.
    With(Vec<String>),
}

/// One stanza of a query.
///
/// Sections always render in the same order regardless of the order they
/// were added in: pattern, where, remove, on create set, on match set, set,
/// delete, detach delete, return, order by, skip, limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub head: StatementHead,
    /// Comma-separated paths following the head keyword.
    pub patterns: Vec<Pattern>,
    pub filter: Filter,
    pub remove: Vec<String>,
    pub on_create_set: Vec<SetItem>,
    pub on_match_set: Vec<SetItem>,
    pub set: Vec<SetItem>,
    pub delete: Vec<String>,
    pub detach_delete: Vec<String>,
    pub returns: Vec<String>,
    pub distinct: bool,
    pub order_by: Vec<OrderByItem>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Statement {
    pub fn new(head: StatementHead) -> Self {
        Self {
            head,
            patterns: Vec::new(),
            filter: Filter::default(),
            remove: Vec::new(),
            on_create_set: Vec::new(),
            on_match_set: Vec::new(),
            set: Vec::new(),
            delete: Vec::new(),
            detach_delete: Vec::new(),
            returns: Vec::new(),
            distinct: false,
            order_by: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Renders the head keyword and the pattern only.
    pub fn pattern(&self) -> String {
        let keyword = match &self.head {
            StatementHead::Match => "MATCH",
            StatementHead::OptionalMatch => "OPTIONAL MATCH",
            StatementHead::Create => "CREATE",
            StatementHead::Merge => "MERGE",
            StatementHead::With(aliases) => return format!("WITH {}", aliases.join(", ")),
        };
        let paths: Vec<String> = self.patterns.iter().map(ToString::to_string).collect();
        format!("{keyword} {}", paths.join(", "))
    }

    /// Whether any clause other than the head has been added.
    pub fn is_bare(&self) -> bool {
        self.filter.is_empty()
            && self.remove.is_empty()
            && self.on_create_set.is_empty()
            && self.on_match_set.is_empty()
            && self.set.is_empty()
            && self.delete.is_empty()
            && self.detach_delete.is_empty()
            && self.returns.is_empty()
            && self.order_by.is_empty()
            && self.skip.is_none()
            && self.limit.is_none()
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = vec![self.pattern()];

        if !self.filter.is_empty() {
            lines.push(self.filter.to_string());
        }
        if !self.remove.is_empty() {
            lines.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        if !self.on_create_set.is_empty() {
            lines.push(format!("ON CREATE SET {}", join(&self.on_create_set)));
        }
        if !self.on_match_set.is_empty() {
            lines.push(format!("ON MATCH SET {}", join(&self.on_match_set)));
        }
        if !self.set.is_empty() {
            lines.push(format!("SET {}", join(&self.set)));
        }
        if !self.delete.is_empty() {
            lines.push(format!("DELETE {}", self.delete.join(", ")));
        }
        if !self.detach_delete.is_empty() {
            lines.push(format!("DETACH DELETE {}", self.detach_delete.join(", ")));
        }
        if !self.returns.is_empty() {
            let keyword = if self.distinct {
                "RETURN DISTINCT"
            } else {
                "RETURN"
            };
            lines.push(format!("{keyword} {}", self.returns.join(", ")));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("ORDER BY {}", join(&self.order_by)));
        }
        if let Some(skip) = self.skip {
            lines.push(format!("SKIP {skip}"));
        }
        if let Some(limit) = self.limit {
            lines.push(format!("LIMIT {limit}"));
        }

        f.write_str(&lines.join("\n"))
    }
}
