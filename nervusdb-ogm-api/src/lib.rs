//! Public API shared by the NervusDB OGM crates.
//!
//! This crate owns the data that crosses every boundary of the mapper:
//! property [`Value`]s and result [`Row`]s, the schema model
//! ([`EntityType`], [`Property`], [`RelationshipDeclaration`], [`Registry`]),
//! and the [`Driver`] / [`Transaction`] traits the query engine is reached
//! through.

mod definition;
mod error;
mod schema;
mod value;

use async_trait::async_trait;

pub use definition::{DeclarationDefinition, EntryDefinition, ModelDefinition, SchemaDefinition};
pub use error::SchemaError;
pub use schema::{
    Cascade, DefaultValue, Direction, EntityType, EntityTypeBuilder, Property, PropertyType,
    Registry, RelationshipDeclaration, RelationshipShape, Target,
};
pub use value::{Identity, NodeValue, Point, PropertyMap, RelationshipValue, Row, Value};

/// Which session a query is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

/// Failure reported by the database driver for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    /// Server-side status code, when the driver reports one.
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Executes compiled query text against a graph database.
///
/// Implementors own connection and session lifecycle. Every call to
/// [`Driver::run`] is an independent auto-commit unit of work; batches use
/// an explicit [`Transaction`] from [`Driver::begin`].
#[async_trait]
pub trait Driver: Send + Sync {
    type Transaction: Transaction;

    /// Runs one query through the read or write session.
    async fn run(
        &self,
        mode: AccessMode,
        query: &str,
        params: &PropertyMap,
    ) -> Result<Vec<Row>, DriverError>;

    /// Opens an explicit write transaction.
    async fn begin(&self) -> Result<Self::Transaction, DriverError>;
}

/// An open write transaction.
///
/// `run` takes `&self` so several queries can be in flight at once; the
/// transaction is consumed by either [`Transaction::commit`] or
/// [`Transaction::rollback`].
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn run(&self, query: &str, params: &PropertyMap) -> Result<Vec<Row>, DriverError>;

    async fn commit(self) -> Result<(), DriverError>;

    async fn rollback(self) -> Result<(), DriverError>;
}
