use crate::hydrate::HydrateError;
use crate::validate::ValidationError;
use nervusdb_ogm_api::{DriverError, PropertyMap, SchemaError};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for OGM operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The payload could not be compiled into a query.
    #[error(transparent)]
    Query(nervusdb_ogm_query::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not hydrate result: {0}")]
    Hydrate(#[from] HydrateError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("model {model} has no relationship named {relationship}")]
    RelationshipNotFound { model: String, relationship: String },

    #[error("query failed: {source}\nquery: {query}")]
    Execution {
        query: String,
        params: PropertyMap,
        #[source]
        source: DriverError,
    },

    #[error("{} of the batch failed, nothing was committed:\n{}", .0.len(), list(.0))]
    Batch(Vec<BatchFailure>),

    #[error("transaction failed: {0}")]
    Transaction(#[source] DriverError),

    #[error("{0} returned no rows")]
    EmptyResult(String),
}

/// One failed query of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Position of the query in the submitted batch.
    pub index: usize,
    pub query: String,
    pub params: PropertyMap,
    pub error: DriverError,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {} ({})", self.index, self.error, self.query)
    }
}

fn list(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<nervusdb_ogm_query::Error> for Error {
    fn from(e: nervusdb_ogm_query::Error) -> Self {
        match e {
            nervusdb_ogm_query::Error::Schema(e) => Error::Schema(e),
            nervusdb_ogm_query::Error::Execution {
                query,
                params,
                source,
            } => Error::Execution {
                query,
                params,
                source,
            },
            other => Error::Query(other),
        }
    }
}
