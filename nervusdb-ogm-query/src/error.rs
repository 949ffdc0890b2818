//! Error and result types for the query compiler.

use nervusdb_ogm_api::{DriverError, PropertyMap, SchemaError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("a target definition must be registered for {relationship} on model {model}")]
    UnresolvedTarget { relationship: String, model: String },

    #[error("{relationship} on model {model} points at {target}, which has no primary key")]
    MissingPrimaryKey {
        relationship: String,
        model: String,
        target: String,
    },

    #[error("{relationship} on model {model} cannot reference a {found} value")]
    InvalidReference {
        relationship: String,
        model: String,
        found: &'static str,
    },

    #[error("{relationship} on model {model} is missing its node under key {key:?}")]
    MissingRelationshipNode {
        relationship: String,
        model: String,
        key: String,
    },

    #[error("nested write exceeded the depth limit of {limit} at {relationship}")]
    DepthExceeded { limit: usize, relationship: String },

    #[error("query failed: {source}\nquery: {query}")]
    Execution {
        query: String,
        params: PropertyMap,
        #[source]
        source: DriverError,
    },
}
