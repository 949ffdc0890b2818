use thiserror::Error;

/// Errors raised while declaring or registering entity types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("model {0} is already registered")]
    DuplicateModel(String),

    #[error("no model registered under the name {0}")]
    UnknownModel(String),

    #[error("model {model} declares more than one primary key ({first}, {second})")]
    MultiplePrimaryKeys {
        model: String,
        first: String,
        second: String,
    },

    #[error("model {model} declares {key} both as a property and as a relationship")]
    DuplicateKey { model: String, key: String },

    #[error("unknown property type {0:?}")]
    UnknownPropertyType(String),

    #[error("invalid declaration {key} on model {model}: {message}")]
    InvalidDefinition {
        model: String,
        key: String,
        message: String,
    },

    #[error("invalid schema document: {0}")]
    Json(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Json(err.to_string())
    }
}
