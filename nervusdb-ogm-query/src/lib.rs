pub mod ast;
pub mod builder;
pub mod cascade;
pub mod ddl;
pub mod eager;
pub mod error;
pub mod statement;
pub mod write;

pub use builder::{CompiledQuery, Labels, QueryBuilder};
pub use cascade::{CascadeCompiler, CascadeNode, MAX_CASCADE_DEPTH};
pub use eager::{
    EAGER_ID, EAGER_LABELS, EAGER_TYPE, EagerCompiler, MAX_EAGER_DEPTH, Projection,
};
pub use error::{Error, Result};
pub use statement::{Statement, StatementHead};
pub use write::{
    DEFAULTED_KEYS, MAX_CREATE_DEPTH, ORIGINAL_ALIAS, OverflowPolicy, WriteCompiler, WriteMode,
    WritePlan,
};
