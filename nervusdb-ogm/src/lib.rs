//! # NervusDB OGM
//!
//! A schema-driven object-graph mapper. Entity types are declared once in a
//! [`Registry`]; every operation is compiled into a single parametrized
//! Cypher query, dispatched through a [`Driver`] and hydrated back into
//! [`Node`]s with their eager relationships loaded.
//!
//! ```rust,ignore
//! use nervusdb_ogm::{Ogm, PropertyMap, Registry, Value};
//!
//! let ogm = Ogm::new(driver, registry);
//! let ann = ogm
//!     .create("Person", PropertyMap::from([("name".into(), Value::from("Ann"))]))
//!     .await?;
//! println!("{}", ann.to_json());
//! ```
//!
//! ## Layers
//!
//! - **`nervusdb-ogm-api`**: values, rows, the schema model and the driver traits.
//! - **`nervusdb-ogm-query`**: the query builder and the eager, nested-write,
//!   cascade-delete and DDL compilers.
//! - **this crate**: validation, defaults, hydration and the [`Ogm`] facade.

mod config;
mod defaults;
mod entity;
mod error;
mod hydrate;
mod validate;

use futures::future::{BoxFuture, FutureExt, join_all};
use nervusdb_ogm_query::ast::quote_name;
use nervusdb_ogm_query::{
    CascadeCompiler, EagerCompiler, Labels, ORIGINAL_ALIAS, QueryBuilder, WriteCompiler, cascade,
    ddl,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub use config::OgmConfig;
pub use defaults::{DefaultValues, SchemaDefaults, fill_defaults};
pub use entity::{Collection, Eager, Node, Relationship};
pub use error::{BatchFailure, Error, Result};
pub use hydrate::{HydrateError, Hydrator};
pub use nervusdb_ogm_api::{
    AccessMode, Cascade, Direction, Driver, DriverError, EntityType, Identity, NodeValue,
    Property, PropertyMap, PropertyType, Registry, RelationshipDeclaration, RelationshipShape,
    RelationshipValue, Row, SchemaDefinition, Target, Transaction, Value,
};
pub use nervusdb_ogm_query::ast::SortOrder;
pub use nervusdb_ogm_query::{CompiledQuery, OverflowPolicy, WriteMode};
pub use validate::{FieldFailure, SchemaValidator, ValidationError, ValidationMode, Validator};

/// Filters, ordering and paging for [`Ogm::all`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Property equalities, all of which must hold.
    pub filters: PropertyMap,
    pub order: Vec<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// The mapper: a driver, the registered entity types and the collaborators
/// used to prepare payloads.
pub struct Ogm<D: Driver> {
    driver: D,
    registry: Arc<Registry>,
    config: OgmConfig,
    validator: Arc<dyn Validator>,
    defaults: Arc<dyn DefaultValues>,
}

impl<D: Driver> Ogm<D> {
    pub fn new(driver: D, registry: Registry) -> Self {
        Self {
            driver,
            registry: Arc::new(registry),
            config: OgmConfig::default(),
            validator: Arc::new(SchemaValidator),
            defaults: Arc::new(SchemaDefaults),
        }
    }

    /// Builds a mapper from a declarative JSON schema document.
    pub fn from_schema_json(driver: D, schema: &str) -> Result<Self> {
        let registry = SchemaDefinition::from_json(schema)?.into_registry()?;
        Ok(Self::new(driver, registry))
    }

    pub fn with_config(mut self, config: OgmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_defaults(mut self, defaults: impl DefaultValues + 'static) -> Self {
        self.defaults = Arc::new(defaults);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &OgmConfig {
        &self.config
    }

    pub fn model(&self, name: &str) -> Result<&Arc<EntityType>> {
        Ok(self.registry.model(name)?)
    }

    pub fn hydrator(&self) -> Hydrator<'_> {
        Hydrator::new(&self.registry).with_max_depth(self.config.max_eager_depth)
    }

    fn eager(&self) -> EagerCompiler<'_> {
        EagerCompiler::new(&self.registry).with_max_depth(self.config.max_eager_depth)
    }

    fn writer(&self) -> WriteCompiler<'_> {
        WriteCompiler::new(&self.registry)
            .with_max_depth(self.config.max_write_depth)
            .with_overflow(self.config.write_overflow)
    }

    // ---- writes ----

    /// Creates a node and every nested payload under its relationship keys.
    pub async fn create(&self, model: &str, properties: PropertyMap) -> Result<Node> {
        self.write(WriteMode::Create, model, properties).await
    }

    /// Like [`Self::create`], but merges on the merge fields of each type.
    pub async fn merge(&self, model: &str, properties: PropertyMap) -> Result<Node> {
        self.write(WriteMode::Merge, model, properties).await
    }

    async fn write(&self, mode: WriteMode, model: &str, properties: PropertyMap) -> Result<Node> {
        let model = self.registry.model(model)?;
        let properties = self.prepare(model, properties, 0).await?;

        let mut builder = QueryBuilder::new();
        self.writer()
            .compile(&mut builder, mode, ORIGINAL_ALIAS, model, &properties)?;
        builder
            .with([ORIGINAL_ALIAS])
            .returning([self.eager().return_expression(ORIGINAL_ALIAS, model)?]);

        let rows = builder.execute(&self.driver, AccessMode::Write).await?;
        self.hydrator()
            .hydrate_first(&rows, ORIGINAL_ALIAS, Some(model))?
            .ok_or_else(|| Error::EmptyResult(format!("{mode:?} {}", model.name())))
    }

    /// Applies defaults and validation to a payload and, recursively, to every
    /// nested payload under its relationship keys.
    fn prepare<'a>(
        &'a self,
        model: &'a EntityType,
        properties: PropertyMap,
        depth: usize,
    ) -> BoxFuture<'a, Result<PropertyMap>> {
        async move {
            let properties = fill_defaults(self.defaults.as_ref(), model, properties).await;
            let mut properties = self
                .validator
                .validate(model, properties, ValidationMode::Create)
                .await?;
            if depth >= self.config.max_write_depth {
                return Ok(properties);
            }

            for rel in model.relationships() {
                let Some(value) = properties.remove(&rel.name) else {
                    continue;
                };
                let target = self.registry.target(rel).ok().flatten();
                let value = match (value, target) {
                    (Value::List(items), Some(target)) => {
                        let mut prepared = Vec::with_capacity(items.len());
                        for (idx, item) in items.into_iter().enumerate() {
                            let path = format!("{}.{idx}", rel.name);
                            prepared.push(
                                self.prepare_nested(rel, target, item, depth)
                                    .await
                                    .map_err(|e| at(e, &path))?,
                            );
                        }
                        Value::List(prepared)
                    }
                    (value, Some(target)) => self
                        .prepare_nested(rel, target, value, depth)
                        .await
                        .map_err(|e| at(e, &rel.name))?,
                    (value, None) => value,
                };
                properties.insert(rel.name.clone(), value);
            }
            Ok(properties)
        }
        .boxed()
    }

    async fn prepare_nested(
        &self,
        rel: &RelationshipDeclaration,
        target: &EntityType,
        value: Value,
        depth: usize,
    ) -> Result<Value> {
        let Value::Map(mut map) = value else {
            // References by identity or primary key are resolved by the compiler.
            return Ok(value);
        };
        if !rel.shape.is_relationship() {
            return Ok(Value::Map(self.prepare(target, map, depth + 1).await?));
        }

        map = relationship_properties(rel, map)?;
        if let Some(Value::Map(node)) = map.remove(&rel.node_alias) {
            let node = self
                .prepare(target, node, depth + 1)
                .await
                .map_err(|e| at(e, &rel.node_alias))?;
            map.insert(rel.node_alias.clone(), Value::Map(node));
        }
        Ok(Value::Map(map))
    }

    /// Sets the writable properties supplied in `properties` on `node`.
    ///
    /// Primary, protected and readonly properties are never changed, and
    /// undeclared keys are ignored.
    pub async fn update(&self, node: &Node, properties: PropertyMap) -> Result<Node> {
        let model = node.model();
        let properties = self
            .validator
            .validate(model, properties, ValidationMode::Update)
            .await?;
        let writable: PropertyMap = properties
            .into_iter()
            .filter(|(key, _)| {
                model
                    .property(key)
                    .is_some_and(|p| !(p.primary || p.protected || p.readonly))
            })
            .collect();

        let mut builder = QueryBuilder::new();
        builder
            .match_node(ORIGINAL_ALIAS, model)
            .where_id(ORIGINAL_ALIAS, node.identity())
            .set_props(ORIGINAL_ALIAS, &writable)
            .returning([self.eager().return_expression(ORIGINAL_ALIAS, model)?]);

        let rows = builder.execute(&self.driver, AccessMode::Write).await?;
        self.hydrator()
            .hydrate_first(&rows, ORIGINAL_ALIAS, Some(model))?
            .ok_or_else(|| Error::EmptyResult(format!("update {}", model.name())))
    }

    /// Deletes `node` and whatever its `Delete` cascades reach.
    pub async fn delete(&self, node: &Node) -> Result<()> {
        self.delete_with_depth(node, self.config.max_cascade_depth)
            .await
    }

    pub async fn delete_with_depth(&self, node: &Node, depth: usize) -> Result<()> {
        let mut builder = QueryBuilder::new();
        let plan = CascadeCompiler::new(&self.registry)
            .with_max_depth(depth)
            .compile(&mut builder, ORIGINAL_ALIAS, node.model(), node.identity())?;
        debug!(
            model = node.model().name(),
            nodes = plan.node_count(),
            "cascading delete"
        );
        builder.execute(&self.driver, AccessMode::Write).await?;
        Ok(())
    }

    /// Detach-deletes every node of `model`. No cascades are followed.
    pub async fn delete_all(&self, model: &str) -> Result<()> {
        let model = self.registry.model(model)?;
        let mut builder = QueryBuilder::new();
        cascade::delete_all(&mut builder, ORIGINAL_ALIAS, model);
        builder.execute(&self.driver, AccessMode::Write).await?;
        Ok(())
    }

    /// Connects two existing nodes through the relationship `name` declared
    /// on `from`'s type. With `force_create` a parallel relationship is
    /// always created; otherwise an existing one is matched.
    pub async fn relate(
        &self,
        from: &Node,
        to: &Node,
        name: &str,
        properties: PropertyMap,
        force_create: bool,
    ) -> Result<Relationship> {
        let rel = from
            .model()
            .relationship(name)
            .ok_or_else(|| Error::RelationshipNotFound {
                model: from.model().name().to_string(),
                relationship: name.to_string(),
            })?;
        let mut properties = relationship_properties(rel, properties)?;
        properties.remove(&rel.node_alias);
        let direction = match rel.direction {
            Direction::Both => Direction::Out,
            direction => direction,
        };

        let mut builder = QueryBuilder::new();
        builder
            .match_node("from", from.model())
            .and_node("to", to.model())
            .where_id("from", from.identity())
            .where_id("to", to.identity());
        if force_create {
            builder.create_node("from", Labels::none(), &PropertyMap::new());
        } else {
            builder.merge_node("from", Labels::none(), &PropertyMap::new());
        }
        builder
            .relationship(&rel.rel_type, direction, Some("rel"))
            .to("to", Labels::none())
            .set_props("rel", &properties)
            .returning([
                "rel".to_string(),
                self.eager().return_expression("to", to.model())?,
            ]);

        let rows = builder.execute(&self.driver, AccessMode::Write).await?;
        let other = self
            .hydrator()
            .hydrate_first(&rows, "to", Some(to.model()))?
            .ok_or_else(|| Error::EmptyResult(format!("relate {}.{name}", from.model().name())))?;
        match rows.first().and_then(|row| row.get("rel")) {
            Some(Value::Relationship(raw)) => {
                Ok(self.hydrator().raw_relationship(rel, raw, other))
            }
            other => Err(HydrateError::UnexpectedValue {
                context: format!("{}.{name}", from.model().name()),
                expected: "relationship",
                found: other.map_or("nothing", Value::type_name),
            }
            .into()),
        }
    }

    /// Deletes every relationship between `from` and `to`, in either direction.
    pub async fn detach_from(&self, from: &Node, to: &Node) -> Result<()> {
        let mut builder = QueryBuilder::new();
        builder
            .match_node("from", from.model())
            .any_relationship(Direction::Both, Some("rel"))
            .to("to", to.model())
            .where_id("from", from.identity())
            .where_id("to", to.identity())
            .delete("rel");
        builder.execute(&self.driver, AccessMode::Write).await?;
        Ok(())
    }

    // ---- reads ----

    pub async fn find(&self, model: &str, identity: Identity) -> Result<Option<Node>> {
        let model = self.registry.model(model)?;
        let mut builder = QueryBuilder::new();
        builder
            .match_node(ORIGINAL_ALIAS, model)
            .where_id(ORIGINAL_ALIAS, identity);
        self.read_first(builder, model).await
    }

    pub async fn find_by(
        &self,
        model: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Node>> {
        let model = self.registry.model(model)?;
        let mut builder = QueryBuilder::new();
        builder
            .match_node(ORIGINAL_ALIAS, model)
            .where_eq(&format!("{ORIGINAL_ALIAS}.{}", quote_name(key)), value);
        self.read_first(builder, model).await
    }

    /// First node of `model` matching every entry of `filters`.
    pub async fn first(&self, model: &str, filters: &PropertyMap) -> Result<Option<Node>> {
        let model = self.registry.model(model)?;
        let mut builder = QueryBuilder::new();
        builder
            .match_node(ORIGINAL_ALIAS, model)
            .where_props(ORIGINAL_ALIAS, filters);
        self.read_first(builder, model).await
    }

    pub async fn all(&self, model: &str, options: &FindOptions) -> Result<Collection<Node>> {
        let model = self.registry.model(model)?;
        let mut builder = QueryBuilder::new();
        builder
            .match_node(ORIGINAL_ALIAS, model)
            .where_props(ORIGINAL_ALIAS, &options.filters)
            .returning([self.eager().return_expression(ORIGINAL_ALIAS, model)?]);
        for (key, order) in &options.order {
            builder.order_by(format!("{ORIGINAL_ALIAS}.{}", quote_name(key)), *order);
        }
        if let Some(skip) = options.skip {
            builder.skip(skip);
        }
        if let Some(limit) = options.limit {
            builder.limit(limit);
        }

        let rows = builder.execute(&self.driver, AccessMode::Read).await?;
        Ok(self.hydrator().hydrate(&rows, ORIGINAL_ALIAS, Some(model))?)
    }

    async fn read_first(
        &self,
        mut builder: QueryBuilder,
        model: &Arc<EntityType>,
    ) -> Result<Option<Node>> {
        builder
            .returning([self.eager().return_expression(ORIGINAL_ALIAS, model)?])
            .limit(1);
        let rows = builder.execute(&self.driver, AccessMode::Read).await?;
        Ok(self
            .hydrator()
            .hydrate_first(&rows, ORIGINAL_ALIAS, Some(model))?)
    }

    // ---- schema ----

    /// Installs the constraints and indexes declared by every registered type.
    pub async fn schema_install(&self) -> Result<()> {
        for query in ddl::install(&self.registry, self.config.enterprise) {
            query.execute(&self.driver, AccessMode::Write).await?;
        }
        Ok(())
    }

    pub async fn schema_drop(&self) -> Result<()> {
        for query in ddl::drop(&self.registry, self.config.enterprise) {
            query.execute(&self.driver, AccessMode::Write).await?;
        }
        Ok(())
    }

    // ---- raw queries ----

    /// Runs caller-written Cypher through the write session.
    pub async fn cypher(&self, query: &str, params: PropertyMap) -> Result<Vec<Row>> {
        self.write_cypher(query, params).await
    }

    pub async fn read_cypher(&self, query: &str, params: PropertyMap) -> Result<Vec<Row>> {
        Ok(CompiledQuery::new(query, params)
            .execute(&self.driver, AccessMode::Read)
            .await?)
    }

    pub async fn write_cypher(&self, query: &str, params: PropertyMap) -> Result<Vec<Row>> {
        Ok(CompiledQuery::new(query, params)
            .execute(&self.driver, AccessMode::Write)
            .await?)
    }

    /// Runs every query in one transaction, concurrently.
    ///
    /// If any query fails the transaction is rolled back and every failure
    /// is reported; otherwise it is committed and the rows of each query are
    /// returned in submission order.
    pub async fn batch(&self, queries: Vec<CompiledQuery>) -> Result<Vec<Vec<Row>>> {
        let tx = self.driver.begin().await.map_err(Error::Transaction)?;
        let results = join_all(queries.iter().map(|q| tx.run(&q.query, &q.params))).await;

        let mut outputs = Vec::with_capacity(queries.len());
        let mut failures = Vec::new();
        for (index, (query, result)) in queries.iter().zip(results).enumerate() {
            match result {
                Ok(rows) => outputs.push(rows),
                Err(error) => failures.push(BatchFailure {
                    index,
                    query: query.query.clone(),
                    params: query.params.clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            tx.commit().await.map_err(Error::Transaction)?;
            debug!(queries = queries.len(), "batch committed");
            return Ok(outputs);
        }

        warn!(
            failed = failures.len(),
            total = queries.len(),
            "batch failed, rolling back"
        );
        if let Err(err) = tx.rollback().await {
            warn!(error = %err, "rollback failed");
        }
        Err(Error::Batch(failures))
    }
}

/// Keeps the declared relationship properties of `properties`, coerced to
/// their declared types, plus the node alias entry.
fn relationship_properties(
    rel: &RelationshipDeclaration,
    mut properties: PropertyMap,
) -> Result<PropertyMap> {
    let mut out = PropertyMap::new();
    let mut failures = Vec::new();
    if let Some(node) = properties.remove(&rel.node_alias) {
        out.insert(rel.node_alias.clone(), node);
    }
    for property in &rel.properties {
        let Some(value) = properties.remove(&property.name).filter(|v| !v.is_null()) else {
            continue;
        };
        match validate::coerce(property, value) {
            Ok(value) => {
                out.insert(property.name.clone(), value);
            }
            Err(message) => failures.push(FieldFailure {
                path: property.name.clone(),
                message,
            }),
        }
    }
    if failures.is_empty() {
        Ok(out)
    } else {
        Err(ValidationError::new(failures).into())
    }
}

/// Re-roots the paths of a nested validation failure.
fn at(err: Error, path: &str) -> Error {
    match err {
        Error::Validation(e) => Error::Validation(e.prefixed(path)),
        other => other,
    }
}
