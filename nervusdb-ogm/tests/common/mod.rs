//! In-memory scripted driver shared by the facade tests.

#![allow(dead_code)]

use async_trait::async_trait;
use nervusdb_ogm::{
    AccessMode, Driver, DriverError, Ogm, PropertyMap, Registry, Row, SchemaDefinition,
    Transaction, Value,
};
use std::sync::{Arc, Mutex};

pub type Responder =
    dyn Fn(&str, &PropertyMap) -> Result<Vec<Row>, DriverError> + Send + Sync + 'static;

#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub mode: AccessMode,
    pub query: String,
    pub params: PropertyMap,
}

#[derive(Default)]
pub struct Log {
    pub executed: Vec<Executed>,
    /// Queries made durable by auto-commit runs or committed transactions.
    pub committed: Vec<String>,
    pub rollbacks: usize,
}

/// Answers every query through a closure and records what was sent.
#[derive(Clone)]
pub struct ScriptedDriver {
    responder: Arc<Responder>,
    pub log: Arc<Mutex<Log>>,
}

impl ScriptedDriver {
    pub fn new(
        responder: impl Fn(&str, &PropertyMap) -> Result<Vec<Row>, DriverError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Arc::new(responder),
            log: Arc::new(Mutex::new(Log::default())),
        }
    }

    /// A driver that answers every query with no rows.
    pub fn silent() -> Self {
        Self::new(|_, _| Ok(Vec::new()))
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().unwrap().executed.clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.log.lock().unwrap().committed.clone()
    }

    pub fn rollbacks(&self) -> usize {
        self.log.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Transaction = ScriptedTransaction;

    async fn run(
        &self,
        mode: AccessMode,
        query: &str,
        params: &PropertyMap,
    ) -> Result<Vec<Row>, DriverError> {
        let result = (self.responder)(query, params);
        let mut log = self.log.lock().unwrap();
        log.executed.push(Executed {
            mode,
            query: query.to_string(),
            params: params.clone(),
        });
        if result.is_ok() && mode == AccessMode::Write {
            log.committed.push(query.to_string());
        }
        result
    }

    async fn begin(&self) -> Result<ScriptedTransaction, DriverError> {
        Ok(ScriptedTransaction {
            driver: self.clone(),
            staged: Mutex::new(Vec::new()),
        })
    }
}

/// Stages successful queries until commit.
pub struct ScriptedTransaction {
    driver: ScriptedDriver,
    staged: Mutex<Vec<String>>,
}

#[async_trait]
impl Transaction for ScriptedTransaction {
    async fn run(&self, query: &str, params: &PropertyMap) -> Result<Vec<Row>, DriverError> {
        let result = (self.driver.responder)(query, params);
        self.driver.log.lock().unwrap().executed.push(Executed {
            mode: AccessMode::Write,
            query: query.to_string(),
            params: params.clone(),
        });
        if result.is_ok() {
            self.staged.lock().unwrap().push(query.to_string());
        }
        result
    }

    async fn commit(self) -> Result<(), DriverError> {
        let staged = self.staged.into_inner().unwrap();
        self.driver.log.lock().unwrap().committed.extend(staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), DriverError> {
        self.driver.log.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

pub const SCHEMA: &str = r#"{
    "Person": {
        "person_id": { "type": "uuid", "primary": true },
        "name": { "type": "string", "required": true, "index": true },
        "email": { "type": "string", "unique": true },
        "age": "integer",
        "password": { "type": "string", "hidden": true },
        "knows": {
            "type": "relationships", "relationship": "KNOWS", "direction": "out",
            "target": "Person", "alias": "friend",
            "properties": { "since": "integer" }
        },
        "employer": {
            "type": "node", "relationship": "WORKS_AT", "direction": "out",
            "target": "Company", "eager": true
        }
    },
    "Company": {
        "name": { "type": "string", "primary": true }
    },
    "Account": {
        "email": { "type": "string", "unique": true, "required": true },
        "plan": { "type": "string", "default": "free" }
    }
}"#;

pub fn registry() -> Registry {
    SchemaDefinition::from_json(SCHEMA)
        .unwrap()
        .into_registry()
        .unwrap()
}

pub fn ogm(driver: ScriptedDriver) -> Ogm<ScriptedDriver> {
    Ogm::new(driver, registry())
}

/// A projected node map as the eager `RETURN` produces it.
pub fn projected(id: i64, label: &str, properties: &[(&str, Value)]) -> Value {
    let mut map = PropertyMap::from([
        ("__EAGER_ID__".to_string(), Value::Int(id)),
        (
            "__EAGER_LABELS__".to_string(),
            Value::List(vec![Value::from(label)]),
        ),
    ]);
    for (key, value) in properties {
        map.insert(key.to_string(), value.clone());
    }
    Value::Map(map)
}

/// Collects every `{prefix}{key}` parameter back into a property map.
pub fn params_with_prefix(params: &PropertyMap, prefix: &str) -> PropertyMap {
    params
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(prefix).map(|key| (key.to_string(), v.clone())))
        .collect()
}

pub fn props(pairs: &[(&str, Value)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
