use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Opaque, database-assigned identity of a node or relationship.
pub type Identity = i64;

/// Named property values, also used as the parameter table of a query.
pub type PropertyMap = BTreeMap<String, Value>;

/// A value flowing into a query as a parameter or out of it in a row.
///
/// Besides the scalar, temporal and spatial property types this covers the
/// structural values a driver hands back: raw nodes, raw relationships,
/// lists and maps (map projections arrive as `Map`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    LocalTime(NaiveTime),
    Point(Point),
    List(Vec<Value>),
    Map(PropertyMap),
    Node(NodeValue),
    Relationship(RelationshipValue),
}

/// A spatial point. `srid` 4326/4979 are WGS-84, 7203/9157 cartesian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub srid: u32,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub const WGS84_2D: u32 = 4326;
    pub const WGS84_3D: u32 = 4979;
    pub const CARTESIAN_2D: u32 = 7203;
    pub const CARTESIAN_3D: u32 = 9157;

    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self {
            srid: Self::WGS84_2D,
            x: longitude,
            y: latitude,
            z: None,
        }
    }

    pub fn cartesian(x: f64, y: f64) -> Self {
        Self {
            srid: Self::CARTESIAN_2D,
            x,
            y,
            z: None,
        }
    }
}

/// A node exactly as the driver returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    pub identity: Identity,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

/// A relationship exactly as the driver returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipValue {
    pub identity: Identity,
    pub rel_type: String,
    pub start: Identity,
    pub end: Identity,
    pub properties: PropertyMap,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Identity carried by this value: an integer id or a raw node/relationship.
    pub fn as_identity(&self) -> Option<Identity> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Node(node) => Some(node.identity),
            Value::Relationship(rel) => Some(rel.identity),
            _ => None,
        }
    }

    /// Whether the value can stand in for a primary-key lookup.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::LocalDateTime(_) => "localdatetime",
            Value::LocalTime(_) => "localtime",
            Value::Point(_) => "point",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
            Value::Relationship(_) => "relationship",
        }
    }

    /// Lossy conversion to JSON. Temporal values become ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Value as Json, json};
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => json!(i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
            Value::LocalDateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::LocalTime(t) => Json::String(t.to_string()),
            Value::Point(p) => match p.z {
                Some(z) => json!({ "srid": p.srid, "x": p.x, "y": p.y, "z": z }),
                None => json!({ "srid": p.srid, "x": p.x, "y": p.y }),
            },
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => map_to_json(map),
            Value::Node(node) => json!({
                "identity": node.identity,
                "labels": node.labels,
                "properties": map_to_json(&node.properties),
            }),
            Value::Relationship(rel) => json!({
                "identity": rel.identity,
                "type": rel.rel_type,
                "start": rel.start,
                "end": rel.end,
                "properties": map_to_json(&rel.properties),
            }),
        }
    }
}

fn map_to_json(map: &PropertyMap) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::LocalDateTime(dt)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::LocalTime(t)
    }
}

impl From<Point> for Value {
    fn from(p: Point) -> Self {
        Value::Point(p)
    }
}

impl From<NodeValue> for Value {
    fn from(node: NodeValue) -> Self {
        Value::Node(node)
    }
}

impl From<PropertyMap> for Value {
    fn from(map: PropertyMap) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result record, addressable by the aliases named in `RETURN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    // Rows are narrow: linear search is fine.
    cols: Vec<(String, Value)>,
}

impl Row {
    pub fn new(cols: Vec<(String, Value)>) -> Self {
        Self { cols }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cols.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some((_k, v)) = self.cols.iter_mut().find(|(k, _)| *k == name) {
            *v = value;
        } else {
            self.cols.push((name, value));
        }
        self
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        let idx = self.cols.iter().position(|(k, _)| k == name)?;
        Some(self.cols.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cols.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }
}
