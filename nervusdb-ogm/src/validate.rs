//! Payload validation and type coercion.
//!
//! Validation runs before any query is compiled. A payload failing it never
//! reaches the driver.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use nervusdb_ogm_api::{EntityType, Point, Property, PropertyMap, PropertyType, Value};
use std::fmt;
use thiserror::Error;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    /// Dotted path from the payload root, e.g. `friends.0.name`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summary(.failures))]
pub struct ValidationError {
    pub failures: Vec<FieldFailure>,
}

fn summary(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(failures: Vec<FieldFailure>) -> Self {
        Self { failures }
    }

    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldFailure {
            path: path.into(),
            message: message.into(),
        }])
    }

    /// Re-roots every failure path under `prefix`.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        for failure in &mut self.failures {
            failure.path = format!("{prefix}.{}", failure.path);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every required property must be present.
    Create,
    /// Only supplied properties are checked.
    Update,
}

/// Validates and coerces the scalar part of a payload for one entity type.
///
/// Relationship keys are left untouched; nested payloads are validated
/// against their own target type by the caller.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        model: &EntityType,
        properties: PropertyMap,
        mode: ValidationMode,
    ) -> Result<PropertyMap, ValidationError>;
}

/// Validator driven purely by the declared property types.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

#[async_trait]
impl Validator for SchemaValidator {
    async fn validate(
        &self,
        model: &EntityType,
        mut properties: PropertyMap,
        mode: ValidationMode,
    ) -> Result<PropertyMap, ValidationError> {
        let mut failures = Vec::new();

        for property in model.properties() {
            match properties.remove(&property.name) {
                missing @ (None | Some(Value::Null)) => {
                    if mode == ValidationMode::Create && property.required {
                        failures.push(FieldFailure {
                            path: property.name.clone(),
                            message: "is required".into(),
                        });
                    } else if let Some(null) = missing {
                        // An explicit null clears the property on update.
                        properties.insert(property.name.clone(), null);
                    }
                }
                Some(value) => match coerce(property, value) {
                    Ok(value) => {
                        properties.insert(property.name.clone(), value);
                    }
                    Err(message) => failures.push(FieldFailure {
                        path: property.name.clone(),
                        message,
                    }),
                },
            }
        }

        if failures.is_empty() {
            Ok(properties)
        } else {
            Err(ValidationError::new(failures))
        }
    }
}

/// Coerces `value` to the declared type of `property`.
pub fn coerce(property: &Property, value: Value) -> Result<Value, String> {
    let mismatch = |value: &Value| format!("expected {:?}, found {}", property.kind, value.type_name());

    Ok(match (property.kind, value) {
        (PropertyType::Any, value) => value,

        (PropertyType::String, Value::String(s)) => Value::String(s),
        (PropertyType::String, Value::Int(i)) => Value::String(i.to_string()),
        (PropertyType::String, Value::Float(f)) => Value::String(f.to_string()),
        (PropertyType::String, Value::Bool(b)) => Value::String(b.to_string()),

        (PropertyType::Integer, Value::Int(i)) => Value::Int(i),
        (PropertyType::Integer, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
            Value::Int(f as i64)
        }
        (PropertyType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("{s:?} is not an integer"))?,

        (PropertyType::Float, Value::Float(f)) => Value::Float(f),
        (PropertyType::Float, Value::Int(i)) => Value::Float(i as f64),
        (PropertyType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("{s:?} is not a float"))?,

        (PropertyType::Number, Value::Int(i)) => Value::Int(i),
        (PropertyType::Number, Value::Float(f)) => Value::Float(f),
        (PropertyType::Number, Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => s
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| format!("{s:?} is not a number"))?,
            }
        }

        (PropertyType::Boolean, Value::Bool(b)) => Value::Bool(b),
        (PropertyType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(format!("{s:?} is not a boolean")),
        },

        (PropertyType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(&s)
            .map(|u| Value::String(u.hyphenated().to_string()))
            .map_err(|e| format!("{s:?} is not a uuid: {e}"))?,

        (PropertyType::Date, Value::Date(d)) => Value::Date(d),
        (PropertyType::Date, Value::String(s)) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| format!("{s:?} is not a date: {e}"))?,

        (PropertyType::DateTime, Value::DateTime(dt)) => Value::DateTime(dt),
        (PropertyType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(Value::DateTime)
            .map_err(|e| format!("{s:?} is not a datetime: {e}"))?,

        (PropertyType::LocalDateTime, Value::LocalDateTime(dt)) => Value::LocalDateTime(dt),
        (PropertyType::LocalDateTime, Value::String(s)) => {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(Value::LocalDateTime)
                .map_err(|e| format!("{s:?} is not a local datetime: {e}"))?
        }

        (PropertyType::LocalTime, Value::LocalTime(t)) => Value::LocalTime(t),
        (PropertyType::LocalTime, Value::String(s)) => NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
            .map(Value::LocalTime)
            .map_err(|e| format!("{s:?} is not a time: {e}"))?,

        (PropertyType::Point, Value::Point(p)) => Value::Point(p),
        (PropertyType::Point, Value::Map(map)) => {
            let num = |key: &str| map.get(key).and_then(Value::as_f64);
            match (num("latitude"), num("longitude"), num("x"), num("y")) {
                (Some(lat), Some(lon), _, _) => Value::Point(Point::wgs84(lon, lat)),
                (_, _, Some(x), Some(y)) => Value::Point(Point::cartesian(x, y)),
                _ => return Err("point needs latitude/longitude or x/y".into()),
            }
        }

        (_, value) => return Err(mismatch(&value)),
    })
}
