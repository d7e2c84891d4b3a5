//! Explicit message schemas and the validator that gates every payload.
//!
//! Schemas are description objects (field name → type + constraint)
//! interpreted at runtime, not compile-time types: the set of topics and
//! their shapes is part of the application declaration. Payloads are JSON
//! documents; validation is total — a byte payload either decodes into a
//! fully valid [`TypedMessage`] or is rejected, and no partial object ever
//! reaches handler code.
//!
//! Unknown extra fields are ignored rather than rejected (liberal-receiver
//! policy) so producers can evolve ahead of consumers.
//!
//! # Example
//!
//! ```
//! use streambind_core::schema::{Constraint, FieldType, MessageSchema};
//!
//! let features = MessageSchema::new("IrisFeatures")
//!     .field("sepal_length", FieldType::Float, Constraint::NonNegative)
//!     .field("sepal_width", FieldType::Float, Constraint::NonNegative)
//!     .field("petal_length", FieldType::Float, Constraint::NonNegative)
//!     .field("petal_width", FieldType::Float, Constraint::NonNegative);
//!
//! let payload = br#"{"sepal_length": 0.5, "sepal_width": 0.5,
//!                    "petal_length": 0.5, "petal_width": 0.5}"#;
//! let message = features.decode("input_data", payload).unwrap();
//! assert_eq!(message.f64("sepal_length"), Some(0.5));
//! ```

use crate::bindings::BindingRegistry;
use crate::error::ValidationError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON boolean.
    Bool,
    /// JSON integer (no fractional part).
    Integer,
    /// JSON number, read as `f64`. Integers are accepted and widened.
    Float,
    /// JSON string.
    Text,
}

impl FieldType {
    /// Display name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
        }
    }
}

/// Optional value constraint on a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// No constraint beyond the type check.
    None,
    /// Numeric value must be `>= 0`.
    NonNegative,
    /// Numeric value must lie in `[min, max]` inclusive.
    Range {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Text value must be one of the listed variants.
    OneOf(Vec<String>),
    /// Text value must be at least this many characters.
    MinLength(usize),
}

impl Constraint {
    fn describe(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::NonNegative => "non-negative".to_string(),
            Self::Range { min, max } => format!("in range [{min}, {max}]"),
            Self::OneOf(values) => format!("one of {values:?}"),
            Self::MinLength(n) => format!("at least {n} characters"),
        }
    }

    fn check(&self, value: &Value) -> bool {
        match self {
            Self::None => true,
            Self::NonNegative => value.as_f64().is_some_and(|v| v >= 0.0),
            Self::Range { min, max } => value.as_f64().is_some_and(|v| v >= *min && v <= *max),
            Self::OneOf(values) => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
            Self::MinLength(n) => value.as_str().is_some_and(|s| s.chars().count() >= *n),
        }
    }
}

/// One declared field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name as it appears in the payload.
    pub name: String,
    /// Declared primitive type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Value constraint checked after the type check.
    pub constraint: Constraint,
}

/// A named structural contract for messages on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl MessageSchema {
    /// Create an empty schema with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    #[must_use]
    pub fn field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        constraint: Constraint,
    ) -> Self {
        self.push_field(name, field_type, constraint, true)
    }

    /// Add an optional field.
    #[must_use]
    pub fn optional_field(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        constraint: Constraint,
    ) -> Self {
        self.push_field(name, field_type, constraint, false)
    }

    fn push_field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        constraint: Constraint,
        required: bool,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required,
            constraint,
        });
        self
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Decode and validate a raw payload against this schema.
    ///
    /// Extra undeclared fields in the payload are dropped. The returned
    /// message carries only declared fields, each fully validated.
    ///
    /// # Errors
    ///
    /// Any structural or constraint violation is a [`ValidationError`]
    /// naming the topic, field, and violated rule.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<TypedMessage, ValidationError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ValidationError::Malformed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        let Value::Object(object) = value else {
            return Err(ValidationError::Malformed {
                topic: topic.to_string(),
                reason: "payload is not a JSON object".to_string(),
            });
        };
        self.validate_object(topic, &object)
    }

    /// Validate an already-constructed message and serialize it.
    ///
    /// Used on the outbound path: handler output is re-validated before
    /// publish even though the handler "trusts" its own output.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`MessageSchema::decode`].
    pub fn encode(&self, topic: &str, message: &TypedMessage) -> Result<Vec<u8>, ValidationError> {
        let validated = self.validate_object(topic, message.values())?;
        serde_json::to_vec(&Value::Object(validated.into_values())).map_err(|e| {
            ValidationError::Malformed {
                topic: topic.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn validate_object(
        &self,
        topic: &str,
        object: &Map<String, Value>,
    ) -> Result<TypedMessage, ValidationError> {
        let mut values = Map::new();
        for spec in &self.fields {
            let Some(value) = object.get(&spec.name) else {
                if spec.required {
                    return Err(ValidationError::MissingField {
                        topic: topic.to_string(),
                        field: spec.name.clone(),
                    });
                }
                continue;
            };

            if !type_matches(spec.field_type, value) {
                return Err(ValidationError::TypeMismatch {
                    topic: topic.to_string(),
                    field: spec.name.clone(),
                    expected: spec.field_type.name().to_string(),
                    actual: json_type_name(value).to_string(),
                });
            }

            if !spec.constraint.check(value) {
                return Err(ValidationError::ConstraintViolated {
                    topic: topic.to_string(),
                    field: spec.name.clone(),
                    constraint: spec.constraint.describe(),
                });
            }

            values.insert(spec.name.clone(), value.clone());
        }

        Ok(TypedMessage {
            schema: self.name.clone(),
            values,
        })
    }
}

fn type_matches(expected: FieldType, value: &Value) -> bool {
    match expected {
        FieldType::Bool => value.is_boolean(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Text => value.is_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A fully validated message: only declared fields, all constraints met.
///
/// Handlers receive these on the inbound side and construct them on the
/// outbound side (via [`TypedMessage::builder`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedMessage {
    schema: String,
    values: Map<String, Value>,
}

impl TypedMessage {
    /// Start building an outbound message for the named schema.
    #[must_use]
    pub fn builder(schema: impl Into<String>) -> TypedMessageBuilder {
        TypedMessageBuilder {
            schema: schema.into(),
            values: Map::new(),
        }
    }

    /// Name of the schema this message was validated against.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The underlying field map.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Read a float field (integers widen).
    #[must_use]
    pub fn f64(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(Value::as_f64)
    }

    /// Read an integer field.
    #[must_use]
    pub fn i64(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(Value::as_i64)
    }

    /// Read a boolean field.
    #[must_use]
    pub fn bool(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(Value::as_bool)
    }

    /// Read a text field.
    #[must_use]
    pub fn str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }
}

/// Builder for outbound [`TypedMessage`] values.
///
/// The builder performs no validation; the dispatch runtime validates the
/// finished message against the producer schema before publishing.
#[derive(Debug, Clone)]
pub struct TypedMessageBuilder {
    schema: String,
    values: Map<String, Value>,
}

impl TypedMessageBuilder {
    /// Set a field to any JSON value.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> TypedMessage {
        TypedMessage {
            schema: self.schema,
            values: self.values,
        }
    }
}

/// Validator derived from a sealed binding registry.
///
/// Holds the topic → schema maps for both directions and gates every
/// payload the dispatch runtime moves. Failures identify the topic, field,
/// and violated constraint, and are converted by the runtime into
/// per-message rejections rather than process faults.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    inbound: HashMap<String, Arc<MessageSchema>>,
    outbound: HashMap<String, Arc<MessageSchema>>,
}

impl SchemaValidator {
    /// Build the validator from the registry's bound schemas.
    ///
    /// Where a topic has multiple consumer bindings they share a schema by
    /// construction (the first bound schema wins for validation; bindings
    /// for one topic declare the same contract).
    #[must_use]
    pub fn from_bindings(bindings: &BindingRegistry) -> Self {
        let mut inbound = HashMap::new();
        for binding in bindings.consumer_bindings() {
            inbound
                .entry(binding.topic.clone())
                .or_insert_with(|| Arc::clone(&binding.schema));
        }
        let outbound = bindings
            .producer_bindings()
            .map(|binding| (binding.topic.clone(), Arc::clone(&binding.schema)))
            .collect();
        Self { inbound, outbound }
    }

    /// Validate raw inbound bytes for a consumer topic.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NoSchema`] if the topic has no consumer binding,
    /// otherwise any decode/validation failure from the schema.
    pub fn validate_inbound(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<TypedMessage, ValidationError> {
        let schema = self.inbound.get(topic).ok_or_else(|| ValidationError::NoSchema {
            topic: topic.to_string(),
            direction: "consumer".to_string(),
        })?;
        schema.decode(topic, payload)
    }

    /// Validate and serialize an outbound message for a producer topic.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NoSchema`] if the topic has no producer binding,
    /// otherwise any validation failure from the schema.
    pub fn validate_outbound(
        &self,
        topic: &str,
        message: &TypedMessage,
    ) -> Result<Vec<u8>, ValidationError> {
        let schema = self.outbound.get(topic).ok_or_else(|| ValidationError::NoSchema {
            topic: topic.to_string(),
            direction: "producer".to_string(),
        })?;
        schema.encode(topic, message)
    }
}
