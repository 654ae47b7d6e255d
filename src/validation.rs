//! # Validation
//!
//! The request-time validation gate and the schema vocabulary it consumes.
//!
//! A [`Required`] rule set (schemas for query, body and params) compiles
//! into a chain handler at decoration time. At request time the gate
//! validates each declared target and aborts the chain with a
//! [`ValidationError`] (HTTP 412 at the boundary) on the first failing
//! target. GraphQL-originated invocations skip the gate entirely: argument
//! validation there is the resolver's own responsibility.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chain::{handler_fn, Handler};
use crate::context::Ctx;
use crate::error::RequestError;

/// JSON type names accepted by [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// JSON string
    String,
    /// Any JSON number
    Number,
    /// Integral JSON number
    Integer,
    /// JSON boolean
    Boolean,
    /// JSON null
    Null,
}

impl SchemaType {
    fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

/// Declarative schema: the type/properties/required subset of JSON Schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Expected JSON type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    /// Per-property schemas for objects
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    /// Property names that must be present on objects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Element schema for arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
}

impl Schema {
    fn of(kind: SchemaType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Object schema
    #[must_use]
    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    /// String schema
    #[must_use]
    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    /// Number schema
    #[must_use]
    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    /// Integer schema
    #[must_use]
    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    /// Boolean schema
    #[must_use]
    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    /// Array schema with an element schema
    #[must_use]
    pub fn array(items: Self) -> Self {
        Self {
            kind: Some(SchemaType::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Add a property schema
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, schema: Self) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Mark property names as required
    #[must_use]
    pub fn require<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }
}

/// A single field-level schema violation
#[derive(Debug, Clone, Serialize)]
pub struct SchemaViolation {
    /// Dotted path of the offending field, prefixed with the target name
    pub property: String,
    /// Human-readable message
    pub message: String,
}

/// Outcome of validating one data value against a schema
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaReport {
    /// Whether the data satisfied the schema
    pub valid: bool,
    /// Field-level violations when invalid
    pub errors: Vec<SchemaViolation>,
}

/// Pluggable schema validation seam
pub trait SchemaValidator: Send + Sync {
    /// Validate `data` against `schema`; `property_name` prefixes every
    /// reported property path (e.g. `body.userEmail`).
    fn validate(&self, data: &Value, schema: &Schema, property_name: &str) -> SchemaReport;
}

/// Built-in validator covering the [`Schema`] subset
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl DefaultValidator {
    fn check(data: &Value, schema: &Schema, path: &str, errors: &mut Vec<SchemaViolation>) {
        if let Some(kind) = schema.kind {
            if !kind.matches(data) {
                errors.push(SchemaViolation {
                    property: path.to_string(),
                    message: format!("is not of a type(s) {}", kind.name()),
                });
                return;
            }
        }

        if let Some(object) = data.as_object() {
            for name in &schema.required {
                if !object.contains_key(name) {
                    errors.push(SchemaViolation {
                        property: format!("{path}.{name}"),
                        message: "is required".to_string(),
                    });
                }
            }
            for (name, property_schema) in &schema.properties {
                if let Some(value) = object.get(name) {
                    Self::check(value, property_schema, &format!("{path}.{name}"), errors);
                }
            }
        }

        if let (Some(array), Some(items)) = (data.as_array(), &schema.items) {
            for (index, element) in array.iter().enumerate() {
                Self::check(element, items, &format!("{path}[{index}]"), errors);
            }
        }
    }
}

impl SchemaValidator for DefaultValidator {
    fn validate(&self, data: &Value, schema: &Schema, property_name: &str) -> SchemaReport {
        let mut errors = Vec::new();
        Self::check(data, schema, property_name, &mut errors);
        SchemaReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Schema mismatch on a request target, surfaced as HTTP 412
#[derive(Debug, Clone, Error)]
#[error("{target} validation error: {message}")]
pub struct ValidationError {
    /// Which part of the request failed (`query`, `body`, `params`)
    pub target: String,
    /// Field messages joined by a comma, target prefix stripped
    pub message: String,
    /// Raw structured violations
    pub errors: Vec<SchemaViolation>,
}

impl ValidationError {
    /// Build from a failed report
    #[must_use]
    pub fn from_report(target: &str, report: SchemaReport) -> Self {
        let prefix = format!("{target}.");
        let message = report
            .errors
            .iter()
            .map(|e| {
                let property = e.property.strip_prefix(&prefix).unwrap_or(&e.property);
                format!("{property} {}", e.message)
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            target: target.to_string(),
            message,
            errors: report.errors,
        }
    }
}

/// Validation rules attached to a handler by the `required` decoration
#[derive(Clone)]
pub struct Required {
    /// Schema for path parameters
    pub params: Option<Schema>,
    /// Schema for the parsed query string
    pub query: Option<Schema>,
    /// Schema for the JSON request body
    pub body: Option<Schema>,
    validator: Arc<dyn SchemaValidator>,
}

impl Default for Required {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Required {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Required")
            .field("params", &self.params.is_some())
            .field("query", &self.query.is_some())
            .field("body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

impl Required {
    /// Empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: None,
            query: None,
            body: None,
            validator: Arc::new(DefaultValidator),
        }
    }

    /// Require the path params to satisfy a schema
    #[must_use]
    pub fn params(mut self, schema: Schema) -> Self {
        self.params = Some(schema);
        self
    }

    /// Require the query string to satisfy a schema
    #[must_use]
    pub fn query(mut self, schema: Schema) -> Self {
        self.query = Some(schema);
        self
    }

    /// Require the JSON body to satisfy a schema
    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.body = Some(schema);
        self
    }

    /// Swap in a different validator implementation
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Compile the rules into a validation-gate chain handler
    ///
    /// The gate validates params, query, then body; the first failing
    /// target aborts the chain before the wrapped handler runs. Requests
    /// flagged as GraphQL invocations pass through untouched.
    #[must_use]
    pub fn into_handler(self) -> Handler {
        let rules = Arc::new(self);
        handler_fn(move |ctx: Ctx, next| {
            let rules = Arc::clone(&rules);
            async move {
                let is_graphql = ctx.with(|c| c.graphql.is_some());
                if !is_graphql {
                    if let Some(schema) = &rules.params {
                        let data = ctx.with(|c| string_map_to_value(&c.params));
                        validate_or_abort("params", &data, schema, rules.validator.as_ref())?;
                    }
                    if let Some(schema) = &rules.query {
                        let data = ctx.with(|c| string_map_to_value(&c.query));
                        validate_or_abort("query", &data, schema, rules.validator.as_ref())?;
                    }
                    if let Some(schema) = &rules.body {
                        let data = ctx.with(|c| c.request_body.clone());
                        validate_or_abort("body", &data, schema, rules.validator.as_ref())?;
                    }
                }
                next.run(ctx).await
            }
        })
    }
}

fn string_map_to_value(map: &std::collections::HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn validate_or_abort(
    target: &str,
    data: &Value,
    schema: &Schema,
    validator: &dyn SchemaValidator,
) -> Result<(), RequestError> {
    let report = validator.validate(data, schema, target);
    if report.valid {
        Ok(())
    } else {
        Err(RequestError::Validation(ValidationError::from_report(
            target, report,
        )))
    }
}
