//! JSON schema loading and validation for structured payloads.
//!
//! Implements a subset of JSON Schema: `type` (single or list), `enum`,
//! `const`, `required`, `properties`, `additionalProperties`, `items`,
//! `minItems`, `maxItems`, `minLength`, `maxLength`, `pattern`,
//! `format: "date"`, `minimum`, `maximum`, `exclusiveMinimum`,
//! `exclusiveMaximum`, `allOf`, `anyOf`, `oneOf` and `not`.
//!
//! A schema using any other assertion keyword (`$ref`, `if`, `dependentRequired`,
//! ...) is rejected when loaded, so a payload can never pass on a keyword
//! that was silently skipped.

use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

const BUNDLED_SCHEMA: &str = include_str!("../../schema/extraction_schema.json");

const ASSERTION_KEYWORDS: &[&str] = &[
    "type",
    "enum",
    "const",
    "required",
    "properties",
    "additionalProperties",
    "items",
    "minItems",
    "maxItems",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

const ANNOTATION_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
];

/// Errors from loading a schema or validating against it.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{} schema violation(s): {}", .0.len(), .0.join("; "))]
    Violations(Vec<String>),

    #[error("Invalid schema: {0}")]
    Invalid(String),

    #[error("Failed to read schema {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A parsed JSON schema describing the extraction payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSchema {
    root: Value,
}

impl ExtractionSchema {
    pub fn from_value(root: Value) -> Result<Self, SchemaError> {
        if !root.is_object() {
            return Err(SchemaError::Invalid("schema root must be an object".to_string()));
        }
        check_keywords(&root, "#")?;
        Ok(Self { root })
    }

    pub fn from_str(json: &str) -> Result<Self, SchemaError> {
        let value = serde_json::from_str(json).map_err(|e| SchemaError::Invalid(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    /// Schema shipped with the library.
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_str(BUNDLED_SCHEMA)
    }

    /// Load from `path` if given, else the bundled schema.
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| self.root.to_string())
    }

    /// Validate `instance`, collecting every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaError> {
        let mut violations = Vec::new();
        validate_node(&self.root, instance, "$", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violations(violations))
        }
    }
}

/// Reject schemas that rely on keywords `validate_node` does not evaluate.
fn check_keywords(schema: &Value, path: &str) -> Result<(), SchemaError> {
    let map = match schema {
        Value::Bool(_) => return Ok(()),
        Value::Object(map) => map,
        other => {
            return Err(SchemaError::Invalid(format!(
                "{}: subschema must be an object or boolean, got {}",
                path,
                type_name(other)
            )))
        }
    };

    for (key, value) in map {
        let here = format!("{}/{}", path, key);
        if ANNOTATION_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        if !ASSERTION_KEYWORDS.contains(&key.as_str()) {
            return Err(SchemaError::Invalid(format!(
                "{}: unsupported keyword '{}'",
                path, key
            )));
        }
        match key.as_str() {
            "properties" => {
                let props = value.as_object().ok_or_else(|| {
                    SchemaError::Invalid(format!("{}: must be an object", here))
                })?;
                for (name, child) in props {
                    check_keywords(child, &format!("{}/{}", here, name))?;
                }
            }
            "additionalProperties" | "not" => check_keywords(value, &here)?,
            "items" => {
                if value.is_array() {
                    return Err(SchemaError::Invalid(format!(
                        "{}: tuple form of items is not supported",
                        here
                    )));
                }
                check_keywords(value, &here)?;
            }
            "allOf" | "anyOf" | "oneOf" => match value.as_array() {
                Some(branches) if !branches.is_empty() => {
                    for (index, branch) in branches.iter().enumerate() {
                        check_keywords(branch, &format!("{}/{}", here, index))?;
                    }
                }
                _ => {
                    return Err(SchemaError::Invalid(format!(
                        "{}: must be a non-empty array",
                        here
                    )))
                }
            },
            "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" => {
                if !value.is_number() {
                    return Err(SchemaError::Invalid(format!("{}: must be a number", here)));
                }
            }
            "pattern" => {
                let pattern = value.as_str().ok_or_else(|| {
                    SchemaError::Invalid(format!("{}: must be a string", here))
                })?;
                Regex::new(pattern)
                    .map_err(|e| SchemaError::Invalid(format!("{}: {}", here, e)))?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// True when `instance` satisfies `schema` with no violations.
fn conforms(schema: &Value, instance: &Value, path: &str) -> bool {
    let mut scratch = Vec::new();
    validate_node(schema, instance, path, &mut scratch);
    scratch.is_empty()
}

fn validate_node(schema: &Value, instance: &Value, path: &str, out: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        // `true` accepts anything, `false` nothing.
        if schema == &Value::Bool(false) {
            out.push(format!("{}: not allowed", path));
        }
        return;
    };

    if let Some(expected) = schema.get("type") {
        if !matches_type(expected, instance) {
            out.push(format!(
                "{}: expected type {}, got {}",
                path,
                expected,
                type_name(instance)
            ));
            // Other keywords assume the right type.
            return;
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(instance) {
            out.push(format!("{}: value {} not in enum", path, instance));
        }
    }

    if let Some(expected) = schema.get("const") {
        if expected != instance {
            out.push(format!("{}: expected constant {}, got {}", path, expected, instance));
        }
    }

    if let Some(Value::Array(branches)) = schema.get("allOf") {
        for branch in branches {
            validate_node(branch, instance, path, out);
        }
    }
    if let Some(Value::Array(branches)) = schema.get("anyOf") {
        if !branches.iter().any(|b| conforms(b, instance, path)) {
            out.push(format!("{}: matches none of the anyOf branches", path));
        }
    }
    if let Some(Value::Array(branches)) = schema.get("oneOf") {
        let matched = branches.iter().filter(|b| conforms(b, instance, path)).count();
        if matched != 1 {
            out.push(format!(
                "{}: matches {} oneOf branches, expected exactly 1",
                path, matched
            ));
        }
    }
    if let Some(negated) = schema.get("not") {
        if conforms(negated, instance, path) {
            out.push(format!("{}: must not match the 'not' schema", path));
        }
    }

    match instance {
        Value::Object(map) => validate_object(schema, map, path, out),
        Value::Array(items) => validate_array(schema, items, path, out),
        Value::String(s) => validate_string(schema, s, path, out),
        Value::Number(n) => {
            if let Some(value) = n.as_f64() {
                validate_number(schema, value, path, out);
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

fn validate_object(schema: &Map<String, Value>, map: &Map<String, Value>, path: &str, out: &mut Vec<String>) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                out.push(format!("{}: missing required property '{}'", path, key));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let additional = schema.get("additionalProperties");

    for (key, value) in map {
        let child_path = format!("{}.{}", path, key);
        match properties.and_then(|p| p.get(key)) {
            Some(child_schema) => validate_node(child_schema, value, &child_path, out),
            None => match additional {
                Some(Value::Bool(false)) => {
                    out.push(format!("{}: additional property not allowed", child_path));
                }
                Some(extra @ Value::Object(_)) => validate_node(extra, value, &child_path, out),
                _ => {}
            },
        }
    }
}

fn validate_array(schema: &Map<String, Value>, items: &[Value], path: &str, out: &mut Vec<String>) {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            out.push(format!("{}: expected at least {} items, got {}", path, min, items.len()));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            out.push(format!("{}: expected at most {} items, got {}", path, max, items.len()));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (index, item) in items.iter().enumerate() {
            validate_node(item_schema, item, &format!("{}[{}]", path, index), out);
        }
    }
}

fn validate_string(schema: &Map<String, Value>, s: &str, path: &str, out: &mut Vec<String>) {
    let len = s.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if len < min {
            out.push(format!("{}: shorter than {} characters", path, min));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if len > max {
            out.push(format!("{}: longer than {} characters", path, max));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => {
                out.push(format!("{}: '{}' does not match pattern {}", path, s, pattern));
            }
            Ok(_) => {}
            Err(e) => out.push(format!("{}: invalid pattern {}: {}", path, pattern, e)),
        }
    }
    if schema.get("format").and_then(Value::as_str) == Some("date")
        && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err()
    {
        out.push(format!("{}: '{}' is not a YYYY-MM-DD date", path, s));
    }
}

fn validate_number(schema: &Map<String, Value>, value: f64, path: &str, out: &mut Vec<String>) {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if value < min {
            out.push(format!("{}: {} is below minimum {}", path, value, min));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if value > max {
            out.push(format!("{}: {} is above maximum {}", path, value, max));
        }
    }
    if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
        if value <= min {
            out.push(format!("{}: {} must be greater than {}", path, value, min));
        }
    }
    if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
        if value >= max {
            out.push(format!("{}: {} must be less than {}", path, value, max));
        }
    }
}

fn matches_type(expected: &Value, instance: &Value) -> bool {
    match expected {
        Value::String(name) => matches_type_name(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_type_name(name, instance)),
        _ => true,
    }
}

fn matches_type_name(name: &str, instance: &Value) -> bool {
    match name {
        "null" => instance.is_null(),
        "boolean" => instance.is_boolean(),
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => false,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
