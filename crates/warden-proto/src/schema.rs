//! Payload schema compiler and validator.
//!
//! Message payloads are declared with a subset of JSON Schema
//! draft-07 and compiled eagerly when the catalog is built, so a
//! malformed declaration fails at startup rather than on first use.
//! Validation runs on every send and every receive.
//!
//! # Supported Keywords
//!
//! | Keyword | Notes |
//! |---------|-------|
//! | `type` | Single name or array of names |
//! | `enum` | Deep equality against listed values |
//! | `const` | Deep equality against one value |
//! | `properties` | Per-property subschemas |
//! | `required` | Property names that must be present |
//! | `additionalProperties` | `false` or a subschema |
//! | `items` | Single subschema or tuple form |
//! | `additionalItems` | `false` or a subschema, tuple form only |
//! | `anyOf` | Union of subschemas |
//!
//! Any other keyword is a compile error. Keywords compose as in
//! draft-07: each applies only to values of its relevant type, and a
//! value must satisfy all of them.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_proto::schema;
//!
//! let compiled = schema::compile(&json!({
//!     "type": "object",
//!     "properties": {
//!         "instance_id": { "type": "integer" },
//!         "save": { "type": ["string", "null"] },
//!     },
//!     "required": ["instance_id"],
//!     "additionalProperties": false,
//! })).unwrap();
//!
//! assert!(compiled.validate(&json!({"instance_id": 7})).is_ok());
//!
//! let violations = compiled
//!     .validate(&json!({"save": "world.zip"}))
//!     .unwrap_err();
//! assert_eq!(violations[0].path, "/instance_id");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use warden_types::ErrorCode;

/// Error compiling a schema declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaBuildError {
    /// The declaration used a keyword outside the supported subset.
    #[error("unsupported keyword '{keyword}' at {path}")]
    UnsupportedKeyword {
        /// Location of the offending keyword within the declaration.
        path: String,
        /// The keyword itself.
        keyword: String,
    },

    /// A keyword had a value of the wrong shape.
    #[error("invalid '{keyword}' at {path}: {reason}")]
    InvalidKeyword {
        /// Location of the offending keyword within the declaration.
        path: String,
        /// The keyword itself.
        keyword: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A schema position held something other than an object.
    #[error("expected schema object at {path}")]
    NotASchema {
        /// Location within the declaration.
        path: String,
    },
}

impl ErrorCode for SchemaBuildError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedKeyword { .. } => "SCHEMA_UNSUPPORTED_KEYWORD",
            Self::InvalidKeyword { .. } => "SCHEMA_INVALID_KEYWORD",
            Self::NotASchema { .. } => "SCHEMA_NOT_A_SCHEMA",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Compile errors are declaration bugs
        false
    }
}

/// One structural violation found during validation.
///
/// `path` is a JSON-pointer-style location into the offending value;
/// the root is `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Location of the offending value.
    pub path: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// The JSON types a `type` keyword may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeName {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl TypeName {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => match value.as_f64() {
                Some(n) => n.fract() == 0.0,
                None => false,
            },
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

/// Either `false` (forbid) or a subschema, as used by
/// `additionalProperties` and `additionalItems`.
#[derive(Debug, Clone)]
enum Additional {
    Allowed,
    Forbidden,
    Schema(Box<Node>),
}

#[derive(Debug, Clone)]
enum Items {
    Single(Box<Node>),
    Tuple(Vec<Node>),
}

/// One compiled schema object: the conjunction of its keywords.
#[derive(Debug, Clone, Default)]
struct Node {
    types: Option<Vec<TypeName>>,
    enum_values: Option<Vec<Value>>,
    const_value: Option<Value>,
    properties: Option<Vec<(String, Node)>>,
    required: Option<Vec<String>>,
    additional_properties: Option<Additional>,
    items: Option<Items>,
    additional_items: Option<Additional>,
    any_of: Option<Vec<Node>>,
}

/// A compiled, immutable payload schema.
///
/// Produced by [`compile`]; cheap to share and to run repeatedly.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: Node,
}

/// Compiles a declarative schema into a [`CompiledSchema`].
///
/// # Errors
///
/// Returns [`SchemaBuildError`] when the declaration is not an
/// object, uses a keyword outside the supported subset, or gives a
/// keyword a malformed value.
pub fn compile(declaration: &Value) -> Result<CompiledSchema, SchemaBuildError> {
    let root = compile_node(declaration, "/")?;
    Ok(CompiledSchema { root })
}

impl CompiledSchema {
    /// Validates a value, returning every structural violation found.
    ///
    /// # Errors
    ///
    /// Returns the non-empty violation list when the value does not
    /// match.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();
        validate_node(&self.root, value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Returns `true` if the value matches.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Returns the root object's `required` list, in declaration
    /// order. Empty when the root declares none.
    #[must_use]
    pub fn required(&self) -> &[String] {
        self.root.required.as_deref().unwrap_or(&[])
    }

    /// Synthesizes a minimal value accepted by this schema: required
    /// properties only, each filled with the simplest value of its
    /// declared type. Useful for tests and tooling.
    #[must_use]
    pub fn sample(&self) -> Value {
        sample_node(&self.root)
    }
}

fn sample_node(node: &Node) -> Value {
    if let Some(value) = &node.const_value {
        return value.clone();
    }
    if let Some(values) = &node.enum_values {
        return values[0].clone();
    }
    if let Some(arms) = &node.any_of {
        return sample_node(&arms[0]);
    }

    let first_type = node.types.as_ref().and_then(|t| t.first().copied());
    match first_type {
        Some(TypeName::Object) | None => {
            let mut object = Map::new();
            let declared = node.properties.as_deref().unwrap_or(&[]);
            for name in node.required.as_deref().unwrap_or(&[]) {
                let value = declared
                    .iter()
                    .find(|(declared_name, _)| declared_name == name)
                    .map(|(_, sub)| sample_node(sub))
                    .unwrap_or(Value::Null);
                object.insert(name.clone(), value);
            }
            Value::Object(object)
        }
        Some(TypeName::Array) => match &node.items {
            Some(Items::Tuple(subs)) => Value::Array(subs.iter().map(sample_node).collect()),
            _ => Value::Array(Vec::new()),
        },
        Some(TypeName::String) => Value::String(String::new()),
        Some(TypeName::Integer) | Some(TypeName::Number) => Value::from(0),
        Some(TypeName::Boolean) => Value::Bool(false),
        Some(TypeName::Null) => Value::Null,
    }
}

fn join(path: &str, keyword: &str) -> String {
    if path == "/" {
        format!("/{keyword}")
    } else {
        format!("{path}/{keyword}")
    }
}

fn expect_schema_object<'v>(
    value: &'v Value,
    path: &str,
) -> Result<&'v Map<String, Value>, SchemaBuildError> {
    value.as_object().ok_or_else(|| SchemaBuildError::NotASchema {
        path: path.to_string(),
    })
}

fn compile_node(declaration: &Value, path: &str) -> Result<Node, SchemaBuildError> {
    let object = expect_schema_object(declaration, path)?;
    let mut node = Node::default();

    for (keyword, value) in object {
        match keyword.as_str() {
            "type" => node.types = Some(compile_types(value, path)?),
            "enum" => {
                let values = value.as_array().ok_or_else(|| invalid(path, "enum", "expected an array"))?;
                if values.is_empty() {
                    return Err(invalid(path, "enum", "must not be empty"));
                }
                node.enum_values = Some(values.clone());
            }
            "const" => node.const_value = Some(value.clone()),
            "properties" => {
                let map = value
                    .as_object()
                    .ok_or_else(|| invalid(path, "properties", "expected an object"))?;
                let mut compiled = Vec::with_capacity(map.len());
                for (name, sub) in map {
                    let sub_path = join(&join(path, "properties"), name);
                    compiled.push((name.clone(), compile_node(sub, &sub_path)?));
                }
                node.properties = Some(compiled);
            }
            "required" => {
                let names = value
                    .as_array()
                    .ok_or_else(|| invalid(path, "required", "expected an array"))?;
                let mut required = Vec::with_capacity(names.len());
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(path, "required", "entries must be strings"))?;
                    required.push(name.to_string());
                }
                node.required = Some(required);
            }
            "additionalProperties" => {
                node.additional_properties =
                    Some(compile_additional(value, &join(path, "additionalProperties"))?);
            }
            "items" => {
                node.items = Some(match value {
                    Value::Array(subs) => {
                        let mut compiled = Vec::with_capacity(subs.len());
                        for (index, sub) in subs.iter().enumerate() {
                            let sub_path = join(&join(path, "items"), &index.to_string());
                            compiled.push(compile_node(sub, &sub_path)?);
                        }
                        Items::Tuple(compiled)
                    }
                    other => Items::Single(Box::new(compile_node(other, &join(path, "items"))?)),
                });
            }
            "additionalItems" => {
                node.additional_items =
                    Some(compile_additional(value, &join(path, "additionalItems"))?);
            }
            "anyOf" => {
                let subs = value
                    .as_array()
                    .ok_or_else(|| invalid(path, "anyOf", "expected an array"))?;
                if subs.is_empty() {
                    return Err(invalid(path, "anyOf", "must not be empty"));
                }
                let mut compiled = Vec::with_capacity(subs.len());
                for (index, sub) in subs.iter().enumerate() {
                    let sub_path = join(&join(path, "anyOf"), &index.to_string());
                    compiled.push(compile_node(sub, &sub_path)?);
                }
                node.any_of = Some(compiled);
            }
            other => {
                return Err(SchemaBuildError::UnsupportedKeyword {
                    path: path.to_string(),
                    keyword: other.to_string(),
                });
            }
        }
    }

    Ok(node)
}

fn compile_types(value: &Value, path: &str) -> Result<Vec<TypeName>, SchemaBuildError> {
    let parse_one = |name: &Value| -> Result<TypeName, SchemaBuildError> {
        let name = name
            .as_str()
            .ok_or_else(|| invalid(path, "type", "type names must be strings"))?;
        TypeName::parse(name).ok_or_else(|| invalid(path, "type", &format!("unknown type '{name}'")))
    };
    match value {
        Value::Array(names) => {
            if names.is_empty() {
                return Err(invalid(path, "type", "must not be empty"));
            }
            names.iter().map(parse_one).collect()
        }
        other => Ok(vec![parse_one(other)?]),
    }
}

fn compile_additional(value: &Value, path: &str) -> Result<Additional, SchemaBuildError> {
    match value {
        Value::Bool(true) => Ok(Additional::Allowed),
        Value::Bool(false) => Ok(Additional::Forbidden),
        other => Ok(Additional::Schema(Box::new(compile_node(other, path)?))),
    }
}

fn invalid(path: &str, keyword: &str, reason: &str) -> SchemaBuildError {
    SchemaBuildError::InvalidKeyword {
        path: path.to_string(),
        keyword: keyword.to_string(),
        reason: reason.to_string(),
    }
}

fn instance_path(parent: &str, segment: &str) -> String {
    format!("{parent}/{segment}")
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn push(violations: &mut Vec<SchemaViolation>, path: &str, reason: String) {
    violations.push(SchemaViolation {
        path: display_path(path),
        reason,
    });
}

fn validate_node(node: &Node, value: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    if let Some(types) = &node.types {
        if !types.iter().any(|t| t.matches(value)) {
            let expected: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            push(
                violations,
                path,
                format!("expected type {}", expected.join(" or ")),
            );
            // Structural keywords below assume the right type
            return;
        }
    }

    if let Some(allowed) = &node.enum_values {
        if !allowed.contains(value) {
            push(violations, path, "not one of the allowed values".to_string());
        }
    }

    if let Some(expected) = &node.const_value {
        if value != expected {
            push(violations, path, format!("expected constant {expected}"));
        }
    }

    if let Some(any_of) = &node.any_of {
        let matched = any_of.iter().any(|arm| {
            let mut arm_violations = Vec::new();
            validate_node(arm, value, path, &mut arm_violations);
            arm_violations.is_empty()
        });
        if !matched {
            push(violations, path, "does not match any allowed variant".to_string());
        }
    }

    if let Value::Object(object) = value {
        if let Some(required) = &node.required {
            for name in required {
                if !object.contains_key(name) {
                    push(
                        violations,
                        &instance_path(path, name),
                        "required property is missing".to_string(),
                    );
                }
            }
        }

        let declared = node.properties.as_deref().unwrap_or(&[]);
        for (name, sub) in declared {
            if let Some(present) = object.get(name) {
                validate_node(sub, present, &instance_path(path, name), violations);
            }
        }

        if let Some(additional) = &node.additional_properties {
            for (name, present) in object {
                if declared.iter().any(|(declared_name, _)| declared_name == name) {
                    continue;
                }
                match additional {
                    Additional::Allowed => {}
                    Additional::Forbidden => push(
                        violations,
                        &instance_path(path, name),
                        "unexpected property".to_string(),
                    ),
                    Additional::Schema(sub) => {
                        validate_node(sub, present, &instance_path(path, name), violations);
                    }
                }
            }
        }
    }

    if let (Value::Array(elements), Some(items)) = (value, &node.items) {
        match items {
            Items::Single(sub) => {
                for (index, element) in elements.iter().enumerate() {
                    validate_node(sub, element, &instance_path(path, &index.to_string()), violations);
                }
            }
            Items::Tuple(subs) => {
                for (index, element) in elements.iter().enumerate() {
                    let element_path = instance_path(path, &index.to_string());
                    match subs.get(index) {
                        Some(sub) => validate_node(sub, element, &element_path, violations),
                        None => match node.additional_items.as_ref().unwrap_or(&Additional::Allowed) {
                            Additional::Allowed => {}
                            Additional::Forbidden => {
                                push(violations, &element_path, "unexpected array element".to_string());
                            }
                            Additional::Schema(sub) => {
                                validate_node(sub, element, &element_path, violations);
                            }
                        },
                    }
                }
            }
        }
    }
}
