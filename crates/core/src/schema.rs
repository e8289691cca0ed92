//! Declarative parameter schemas and strict argument validation.
//!
//! A [`ParameterSchema`] serializes to the JSON Schema subset that model APIs
//! accept for tool parameters. [`ParameterSchema::validate`] checks a JSON value
//! against it without coercing anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type tag of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a tool's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParameterSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn new(kind: SchemaType) -> Self {
        Self {
            kind,
            description: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            items: None,
            default: None,
        }
    }

    pub fn object() -> Self {
        Self::new(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::new(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::new(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn array(items: ParameterSchema) -> Self {
        let mut schema = Self::new(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an optional property to an object schema.
    pub fn property(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Add a property and mark it required.
    pub fn required_property(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// JSON Schema form, as sent to the model.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validate `value` against this schema.
    ///
    /// Returns every violation found. An empty list means the value is valid.
    pub fn validate(&self, value: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        self.validate_at(value, "", &mut errors);
        errors
    }

    fn validate_at(&self, value: &Value, path: &str, errors: &mut Vec<String>) {
        let label = if path.is_empty() { "parameter" } else { path };

        if !self.kind.matches(value) {
            errors.push(format!("{label} should be {}", self.kind));
            return;
        }

        if let Some(allowed) = &self.enum_values
            && !allowed.contains(value)
        {
            let rendered = serde_json::to_string(allowed).unwrap_or_default();
            errors.push(format!("{label} must be one of {rendered}"));
        }

        match self.kind {
            SchemaType::Integer | SchemaType::Number => {
                if let Some(n) = value.as_f64() {
                    if let Some(min) = self.minimum
                        && n < min
                    {
                        errors.push(format!("{label} must be >= {min}"));
                    }
                    if let Some(max) = self.maximum
                        && n > max
                    {
                        errors.push(format!("{label} must be <= {max}"));
                    }
                }
            }
            SchemaType::String => {
                let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0);
                if let Some(min) = self.min_length
                    && len < min
                {
                    errors.push(format!("{label} must be at least {min} chars"));
                }
                if let Some(max) = self.max_length
                    && len > max
                {
                    errors.push(format!("{label} must be at most {max} chars"));
                }
            }
            SchemaType::Object => {
                let Some(map) = value.as_object() else { return };
                for key in &self.required {
                    if !map.contains_key(key) {
                        errors.push(format!("missing required {}", join_path(path, key)));
                    }
                }
                for (key, item) in map {
                    if let Some(prop) = self.properties.get(key) {
                        prop.validate_at(item, &join_path(path, key), errors);
                    }
                }
            }
            SchemaType::Array => {
                if let (Some(items), Some(elements)) = (&self.items, value.as_array()) {
                    for (i, element) in elements.iter().enumerate() {
                        items.validate_at(element, &format!("{path}[{i}]"), errors);
                    }
                }
            }
            SchemaType::Boolean => {}
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
