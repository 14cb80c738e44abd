//! Value schemas
//!
//! Each key is declared with a [`Schema`] tag when the store is built, either
//! exactly (`current_user`) or as a family (`requests` covers `requests` and
//! `requests_42`). Validation dispatches on the tag and only checks structure:
//! the right shape, and the required fields present.

use std::collections::HashMap;

use serde_json::Value;

/// Declared shape of a stored value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Anything except `null`
    Any,

    /// An object carrying every required field
    Object { required: Vec<String> },

    /// An array whose elements are objects carrying every required field
    ListOf { required: Vec<String> },

    /// An object whose values are objects carrying every required field
    MapOf { required: Vec<String> },
}

impl Schema {
    /// A user record: identity and contact
    pub fn user() -> Self {
        Schema::Object {
            required: fields(&["id", "email"]),
        }
    }

    /// A list of service requests: identity and owner reference
    pub fn requests() -> Self {
        Schema::ListOf {
            required: fields(&["id", "userId"]),
        }
    }

    /// A list of vehicles: identity and plate
    pub fn vehicles() -> Self {
        Schema::ListOf {
            required: fields(&["id", "licensePlate"]),
        }
    }

    /// Check `value` against this schema, describing the first violation
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            return Err("value is null".to_string());
        }

        match self {
            Schema::Any => Ok(()),
            Schema::Object { required } => check_fields(value, required, "value"),
            Schema::ListOf { required } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("expected an array, found {}", kind(value)))?;
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| check_fields(item, required, &format!("element {}", i)))
            }
            Schema::MapOf { required } => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| format!("expected an object, found {}", kind(value)))?;
                entries
                    .iter()
                    .try_for_each(|(k, item)| check_fields(item, required, &format!("entry '{}'", k)))
            }
        }
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn check_fields(value: &Value, required: &[String], what: &str) -> std::result::Result<(), String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("{} is {}, expected an object", what, kind(value)))?;

    match required.iter().find(|field| !present(object.get(field.as_str()))) {
        Some(missing) => Err(format!("{} is missing '{}'", what, missing)),
        None => Ok(()),
    }
}

/// A field counts as present when it is set to something other than
/// `null`, `false` or the empty string
fn present(field: Option<&Value>) -> bool {
    match field {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

static ANY: Schema = Schema::Any;

/// Key → schema declarations
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    exact: HashMap<String, Schema>,
    /// (family, schema), longest family first
    families: Vec<(String, Schema)>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the schema of one exact key
    pub fn register(&mut self, key: impl Into<String>, schema: Schema) {
        self.exact.insert(key.into(), schema);
    }

    /// Declare the schema of a family: `family` itself and `family_*`
    pub fn register_family(&mut self, family: impl Into<String>, schema: Schema) {
        let family = family.into();
        self.families.retain(|(f, _)| *f != family);
        self.families.push((family, schema));
        self.families.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Schema declared for `key`, `Schema::Any` if none
    pub fn schema_for(&self, key: &str) -> &Schema {
        if let Some(schema) = self.exact.get(key) {
            return schema;
        }
        self.families
            .iter()
            .find(|(family, _)| {
                key == family
                    || key
                        .strip_prefix(family.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|(_, schema)| schema)
            .unwrap_or(&ANY)
    }

    /// Validate `value` against the schema declared for `key`
    pub fn validate(&self, key: &str, value: &Value) -> std::result::Result<(), String> {
        self.schema_for(key).check(value)
    }
}
