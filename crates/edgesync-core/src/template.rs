//! Template instantiation
//!
//! A settings template is shared by every domain. Instantiating it for one
//! domain serializes the template to JSON text, replaces every occurrence of
//! the placeholder token with the domain name, and parses the result back.
//!
//! Replacement is a plain global substring replace over the serialized
//! text. It reaches every string in the document, including rule
//! expressions, URLs and route patterns, and also object keys.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Placeholder token used when the configuration does not name one
pub const DEFAULT_PLACEHOLDER: &str = "{{domain}}";

/// A concrete, per-domain settings document
///
/// Keys keep the order in which they were authored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    /// Wrap an already-built settings map
    pub fn new(settings: Map<String, Value>) -> Self {
        Self(settings)
    }

    /// Iterate over `(key, value)` pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Look up one setting
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of top-level settings
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document has no settings
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for SettingsDocument {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::template(format!(
                "settings must be an object, got {}",
                json_type(&other)
            ))),
        }
    }
}

/// A settings template with a domain placeholder
#[derive(Debug, Clone)]
pub struct Template {
    body: Value,
    placeholder: String,
}

impl Template {
    /// Create a template using [`DEFAULT_PLACEHOLDER`]
    pub fn new(body: Value) -> Self {
        Self::with_placeholder(body, DEFAULT_PLACEHOLDER)
    }

    /// Create a template with a custom placeholder token
    pub fn with_placeholder(body: Value, placeholder: impl Into<String>) -> Self {
        Self {
            body,
            placeholder: placeholder.into(),
        }
    }

    /// Placeholder token replaced on instantiation
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Produce the settings document for `domain`
    pub fn instantiate(&self, domain: &str) -> Result<SettingsDocument> {
        instantiate(&self.body, &self.placeholder, domain)
    }
}

/// Replace every occurrence of `placeholder` in `template` with `domain`
///
/// # Errors
///
/// - The placeholder is empty, or contains characters JSON escapes
/// - The substituted text is no longer valid JSON (the domain contains
///   characters that need escaping)
/// - The result is not an object
pub fn instantiate(template: &Value, placeholder: &str, domain: &str) -> Result<SettingsDocument> {
    if placeholder.is_empty() {
        return Err(Error::template("placeholder token cannot be empty"));
    }

    if !is_plain_placeholder(placeholder) {
        return Err(Error::template(format!(
            "placeholder {:?} would never match the serialized template",
            placeholder
        )));
    }

    let text = serde_json::to_string(template)?;
    let substituted = text.replace(placeholder, domain);

    let value: Value = serde_json::from_str(&substituted).map_err(|e| {
        Error::template(format!(
            "template is not valid JSON after substituting {}: {}",
            domain, e
        ))
    })?;

    SettingsDocument::try_from(value)
}

/// Whether `placeholder` serializes to itself inside a JSON string
///
/// Substitution runs over serialized text, so a token containing a quote,
/// a backslash or a control character is escaped there and never matches.
pub fn is_plain_placeholder(placeholder: &str) -> bool {
    !placeholder
        .chars()
        .any(|c| c == '"' || c == '\\' || c.is_control())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
