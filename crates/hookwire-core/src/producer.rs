//! Producer definitions
//!
//! A producer is an event source with a typed attribute schema and a
//! receiving endpoint.
//!
//! # Example
//!
//! ```yaml
//! id: signups
//! name: User Signups
//! attributes:
//!   - key: userId
//!     type: int
//!   - key: email
//!     type: string
//!   - key: tags
//!     type: array
//!     defaultValue: []
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declared type of a producer or consumer attribute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Integer-valued number
    Int,
    /// UTF-8 string
    String,
    /// JSON object (never an array or null)
    Object,
    /// JSON array
    Array,
}

impl AttributeType {
    /// Every type in the exposed vocabulary, in display order
    pub const ALL: [AttributeType; 4] = [Self::Int, Self::String, Self::Object, Self::Array];

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Parse a wire name, returning `None` for names outside the vocabulary
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Zero value shown in starter payloads
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Int => Value::from(0),
            Self::String => Value::String(String::new()),
            Self::Object => Value::Object(Default::default()),
            Self::Array => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by producers and consumers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepting and forwarding events
    #[default]
    Active,
    /// Kept but not forwarding
    Inactive,
}

/// One attribute in a producer schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute key, unique within the producer
    pub key: String,

    /// Declared type
    #[serde(rename = "type")]
    pub attr_type: AttributeType,

    /// Value used when a payload omits the attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Attribute {
    /// Create an attribute without a default value
    pub fn new(key: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            key: key.into(),
            attr_type,
            default_value: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A stored producer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    /// Generated identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered attribute schema
    #[serde(default)]
    pub attributes: Vec<Attribute>,

    /// Lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Receiving endpoint path
    pub endpoint: String,
}

impl Producer {
    /// Materialize a producer from a creation request, assigning id and endpoint
    pub fn create(input: NewProducer) -> Self {
        let id = input
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(crate::generate_id);
        Self {
            endpoint: endpoint_for(&id),
            id,
            name: input.name,
            description: input.description,
            attributes: input.attributes,
            status: input.status,
            created_at: Utc::now(),
        }
    }

    /// Replace the editable fields, keeping id, endpoint and creation time
    pub fn apply(&mut self, input: NewProducer) {
        self.name = input.name;
        self.description = input.description;
        self.attributes = input.attributes;
        self.status = input.status;
    }

    /// Look up a schema attribute by key
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// Receiving endpoint path for a producer id
pub fn endpoint_for(id: &str) -> String {
    format!("/api/producers/{id}")
}

/// Producer creation or replacement request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProducer {
    /// Fixed id, used by definition files so consumers can reference it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Ordered attribute schema
    #[serde(default)]
    pub attributes: Vec<Attribute>,

    /// Lifecycle status
    #[serde(default)]
    pub status: Status,
}
