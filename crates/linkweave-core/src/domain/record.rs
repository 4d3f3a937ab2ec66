//! Records and the values they carry.
//!
//! Only two value kinds matter to the engine: direct references and
//! embedded (rich-text) references. Everything else is carried through
//! untouched as [`ValueKind::Other`].

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::iri_resolver::IriResolver;

lazy_static! {
    // Placeholder for a reference inside rich text: IRI:<id>:IRI
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"IRI:(.+?):IRI").unwrap();
}

/// Value object: user-supplied record identifier, unique within a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub String);

/// Value object: identifier assigned by the remote repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerIri(pub String);

/// Value object: stable token that locates a value independent of its content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub String);

macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            /// Borrow the inner string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(LocalId);
string_newtype!(ServerIri);
string_newtype!(ValueId);

/// True if the reference already names a server resource and needs no resolution
pub fn is_absolute_iri(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Payload of a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    /// Refers to exactly one other record
    DirectReference {
        /// Local id of the target, or an absolute IRI
        target: String,
    },

    /// Rich text with zero or more `IRI:<id>:IRI` placeholders
    EmbeddedReference {
        /// The text, placeholders included
        text: String,
    },

    /// Any other payload; irrelevant to dependency resolution
    Other {
        /// Opaque payload passed through to the wire
        payload: serde_json::Value,
    },
}

/// A single value of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Stable identifier used to re-locate the value for patching
    pub id: ValueId,

    /// Property the value belongs to
    pub property: String,

    /// Payload
    pub kind: ValueKind,
}

impl Value {
    /// Create a direct reference value
    pub fn direct(id: impl Into<ValueId>, property: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
            kind: ValueKind::DirectReference { target: target.into() },
        }
    }

    /// Create an embedded reference (rich text) value
    pub fn embedded(id: impl Into<ValueId>, property: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
            kind: ValueKind::EmbeddedReference { text: text.into() },
        }
    }

    /// Create a value that does not take part in dependency resolution
    pub fn other(id: impl Into<ValueId>, property: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
            kind: ValueKind::Other { payload },
        }
    }

    /// Local ids this value refers to, distinct, in first-seen order.
    ///
    /// Absolute IRIs are skipped; they need no resolution.
    pub fn referenced_ids(&self) -> Vec<LocalId> {
        match &self.kind {
            ValueKind::DirectReference { target } if !is_absolute_iri(target) => {
                vec![LocalId(target.clone())]
            }
            ValueKind::EmbeddedReference { text } => {
                let mut seen = HashSet::new();
                PLACEHOLDER_REGEX
                    .captures_iter(text)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .filter(|id| !is_absolute_iri(id))
                    .filter(|id| seen.insert(id.to_string()))
                    .map(|id| LocalId(id.to_string()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Replace every local id with its server IRI.
    ///
    /// Returns the ids that have no IRI yet if any are missing.
    pub fn resolved(&self, resolver: &IriResolver) -> Result<Value, Vec<LocalId>> {
        let missing: Vec<LocalId> = self
            .referenced_ids()
            .into_iter()
            .filter(|id| !resolver.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let kind = match &self.kind {
            ValueKind::DirectReference { target } => match resolver.get(&LocalId(target.clone())) {
                Some(iri) => ValueKind::DirectReference { target: iri.0.clone() },
                None => self.kind.clone(),
            },
            ValueKind::EmbeddedReference { text } => {
                let replaced = PLACEHOLDER_REGEX.replace_all(text, |caps: &Captures<'_>| {
                    let id = &caps[1];
                    match resolver.get(&LocalId(id.to_string())) {
                        Some(iri) => format!("IRI:{}:IRI", iri),
                        None => caps[0].to_string(),
                    }
                });
                ValueKind::EmbeddedReference { text: replaced.into_owned() }
            }
            ValueKind::Other { .. } => self.kind.clone(),
        };

        Ok(Value {
            id: self.id.clone(),
            property: self.property.clone(),
            kind,
        })
    }
}

/// A unit to be created on the remote repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier within the batch
    pub local_id: LocalId,

    /// Human readable label
    pub label: String,

    /// Class of the record on the remote repository
    pub class: String,

    /// Values, in input order
    pub values: Vec<Value>,
}

impl Record {
    /// Create a record without values
    pub fn new(local_id: impl Into<LocalId>, label: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            label: label.into(),
            class: class.into(),
            values: Vec::new(),
        }
    }

    /// Builder-style value append
    pub fn with_value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    /// Split off the values whose ids are in `ids`.
    ///
    /// Returns the record without them and the removed values in their original order.
    pub fn without_values(&self, ids: &HashSet<ValueId>) -> (Record, Vec<Value>) {
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            self.values.iter().cloned().partition(|v| ids.contains(&v.id));
        (
            Record {
                local_id: self.local_id.clone(),
                label: self.label.clone(),
                class: self.class.clone(),
                values: kept,
            },
            removed,
        )
    }

    /// Human readable designation used in progress events
    pub fn designation(&self) -> String {
        format!("'{}' (ID: '{}')", self.label, self.local_id)
    }
}
