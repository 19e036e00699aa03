//! Wire format for programs.
//!
//! A program is a tree of `{"func", "arguments", "children"}` objects. The
//! `arguments` object is operation-specific; a missing or `null` value decodes
//! to the operation's default arguments so that argument schemas can grow
//! new fields without breaking older encodings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    /// Name of the operation to instantiate.
    pub func: String,

    /// Operation-specific arguments.
    #[serde(default)]
    pub arguments: Value,

    /// Child nodes, in order.
    #[serde(default)]
    pub children: Vec<AstNode>,
}

impl AstNode {
    /// Creates a node with empty arguments.
    pub fn new(func: impl Into<String>, children: Vec<AstNode>) -> Self {
        Self {
            func: func.into(),
            arguments: Value::Object(serde_json::Map::new()),
            children,
        }
    }

    /// Sets the node arguments.
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    /// Parses a program from its JSON encoding.
    pub fn from_json(data: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> String {
        // A tree of strings and JSON values always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decodes the arguments into `T`, using `T::default()` when they are
    /// absent or `null`. Unknown fields are ignored.
    pub fn decode_arguments<T>(&self) -> Result<T, CompileError>
    where
        T: DeserializeOwned + Default,
    {
        if self.arguments.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.arguments.clone()).map_err(|source| {
            CompileError::InvalidArguments {
                func: self.func.clone(),
                source,
            }
        })
    }

    /// Fails unless the node has exactly `expected` children.
    pub fn require_children(&self, expected: usize) -> Result<(), CompileError> {
        if self.children.len() == expected {
            Ok(())
        } else {
            Err(CompileError::InvalidNumberOfChildren {
                func: self.func.clone(),
                expected: expected.to_string(),
                found: self.children.len(),
            })
        }
    }

    /// Fails unless the node has at least `min` children.
    pub fn require_at_least_children(&self, min: usize) -> Result<(), CompileError> {
        if self.children.len() >= min {
            Ok(())
        } else {
            Err(CompileError::InvalidNumberOfChildren {
                func: self.func.clone(),
                expected: format!("at least {min}"),
                found: self.children.len(),
            })
        }
    }
}

/// Arguments of operations that take none. Any object (including one with
/// fields added by newer programs) decodes successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
