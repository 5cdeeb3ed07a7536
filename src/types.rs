//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Document operations a token can be granted per collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    List,
    Replace,
    Patch,
    Delete,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::List,
        Action::Replace,
        Action::Patch,
        Action::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::List => "list",
            Action::Replace => "replace",
            Action::Patch => "patch",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named secret. Collections reference the name, callers present the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub name: String,
    pub token: String,
}

/// Per-action token-name lists for one collection. `all` applies to every action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAuth {
    #[serde(default)]
    pub all: Vec<String>,
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub replace: Vec<String>,
    #[serde(default)]
    pub patch: Vec<String>,
    #[serde(default)]
    pub delete: Vec<String>,
}

impl CollectionAuth {
    /// Token names listed for a specific action, excluding the `all` baseline
    pub fn names_for(&self, action: Action) -> &[String] {
        match action {
            Action::Create => &self.create,
            Action::Read => &self.read,
            Action::List => &self.list,
            Action::Replace => &self.replace,
            Action::Patch => &self.patch,
            Action::Delete => &self.delete,
        }
    }
}

/// A named, schema-bound, access-controlled set of documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub auth: CollectionAuth,
    pub schema: Map<String, Value>,
}
