//! The `Node` record returned by listing, traversal, and metadata lookups.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// A file or directory entry as seen by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub location: String,
    pub is_directory: bool,
    /// Zero for directories unless a caller has computed a recursive total.
    pub size: u64,
    /// Unix timestamp in milliseconds, if known.
    pub last_modified: Option<i64>,
}

impl Node {
    pub fn new(name: impl Into<String>, location: &Location, is_directory: bool, size: u64) -> Self {
        Self {
            name: name.into(),
            location: location.to_string(),
            is_directory,
            size,
            last_modified: None,
        }
    }
}

/// Node type code used on the create method surface (`0 FILE, 1 DIRECTORY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    File = 0,
    Directory = 1,
}

impl NodeType {
    pub fn is_directory(self) -> bool {
        matches!(self, NodeType::Directory)
    }
}
