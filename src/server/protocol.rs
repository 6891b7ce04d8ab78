//! Wire protocol between CLI invocations and a display instance
//!
//! One JSON record per connection, tagged by `cmd`. The sender writes the
//! record and closes; there is no reply.

use serde::{Deserialize, Serialize};

use crate::model::ContentEntry;

/// Largest record a display instance will read from one connection
pub const MAX_COMMAND_BYTES: usize = 64 * 1024 * 1024;

/// Command sent to a display instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Add an entry to a grouping instance
    #[serde(rename = "add-file")]
    AddEntry { entry: ContentEntry },
    /// Replace the content backed by `path` in a named instance
    #[serde(rename = "replace")]
    ReplaceEntry {
        path: String,
        content: String,
        #[serde(default)]
        name: String,
    },
}

impl Command {
    pub fn add(entry: ContentEntry) -> Self {
        Self::AddEntry { entry }
    }

    /// Build a replace command carrying all of `entry`'s fields
    pub fn replace(entry: ContentEntry) -> Self {
        Self::ReplaceEntry {
            path: entry.path,
            content: entry.content,
            name: entry.name,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddEntry { .. } => "add-file",
            Self::ReplaceEntry { .. } => "replace",
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode one record. Unknown tags and missing payload fields are errors.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
