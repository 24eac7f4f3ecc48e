//! Domain types for the to-do service.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! Field names follow the wire contract (`item` for the text, `done` for the
//! completion flag); Rust-side names say what the field holds. Integration
//! tests catch any schema drift between the two crates.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

/// Service-assigned item identifier.
///
/// Opaque to the client: it is compared, displayed and placed in request
/// paths, never interpreted. The reference service hands out integer ids,
/// so both JSON strings and JSON integers are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ItemId(s),
            Raw::Unsigned(n) => ItemId(n.to_string()),
            Raw::Signed(n) => ItemId(n.to_string()),
        })
    }
}

/// A single to-do entry as confirmed by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "item")]
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// Request payload for creating a new item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItem {
    pub item: String,
}

/// Client-side listing predicate. Never persisted remotely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Done,
    NotDone,
}

impl Filter {
    /// The `done` value the service filters on, or `None` for the
    /// unfiltered listing.
    pub fn done_flag(self) -> Option<bool> {
        match self {
            Filter::All => None,
            Filter::Done => Some(true),
            Filter::NotDone => Some(false),
        }
    }

    pub fn matches(self, item: &Item) -> bool {
        match self.done_flag() {
            Some(done) => item.done == done,
            None => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Done => "done",
            Filter::NotDone => "notdone",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a filter token is not one of `all`, `done`, `notdone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter: {0:?}")]
pub struct ParseFilterError(pub String);

impl FromStr for Filter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "done" => Ok(Filter::Done),
            "notdone" | "not-done" | "not_done" => Ok(Filter::NotDone),
            _ => Err(ParseFilterError(s.to_string())),
        }
    }
}

/// Immutable view of the store handed to UI collaborators.
///
/// `items` and `filter` always come from the same commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub items: Arc<[Item]>,
    pub filter: Filter,
}

impl Snapshot {
    pub fn find(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            filter: Filter::All,
        }
    }
}
