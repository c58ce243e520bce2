//! Schema-version tag and forward-compatibility adapter, grounded on the
//! teacher's `SchemaAdapter<T>` pattern: new wire shapes arrive as a new
//! `SchemaVersion` variant plus an adapter converting to/from the current
//! canonical type, rather than a second parallel struct hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[default]
    #[serde(rename = "v1")]
    V1,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::V1 => write!(f, "v1"),
        }
    }
}

/// Converts a wire representation to/from the canonical in-process type
/// `T`. Each new `SchemaVersion` gets one adapter; `DomainEvent` itself
/// never grows version-conditional fields.
pub trait SchemaAdapter<T> {
    fn from_canonical(value: &T) -> Self;
    fn into_canonical(self) -> T;
}
