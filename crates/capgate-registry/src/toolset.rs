//! Toolset Metadata
//!
//! A toolset is a named bucket of capabilities that can be enabled or
//! disabled as a unit. Every capability declaration carries the metadata of
//! the toolset it belongs to.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved toolset keyword that enables every toolset.
pub const TOOLSET_ALL: &str = "all";

/// Reserved toolset keyword that expands to the toolsets marked default.
pub const TOOLSET_DEFAULT: &str = "default";

/// Identifier of a toolset (e.g. `repos`, `issues`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolsetId(String);

impl ToolsetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the `all` and `default` keywords, which never name a real toolset.
    pub fn is_reserved(&self) -> bool {
        is_reserved_keyword(&self.0)
    }
}

pub fn is_reserved_keyword(name: &str) -> bool {
    name == TOOLSET_ALL || name == TOOLSET_DEFAULT
}

impl fmt::Display for ToolsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolsetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ToolsetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ToolsetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ToolsetId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ToolsetId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Describes a toolset: identifier, human description, default flag and icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsetMetadata {
    pub id: ToolsetId,
    pub description: String,
    /// Enabled when no explicit toolset list is configured, and by the `default` keyword.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
    /// Octicon name; resolving it to image data is left to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ToolsetMetadata {
    pub fn new(id: impl Into<ToolsetId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            default: false,
            icon: None,
        }
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        let icon = icon.into();
        self.icon = if icon.is_empty() { None } else { Some(icon) };
        self
    }
}
