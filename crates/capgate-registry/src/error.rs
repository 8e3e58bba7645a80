//! Registry Errors
//!
//! Configuration-time and lookup errors raised by the registry. Feature-flag
//! checker failures never surface here; the filter pipeline absorbs them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A toolset was explicitly requested but no capability in the catalog belongs to it.
    #[error("toolset {0} does not exist")]
    ToolsetDoesNotExist(String),

    #[error("tool {0} does not exist")]
    ToolNotFound(String),

    #[error("resource template {0} does not exist")]
    ResourceTemplateNotFound(String),

    #[error("prompt {0} does not exist")]
    PromptNotFound(String),

    /// A tool was registered through a path that contradicts its read-only annotation.
    #[error("{}", misdeclared_message(.name, .expected_read_only))]
    MisdeclaredTool { name: String, expected_read_only: bool },
}

impl RegistryError {
    /// True for the capability-not-found family, which request handlers translate
    /// into a protocol-level "unknown" reply.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_) | Self::ResourceTemplateNotFound(_) | Self::PromptNotFound(_)
        )
    }
}

fn misdeclared_message(name: &str, expected_read_only: &bool) -> String {
    if *expected_read_only {
        format!("tool ({}) must be annotated as read-only", name)
    } else {
        format!("tool ({}) is incorrectly annotated as read-only", name)
    }
}
