//! Capgate Registry
//!
//! Catalog of MCP capabilities (tools, resource templates, prompts) grouped
//! into toolsets, and the filter pipeline that decides which of them a
//! client may see: toolset selection, read-only mode, feature flags and
//! per-request scoping.
//!
//! A [`Registry`] is immutable once built. Narrowing it for a single request
//! produces a cheap copy sharing the same catalog.

pub mod aliases;
pub mod builder;
pub mod capability;
pub mod error;
pub mod feature;
pub mod registry;
pub mod request;
pub mod selection;
pub mod toolset;
pub mod uri_template;

pub use builder::{Builder, EnableToolsetsOptions};
pub use capability::{
    Capability, CapabilityKind, FeatureGates, Handler, HandlerError, HandlerRef, Prompt, PromptArgument,
    ResourceTemplate, ServerPrompt, ServerResourceTemplate, ServerTool, ToolAnnotations, ToolDefinition,
};
pub use error::RegistryError;
pub use feature::{checker_fn, FeatureChecker, FlagError, RequestContext, StaticFlags};
pub use registry::Registry;
pub use request::{
    KindScope, McpMethod, RequestScope, MCP_METHOD_INITIALIZE, MCP_METHOD_PROMPTS_GET, MCP_METHOD_PROMPTS_LIST,
    MCP_METHOD_RESOURCES_LIST, MCP_METHOD_RESOURCES_READ, MCP_METHOD_RESOURCES_TEMPLATES_LIST,
    MCP_METHOD_TOOLS_CALL, MCP_METHOD_TOOLS_LIST,
};
pub use toolset::{ToolsetId, ToolsetMetadata, TOOLSET_ALL, TOOLSET_DEFAULT};
