//! Capability Declarations
//!
//! Inert descriptions of the tools, resource templates and prompts a server
//! can expose. Declarations are produced once at start-up and never mutated;
//! the registry only reads them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::RequestContext;
use crate::toolset::{ToolsetId, ToolsetMetadata};

/// Error type returned by capability handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Backs a capability at call time. The registry never invokes handlers; it
/// only records whether one is present.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, params: Value) -> Result<Value, HandlerError>;
}

/// Shared, cheaply cloneable handler reference.
#[derive(Clone)]
pub struct HandlerRef(Arc<dyn Handler>);

impl HandlerRef {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self(Arc::new(handler))
    }

    pub async fn handle(&self, ctx: &RequestContext, params: Value) -> Result<Value, HandlerError> {
        self.0.handle(ctx, params).await
    }
}

impl From<Arc<dyn Handler>> for HandlerRef {
    fn from(handler: Arc<dyn Handler>) -> Self {
        Self(handler)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerRef(..)")
    }
}

/// The three capability variants. Names are unique within a variant only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Tool,
    ResourceTemplate,
    Prompt,
}

/// Common view over the capability variants used by the filter pipeline.
pub trait Capability {
    const KIND: CapabilityKind;

    /// Name used for scoping: the tool or prompt name, or a template's URI template.
    fn scope_key(&self) -> &str;
    fn name(&self) -> &str;
    fn toolset(&self) -> &ToolsetMetadata;
    fn feature_flag_enable(&self) -> Option<&str>;
    fn feature_flag_disable(&self) -> Option<&str>;
    fn has_handler(&self) -> bool;

    /// Only tools can mutate; everything else passes the read-only filter.
    fn is_mutating(&self) -> bool {
        false
    }

    fn toolset_id(&self) -> &ToolsetId {
        &self.toolset().id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// Wire shape of a tool as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_object_schema(),
            annotations: None,
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_read_only_hint(mut self, read_only: bool) -> Self {
        self.annotations.get_or_insert_with(ToolAnnotations::default).read_only_hint = Some(read_only);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.annotations
            .as_ref()
            .and_then(|a| a.read_only_hint)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub name: String,
    pub uri_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceTemplate {
    /// True when `uri` is this template verbatim or one of its expansions.
    pub fn matches(&self, uri: &str) -> bool {
        crate::uri_template::matches(&self.uri_template, uri)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// Feature-flag gates shared by every capability variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureGates {
    /// Capability is hidden unless this flag evaluates true.
    pub enable: Option<String>,
    /// Capability is hidden whenever this flag evaluates true.
    pub disable: Option<String>,
}

macro_rules! feature_gate_setters {
    () => {
        pub fn with_feature_flag_enable(mut self, flag: impl Into<String>) -> Self {
            self.gates.enable = non_empty(flag.into());
            self
        }

        pub fn with_feature_flag_disable(mut self, flag: impl Into<String>) -> Self {
            self.gates.disable = non_empty(flag.into());
            self
        }

        pub fn with_handler(mut self, handler: HandlerRef) -> Self {
            self.handler = Some(handler);
            self
        }

        pub fn handler(&self) -> Option<&HandlerRef> {
            self.handler.as_ref()
        }
    };
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A tool declaration. Its read-only tag comes from the definition's
/// annotations and is fixed for the life of the declaration.
#[derive(Debug, Clone)]
pub struct ServerTool {
    pub definition: ToolDefinition,
    pub toolset: ToolsetMetadata,
    pub gates: FeatureGates,
    handler: Option<HandlerRef>,
}

impl ServerTool {
    pub fn new(definition: ToolDefinition, toolset: ToolsetMetadata) -> Self {
        Self {
            definition,
            toolset,
            gates: FeatureGates::default(),
            handler: None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.definition.is_read_only()
    }

    feature_gate_setters!();
}

impl Capability for ServerTool {
    const KIND: CapabilityKind = CapabilityKind::Tool;

    fn scope_key(&self) -> &str {
        &self.definition.name
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    fn toolset(&self) -> &ToolsetMetadata {
        &self.toolset
    }

    fn feature_flag_enable(&self) -> Option<&str> {
        self.gates.enable.as_deref()
    }

    fn feature_flag_disable(&self) -> Option<&str> {
        self.gates.disable.as_deref()
    }

    fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    fn is_mutating(&self) -> bool {
        !self.is_read_only()
    }
}

#[derive(Debug, Clone)]
pub struct ServerResourceTemplate {
    pub template: ResourceTemplate,
    pub toolset: ToolsetMetadata,
    pub gates: FeatureGates,
    handler: Option<HandlerRef>,
}

impl ServerResourceTemplate {
    pub fn new(template: ResourceTemplate, toolset: ToolsetMetadata) -> Self {
        Self {
            template,
            toolset,
            gates: FeatureGates::default(),
            handler: None,
        }
    }

    feature_gate_setters!();
}

impl Capability for ServerResourceTemplate {
    const KIND: CapabilityKind = CapabilityKind::ResourceTemplate;

    fn scope_key(&self) -> &str {
        &self.template.uri_template
    }

    fn name(&self) -> &str {
        &self.template.name
    }

    fn toolset(&self) -> &ToolsetMetadata {
        &self.toolset
    }

    fn feature_flag_enable(&self) -> Option<&str> {
        self.gates.enable.as_deref()
    }

    fn feature_flag_disable(&self) -> Option<&str> {
        self.gates.disable.as_deref()
    }

    fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ServerPrompt {
    pub prompt: Prompt,
    pub toolset: ToolsetMetadata,
    pub gates: FeatureGates,
    handler: Option<HandlerRef>,
}

impl ServerPrompt {
    pub fn new(prompt: Prompt, toolset: ToolsetMetadata) -> Self {
        Self {
            prompt,
            toolset,
            gates: FeatureGates::default(),
            handler: None,
        }
    }

    feature_gate_setters!();
}

impl Capability for ServerPrompt {
    const KIND: CapabilityKind = CapabilityKind::Prompt;

    fn scope_key(&self) -> &str {
        &self.prompt.name
    }

    fn name(&self) -> &str {
        &self.prompt.name
    }

    fn toolset(&self) -> &ToolsetMetadata {
        &self.toolset
    }

    fn feature_flag_enable(&self) -> Option<&str> {
        self.gates.enable.as_deref()
    }

    fn feature_flag_disable(&self) -> Option<&str> {
        self.gates.disable.as_deref()
    }

    fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}
