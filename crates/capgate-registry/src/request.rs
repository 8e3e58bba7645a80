//! Request Scoping
//!
//! Narrows a registry to the capabilities relevant to one MCP request. The
//! narrowed registry shares the catalog with its parent and carries its own
//! filter configuration, so the parent is never touched.

use crate::aliases::resolve_alias;
use crate::capability::CapabilityKind;
use crate::registry::Registry;

pub const MCP_METHOD_INITIALIZE: &str = "initialize";
pub const MCP_METHOD_TOOLS_LIST: &str = "tools/list";
pub const MCP_METHOD_TOOLS_CALL: &str = "tools/call";
pub const MCP_METHOD_RESOURCES_LIST: &str = "resources/list";
pub const MCP_METHOD_RESOURCES_READ: &str = "resources/read";
pub const MCP_METHOD_RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
pub const MCP_METHOD_PROMPTS_LIST: &str = "prompts/list";
pub const MCP_METHOD_PROMPTS_GET: &str = "prompts/get";

/// The protocol methods the registry knows how to scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McpMethod {
    Initialize,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    ResourcesTemplatesList,
    PromptsList,
    PromptsGet,
}

impl McpMethod {
    pub const ALL: [McpMethod; 8] = [
        McpMethod::Initialize,
        McpMethod::ToolsList,
        McpMethod::ToolsCall,
        McpMethod::ResourcesList,
        McpMethod::ResourcesRead,
        McpMethod::ResourcesTemplatesList,
        McpMethod::PromptsList,
        McpMethod::PromptsGet,
    ];

    pub fn parse(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            McpMethod::Initialize => MCP_METHOD_INITIALIZE,
            McpMethod::ToolsList => MCP_METHOD_TOOLS_LIST,
            McpMethod::ToolsCall => MCP_METHOD_TOOLS_CALL,
            McpMethod::ResourcesList => MCP_METHOD_RESOURCES_LIST,
            McpMethod::ResourcesRead => MCP_METHOD_RESOURCES_READ,
            McpMethod::ResourcesTemplatesList => MCP_METHOD_RESOURCES_TEMPLATES_LIST,
            McpMethod::PromptsList => MCP_METHOD_PROMPTS_LIST,
            McpMethod::PromptsGet => MCP_METHOD_PROMPTS_GET,
        }
    }
}

/// Which capabilities of one kind a request may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindScope {
    All,
    Nothing,
    /// Only the capability with this scope key (name, or URI template).
    Only(String),
}

impl KindScope {
    pub fn admits(&self, key: &str) -> bool {
        match self {
            KindScope::All => true,
            KindScope::Nothing => false,
            KindScope::Only(only) => only == key,
        }
    }

    /// Intersection of two scopes; narrowing never widens.
    pub fn narrow(&self, other: &KindScope) -> KindScope {
        match (self, other) {
            (KindScope::Nothing, _) | (_, KindScope::Nothing) => KindScope::Nothing,
            (KindScope::All, s) | (s, KindScope::All) => s.clone(),
            (KindScope::Only(a), KindScope::Only(b)) if a == b => KindScope::Only(a.clone()),
            (KindScope::Only(_), KindScope::Only(_)) => KindScope::Nothing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub tools: KindScope,
    pub resource_templates: KindScope,
    pub prompts: KindScope,
}

impl RequestScope {
    pub fn unrestricted() -> Self {
        Self {
            tools: KindScope::All,
            resource_templates: KindScope::All,
            prompts: KindScope::All,
        }
    }

    pub fn empty() -> Self {
        Self {
            tools: KindScope::Nothing,
            resource_templates: KindScope::Nothing,
            prompts: KindScope::Nothing,
        }
    }

    pub fn for_kind(&self, kind: CapabilityKind) -> &KindScope {
        match kind {
            CapabilityKind::Tool => &self.tools,
            CapabilityKind::ResourceTemplate => &self.resource_templates,
            CapabilityKind::Prompt => &self.prompts,
        }
    }

    fn narrow(&self, other: &RequestScope) -> RequestScope {
        RequestScope {
            tools: self.tools.narrow(&other.tools),
            resource_templates: self.resource_templates.narrow(&other.resource_templates),
            prompts: self.prompts.narrow(&other.prompts),
        }
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl Registry {
    /// Registry scoped to what `method` needs, optionally to the single item
    /// named by `item_name`. Read-only and feature-flag filters still apply.
    pub fn for_mcp_request(&self, method: &str, item_name: &str) -> Registry {
        let scope = match McpMethod::parse(method) {
            Some(method) => self.scope_for(method, item_name),
            None => RequestScope::empty(),
        };

        let mut scoped = self.clone();
        scoped.filter.scope = self.filter.scope.narrow(&scope);
        scoped
    }

    fn scope_for(&self, method: McpMethod, item_name: &str) -> RequestScope {
        let mut scope = RequestScope::empty();
        match method {
            McpMethod::Initialize => {}
            McpMethod::ToolsList => scope.tools = KindScope::All,
            McpMethod::ToolsCall => scope.tools = self.tool_scope(item_name),
            McpMethod::ResourcesList | McpMethod::ResourcesTemplatesList => {
                scope.resource_templates = KindScope::All
            }
            McpMethod::ResourcesRead => scope.resource_templates = self.resource_scope(item_name),
            McpMethod::PromptsList => scope.prompts = KindScope::All,
            McpMethod::PromptsGet => {
                scope.prompts = single(item_name, |name| {
                    self.catalog.prompts.iter().any(|p| p.prompt.name == name)
                })
            }
        }
        scope
    }

    fn tool_scope(&self, item_name: &str) -> KindScope {
        if item_name.is_empty() {
            return KindScope::Nothing;
        }
        let (canonical, _) = resolve_alias(&self.catalog.aliases, item_name);
        single(canonical, |name| self.catalog.tools.iter().any(|t| t.definition.name == name))
    }

    /// `uri` may be a template verbatim or a concrete URI; an exact template
    /// match wins over expansion.
    fn resource_scope(&self, uri: &str) -> KindScope {
        if uri.is_empty() {
            return KindScope::Nothing;
        }
        let templates = &self.catalog.resource_templates;
        templates
            .iter()
            .find(|r| r.template.uri_template == uri)
            .or_else(|| templates.iter().find(|r| r.template.matches(uri)))
            .map_or(KindScope::Nothing, |r| KindScope::Only(r.template.uri_template.clone()))
    }
}

/// Single-item scope. An empty key names nothing.
fn single(key: &str, exists: impl Fn(&str) -> bool) -> KindScope {
    if !key.is_empty() && exists(key) {
        KindScope::Only(key.to_string())
    } else {
        KindScope::Nothing
    }
}
