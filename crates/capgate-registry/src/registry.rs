//! Capability Registry
//!
//! Immutable catalog plus filter configuration. Every `available_*` query
//! runs the full filter pipeline again; nothing is cached, so a registry can
//! be shared across concurrent request handlers without locking.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::aliases::resolve_aliases;
use crate::capability::{
    Capability, CapabilityKind, ServerPrompt, ServerResourceTemplate, ServerTool,
};
use crate::error::RegistryError;
use crate::feature::{RequestContext, SharedChecker};
use crate::request::RequestScope;
use crate::toolset::{is_reserved_keyword, ToolsetId, ToolsetMetadata};

/// The declarations a registry serves from. Shared by every scoped view.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub(crate) tools: Vec<ServerTool>,
    pub(crate) resource_templates: Vec<ServerResourceTemplate>,
    pub(crate) prompts: Vec<ServerPrompt>,
    pub(crate) aliases: HashMap<String, String>,
}

impl Catalog {
    /// Metadata for every toolset referenced by any capability, keyed by ID.
    /// The first declaration seen for an ID wins.
    fn toolsets(&self) -> BTreeMap<&ToolsetId, &ToolsetMetadata> {
        let mut toolsets = BTreeMap::new();
        let all = self
            .tools
            .iter()
            .map(|t| &t.toolset)
            .chain(self.resource_templates.iter().map(|r| &r.toolset))
            .chain(self.prompts.iter().map(|p| &p.toolset));
        for meta in all {
            toolsets.entry(&meta.id).or_insert(meta);
        }
        toolsets
    }

    pub(crate) fn has_toolset(&self, id: &str) -> bool {
        self.tools.iter().any(|t| t.toolset.id == id)
            || self.resource_templates.iter().any(|r| r.toolset.id == id)
            || self.prompts.iter().any(|p| p.toolset.id == id)
    }

    pub(crate) fn default_toolset_ids(&self) -> Vec<ToolsetId> {
        self.toolsets()
            .into_values()
            .filter(|meta| meta.default)
            .map(|meta| meta.id.clone())
            .collect()
    }
}

/// Which toolsets pass the visibility rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnabledToolsets {
    All,
    Only(HashSet<ToolsetId>),
}

impl EnabledToolsets {
    fn contains(&self, id: &ToolsetId) -> bool {
        match self {
            EnabledToolsets::All => true,
            EnabledToolsets::Only(ids) => ids.contains(id),
        }
    }
}

/// Per-registry filter state. Cloned, never shared, when a registry is scoped.
#[derive(Debug, Clone)]
pub(crate) struct FilterConfig {
    pub(crate) enabled: EnabledToolsets,
    pub(crate) read_only: bool,
    /// Canonical tool names that bypass toolset filtering.
    pub(crate) additional_tools: HashSet<String>,
    pub(crate) feature_checker: Option<SharedChecker>,
    /// Cleaned toolset names as configured, kept for diagnostics.
    pub(crate) requested_toolsets: Vec<String>,
    pub(crate) scope: RequestScope,
}

/// Immutable capability registry.
#[derive(Debug, Clone)]
pub struct Registry {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) filter: FilterConfig,
}

impl Registry {
    pub async fn available_tools(&self, ctx: &RequestContext) -> Vec<&ServerTool> {
        self.filter_available(ctx, &self.catalog.tools).await
    }

    pub async fn available_resource_templates(&self, ctx: &RequestContext) -> Vec<&ServerResourceTemplate> {
        self.filter_available(ctx, &self.catalog.resource_templates).await
    }

    pub async fn available_prompts(&self, ctx: &RequestContext) -> Vec<&ServerPrompt> {
        self.filter_available(ctx, &self.catalog.prompts).await
    }

    async fn filter_available<'a, C: Capability + Sync>(
        &'a self,
        ctx: &RequestContext,
        items: &'a [C],
    ) -> Vec<&'a C> {
        let scope = self.filter.scope.for_kind(C::KIND);
        let mut available = Vec::new();

        for item in items {
            if !scope.admits(item.scope_key()) {
                continue;
            }
            if !self.is_visible(item) {
                continue;
            }
            if self.filter.read_only && item.is_mutating() {
                continue;
            }
            if !self.feature_flags_allow(ctx, item).await {
                continue;
            }
            available.push(item);
        }

        available.sort_by(|a, b| {
            a.toolset_id()
                .cmp(b.toolset_id())
                .then_with(|| a.name().cmp(b.name()))
        });
        available
    }

    /// Toolset enabled, or a tool named in the additive allow-list.
    fn is_visible<C: Capability>(&self, item: &C) -> bool {
        self.filter.enabled.contains(item.toolset_id())
            || (C::KIND == CapabilityKind::Tool && self.filter.additional_tools.contains(item.name()))
    }

    async fn feature_flags_allow<C: Capability>(&self, ctx: &RequestContext, item: &C) -> bool {
        if let Some(flag) = item.feature_flag_enable() {
            if !self.check_flag(ctx, flag).await {
                debug!(capability = %item.name(), flag = %flag, "excluded: enable flag is off");
                return false;
            }
        }
        if let Some(flag) = item.feature_flag_disable() {
            if self.check_flag(ctx, flag).await {
                debug!(capability = %item.name(), flag = %flag, "excluded: disable flag is on");
                return false;
            }
        }
        true
    }

    /// A missing checker or a checker error both read as "flag off".
    async fn check_flag(&self, ctx: &RequestContext, flag: &str) -> bool {
        let Some(checker) = &self.filter.feature_checker else {
            return false;
        };
        match checker.is_enabled(ctx, flag).await {
            Ok(enabled) => enabled,
            Err(e) => {
                debug!(flag = %flag, error = %e, "feature flag check failed, treating as off");
                false
            }
        }
    }

    pub fn all_tools(&self) -> &[ServerTool] {
        &self.catalog.tools
    }

    pub fn all_resource_templates(&self) -> &[ServerResourceTemplate] {
        &self.catalog.resource_templates
    }

    pub fn all_prompts(&self) -> &[ServerPrompt] {
        &self.catalog.prompts
    }

    /// Look up a tool by canonical name, ignoring every filter. Aliases are not
    /// resolved here; use [`Registry::resolve_tool_aliases`] first.
    pub fn find_tool_by_name(&self, name: &str) -> Result<(&ServerTool, &ToolsetId), RegistryError> {
        self.catalog
            .tools
            .iter()
            .find(|t| t.definition.name == name)
            .map(|t| (t, &t.toolset.id))
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    pub fn find_resource_template_by_uri(
        &self,
        uri_template: &str,
    ) -> Result<(&ServerResourceTemplate, &ToolsetId), RegistryError> {
        self.catalog
            .resource_templates
            .iter()
            .find(|r| r.template.uri_template == uri_template)
            .map(|r| (r, &r.toolset.id))
            .ok_or_else(|| RegistryError::ResourceTemplateNotFound(uri_template.to_string()))
    }

    pub fn find_prompt_by_name(&self, name: &str) -> Result<(&ServerPrompt, &ToolsetId), RegistryError> {
        self.catalog
            .prompts
            .iter()
            .find(|p| p.prompt.name == name)
            .map(|p| (p, &p.toolset.id))
            .ok_or_else(|| RegistryError::PromptNotFound(name.to_string()))
    }

    pub fn resolve_tool_aliases<S: AsRef<str>>(&self, names: &[S]) -> (Vec<String>, HashMap<String, String>) {
        resolve_aliases(&self.catalog.aliases, names)
    }

    pub fn deprecated_aliases(&self) -> &HashMap<String, String> {
        &self.catalog.aliases
    }

    pub fn is_read_only(&self) -> bool {
        self.filter.read_only
    }

    /// Sorted, deduplicated toolset IDs across the whole catalog.
    pub fn toolset_ids(&self) -> Vec<ToolsetId> {
        self.catalog.toolsets().into_keys().cloned().collect()
    }

    pub fn has_toolset(&self, id: &str) -> bool {
        self.catalog.has_toolset(id)
    }

    pub fn toolset(&self, id: &str) -> Result<&ToolsetMetadata, RegistryError> {
        self.catalog
            .toolsets()
            .into_iter()
            .find(|(key, _)| key.as_str() == id)
            .map(|(_, meta)| meta)
            .ok_or_else(|| RegistryError::ToolsetDoesNotExist(id.to_string()))
    }

    /// One metadata entry per toolset, sorted by ID.
    pub fn available_toolsets(&self) -> Vec<ToolsetMetadata> {
        self.catalog.toolsets().into_values().cloned().collect()
    }

    pub fn toolset_descriptions(&self) -> BTreeMap<ToolsetId, String> {
        self.catalog
            .toolsets()
            .into_iter()
            .map(|(id, meta)| (id.clone(), meta.description.clone()))
            .collect()
    }

    pub fn tools_for_toolset(&self, id: &str) -> Vec<&ServerTool> {
        self.catalog.tools.iter().filter(|t| t.toolset.id == id).collect()
    }

    pub fn default_toolset_ids(&self) -> Vec<ToolsetId> {
        self.catalog.default_toolset_ids()
    }

    /// Sorted IDs of toolsets with at least one capability passing the
    /// visibility rule under the current configuration.
    pub fn enabled_toolset_ids(&self) -> Vec<ToolsetId> {
        let mut ids = BTreeSet::new();
        collect_visible(self, &self.catalog.tools, &mut ids);
        collect_visible(self, &self.catalog.resource_templates, &mut ids);
        collect_visible(self, &self.catalog.prompts, &mut ids);
        ids.into_iter().cloned().collect()
    }

    /// Requested toolsets, in input order, that match nothing in the catalog.
    /// The `all` and `default` keywords are never reported.
    pub fn unrecognized_toolsets(&self) -> Vec<String> {
        unrecognized_toolsets(&self.filter.requested_toolsets, &self.catalog)
    }
}

fn collect_visible<'a, C: Capability>(registry: &Registry, items: &'a [C], ids: &mut BTreeSet<&'a ToolsetId>) {
    for item in items {
        if registry.is_visible(item) {
            ids.insert(item.toolset_id());
        }
    }
}

pub(crate) fn unrecognized_toolsets(requested: &[String], catalog: &Catalog) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !is_reserved_keyword(name) && !catalog.has_toolset(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::capability::{Prompt, ResourceTemplate, ToolDefinition};
    use crate::feature::{checker_fn, FlagError};

    fn meta(id: &str) -> ToolsetMetadata {
        ToolsetMetadata::new(id, format!("Test toolset: {id}"))
    }

    fn tool(name: &str, toolset: &str, read_only: bool) -> ServerTool {
        ServerTool::new(ToolDefinition::new(name, "").with_read_only_hint(read_only), meta(toolset))
    }

    fn tool_with_flags(name: &str, toolset: &str, enable: &str, disable: &str) -> ServerTool {
        tool(name, toolset, true)
            .with_feature_flag_enable(enable)
            .with_feature_flag_disable(disable)
    }

    fn names(tools: &[&ServerTool]) -> Vec<String> {
        tools.iter().map(|t| t.definition.name.clone()).collect()
    }

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let reg = Builder::new().build();
        assert!(reg.available_tools(&ctx()).await.is_empty());
        assert!(reg.available_resource_templates(&ctx()).await.is_empty());
        assert!(reg.available_prompts(&ctx()).await.is_empty());
    }

    #[tokio::test]
    async fn test_available_tools_sorted_by_toolset_then_name() {
        let reg = Builder::new()
            .set_tools(vec![
                tool("tool3", "toolset2", true),
                tool("tool1", "toolset1", true),
                tool("b_tool", "toolset2", true),
                tool("tool2", "toolset1", true),
            ])
            .with_toolsets(&["all"])
            .build();

        let available = reg.available_tools(&ctx()).await;
        assert_eq!(names(&available), vec!["tool1", "tool2", "b_tool", "tool3"]);
    }

    #[tokio::test]
    async fn test_resources_and_prompts_sorted_by_toolset_then_name() {
        let resource = |name: &str, toolset: &str| {
            ServerResourceTemplate::new(
                ResourceTemplate {
                    name: name.into(),
                    uri_template: format!("{toolset}://{name}/{{id}}"),
                    description: None,
                    mime_type: None,
                },
                meta(toolset),
            )
        };
        let prompt = |name: &str, toolset: &str| {
            ServerPrompt::new(
                Prompt {
                    name: name.into(),
                    description: None,
                    arguments: Vec::new(),
                },
                meta(toolset),
            )
        };
        let reg = Builder::new()
            .set_resource_templates(vec![
                resource("zeta", "toolset2"),
                resource("omega", "toolset1"),
                resource("alpha", "toolset2"),
                resource("beta", "toolset1"),
            ])
            .set_prompts(vec![
                prompt("review", "toolset2"),
                prompt("triage", "toolset1"),
                prompt("assign", "toolset2"),
                prompt("label", "toolset1"),
            ])
            .with_toolsets(&["all"])
            .build();

        let templates: Vec<_> = reg
            .available_resource_templates(&ctx())
            .await
            .iter()
            .map(|r| (r.toolset.id.as_str().to_string(), r.template.name.clone()))
            .collect();
        assert_eq!(
            templates,
            vec![
                ("toolset1".to_string(), "beta".to_string()),
                ("toolset1".to_string(), "omega".to_string()),
                ("toolset2".to_string(), "alpha".to_string()),
                ("toolset2".to_string(), "zeta".to_string()),
            ]
        );

        let prompts: Vec<_> = reg
            .available_prompts(&ctx())
            .await
            .iter()
            .map(|p| (p.toolset.id.as_str().to_string(), p.prompt.name.clone()))
            .collect();
        assert_eq!(
            prompts,
            vec![
                ("toolset1".to_string(), "label".to_string()),
                ("toolset1".to_string(), "triage".to_string()),
                ("toolset2".to_string(), "assign".to_string()),
                ("toolset2".to_string(), "review".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_only_filter() {
        let tools = vec![tool("read_tool", "toolset1", true), tool("write_tool", "toolset1", false)];

        let reg = Builder::new().set_tools(tools.clone()).with_toolsets(&["all"]).build();
        assert_eq!(reg.available_tools(&ctx()).await.len(), 2);

        let read_only = Builder::new()
            .set_tools(tools)
            .with_toolsets(&["all"])
            .with_read_only(true)
            .build();
        assert_eq!(names(&read_only.available_tools(&ctx()).await), vec!["read_tool"]);
        assert!(read_only.is_read_only());
    }

    #[tokio::test]
    async fn test_toolset_filter() {
        let reg = Builder::new()
            .set_tools(vec![
                tool("tool1", "toolset1", true),
                tool("tool2", "toolset2", true),
                tool("tool3", "toolset3", true),
            ])
            .with_toolsets(&["toolset1", "toolset3"])
            .build();
        assert_eq!(names(&reg.available_tools(&ctx()).await), vec!["tool1", "tool3"]);
    }

    #[tokio::test]
    async fn test_additional_tools_bypass_toolsets() {
        let tools = vec![
            tool("issue_read", "toolset1", true),
            tool("issue_write", "toolset1", false),
            tool("repo_read", "toolset2", true),
        ];

        let reg = Builder::new()
            .set_tools(tools.clone())
            .with_toolsets(&["toolset2"])
            .with_tools(&["issue_read"])
            .build();
        assert_eq!(names(&reg.available_tools(&ctx()).await), vec!["issue_read", "repo_read"]);

        let none = Builder::new()
            .set_tools(tools)
            .with_toolsets::<&str>(&[])
            .with_tools(&["nonexistent"])
            .build();
        assert!(none.available_tools(&ctx()).await.is_empty());
    }

    #[tokio::test]
    async fn test_additional_tools_still_read_only_filtered() {
        let reg = Builder::new()
            .set_tools(vec![tool("read", "toolset1", true), tool("write", "toolset1", false)])
            .with_toolsets::<&str>(&[])
            .with_tools(&["read", "write"])
            .with_read_only(true)
            .build();
        assert_eq!(names(&reg.available_tools(&ctx()).await), vec!["read"]);
    }

    #[tokio::test]
    async fn test_additional_tools_do_not_apply_to_prompts() {
        let reg = Builder::new()
            .set_prompts(vec![ServerPrompt::new(
                Prompt {
                    name: "triage".into(),
                    description: None,
                    arguments: Vec::new(),
                },
                meta("issues"),
            )])
            .with_toolsets::<&str>(&[])
            .with_tools(&["triage"])
            .build();
        assert!(reg.available_prompts(&ctx()).await.is_empty());
    }

    #[tokio::test]
    async fn test_feature_flag_truth_table() {
        // (enable, disable, checker result for each flag) -> visible
        let on = |flag: &str| flag.ends_with("_on");
        let cases = [
            ("", "", true),
            ("feat_off", "", false),
            ("feat_on", "", true),
            ("", "kill_off", true),
            ("", "kill_on", false),
            ("feat_off", "kill_off", false),
            ("feat_off", "kill_on", false),
            ("feat_on", "kill_off", true),
            ("feat_on", "kill_on", false),
        ];

        for (enable, disable, visible) in cases {
            let reg = Builder::new()
                .set_tools(vec![tool_with_flags("gated", "toolset1", enable, disable)])
                .with_toolsets(&["all"])
                .with_feature_checker(checker_fn(move |_, flag| Ok(on(flag))))
                .build();
            let count = reg.available_tools(&ctx()).await.len();
            assert_eq!(count == 1, visible, "enable={enable:?} disable={disable:?}");
        }
    }

    #[tokio::test]
    async fn test_feature_flag_without_checker() {
        let reg = Builder::new()
            .set_tools(vec![
                tool("always", "toolset1", true),
                tool_with_flags("needs_flag", "toolset1", "my_feature", ""),
                tool_with_flags("killable", "toolset1", "", "kill_switch"),
            ])
            .with_toolsets(&["all"])
            .build();
        assert_eq!(names(&reg.available_tools(&ctx()).await), vec!["always", "killable"]);
    }

    #[tokio::test]
    async fn test_feature_checker_error_enable_closed_disable_open() {
        let failing = || checker_fn(|_, _| -> Result<bool, FlagError> { Err("simulated error".into()) });

        let enable = Builder::new()
            .set_tools(vec![tool_with_flags("needs_flag", "toolset1", "my_feature", "")])
            .with_toolsets(&["all"])
            .with_feature_checker(failing())
            .build();
        assert!(enable.available_tools(&ctx()).await.is_empty());

        let disable = Builder::new()
            .set_tools(vec![tool_with_flags("killable", "toolset1", "", "kill_switch")])
            .with_toolsets(&["all"])
            .with_feature_checker(failing())
            .build();
        assert_eq!(disable.available_tools(&ctx()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_feature_checker_called_every_query() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let reg = Builder::new()
            .set_tools(vec![
                tool_with_flags("a", "toolset1", "flag", ""),
                tool_with_flags("b", "toolset1", "flag", ""),
            ])
            .with_toolsets(&["all"])
            .with_feature_checker(checker_fn(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }))
            .build();

        reg.available_tools(&ctx()).await;
        reg.available_tools(&ctx()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_feature_flags_on_resources_and_prompts() {
        let resource = |name: &str, uri: &str| {
            ServerResourceTemplate::new(
                ResourceTemplate {
                    name: name.into(),
                    uri_template: uri.into(),
                    description: None,
                    mime_type: None,
                },
                meta("toolset1"),
            )
        };
        let prompt = |name: &str| {
            ServerPrompt::new(
                Prompt {
                    name: name.into(),
                    description: None,
                    arguments: Vec::new(),
                },
                meta("toolset1"),
            )
        };
        let builder = || {
            Builder::new()
                .set_resource_templates(vec![
                    resource("always", "uri1"),
                    resource("needs_flag", "uri2").with_feature_flag_enable("my_feature"),
                ])
                .set_prompts(vec![
                    prompt("always"),
                    prompt("needs_flag").with_feature_flag_enable("my_feature"),
                ])
                .with_toolsets(&["all"])
        };

        let without = builder().build();
        assert_eq!(without.available_resource_templates(&ctx()).await.len(), 1);
        assert_eq!(without.available_prompts(&ctx()).await.len(), 1);

        let with = builder().with_feature_checker(checker_fn(|_, _| Ok(true))).build();
        assert_eq!(with.available_resource_templates(&ctx()).await.len(), 2);
        assert_eq!(with.available_prompts(&ctx()).await.len(), 2);
    }

    #[tokio::test]
    async fn test_all_tools_ignores_filters() {
        let reg = Builder::new()
            .set_tools(vec![tool("read_tool", "toolset1", true), tool("write_tool", "toolset1", false)])
            .with_toolsets(&["all"])
            .with_read_only(true)
            .build();
        assert_eq!(reg.all_tools().len(), 2);
        assert_eq!(reg.available_tools(&ctx()).await.len(), 1);
    }

    #[test]
    fn test_find_tool_by_name() {
        let reg = Builder::new()
            .set_tools(vec![tool("issue_read", "toolset1", true)])
            .with_deprecated_aliases(HashMap::from([("get_issue".to_string(), "issue_read".to_string())]))
            .build();

        let (found, toolset) = reg.find_tool_by_name("issue_read").unwrap();
        assert_eq!(found.definition.name, "issue_read");
        assert_eq!(toolset.as_str(), "toolset1");

        assert_eq!(
            reg.find_tool_by_name("get_issue").unwrap_err(),
            RegistryError::ToolNotFound("get_issue".into())
        );
        assert!(reg.find_tool_by_name("nonexistent").unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_resource_and_prompt() {
        let reg = Builder::new()
            .set_resource_templates(vec![ServerResourceTemplate::new(
                ResourceTemplate {
                    name: "repo".into(),
                    uri_template: "repo://{owner}/{repo}".into(),
                    description: None,
                    mime_type: None,
                },
                meta("repos"),
            )])
            .set_prompts(vec![ServerPrompt::new(
                Prompt {
                    name: "triage".into(),
                    description: None,
                    arguments: Vec::new(),
                },
                meta("issues"),
            )])
            .build();

        assert_eq!(reg.find_resource_template_by_uri("repo://{owner}/{repo}").unwrap().1.as_str(), "repos");
        assert!(reg.find_resource_template_by_uri("x://").is_err());
        assert_eq!(reg.find_prompt_by_name("triage").unwrap().1.as_str(), "issues");
        assert_eq!(
            reg.find_prompt_by_name("nope").unwrap_err(),
            RegistryError::PromptNotFound("nope".into())
        );
    }

    #[test]
    fn test_toolset_queries() {
        let reg = Builder::new()
            .set_tools(vec![
                tool("tool1", "toolset2", true),
                tool("tool2", "toolset1", true),
                tool("tool3", "toolset1", false),
            ])
            .build();

        assert_eq!(reg.toolset_ids(), vec![ToolsetId::new("toolset1"), ToolsetId::new("toolset2")]);
        assert!(reg.has_toolset("toolset1"));
        assert!(!reg.has_toolset("nonexistent"));

        let descriptions = reg.toolset_descriptions();
        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions[&ToolsetId::new("toolset1")], "Test toolset: toolset1");

        assert_eq!(reg.tools_for_toolset("toolset1").len(), 2);
        assert!(reg.tools_for_toolset("missing").is_empty());

        assert_eq!(reg.toolset("toolset2").unwrap().id.as_str(), "toolset2");
        assert_eq!(
            reg.toolset("missing").unwrap_err(),
            RegistryError::ToolsetDoesNotExist("missing".into())
        );
    }

    #[test]
    fn test_enabled_toolset_ids() {
        let tools = vec![
            tool("tool1", "toolset1", true),
            tool("tool2", "toolset2", true),
            tool("tool3", "toolset3", true),
        ];

        let all = Builder::new().set_tools(tools.clone()).with_toolsets(&["all"]).build();
        assert_eq!(all.enabled_toolset_ids().len(), 3);

        let filtered = Builder::new().set_tools(tools.clone()).with_toolsets(&["toolset1"]).build();
        assert_eq!(filtered.enabled_toolset_ids(), vec![ToolsetId::new("toolset1")]);

        let with_extra = Builder::new()
            .set_tools(tools)
            .with_toolsets(&["toolset1"])
            .with_tools(&["tool3"])
            .build();
        assert_eq!(
            with_extra.enabled_toolset_ids(),
            vec![ToolsetId::new("toolset1"), ToolsetId::new("toolset3")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_registry() {
        let reg = Arc::new(
            Builder::new()
                .set_tools(vec![tool("a", "toolset1", true), tool("b", "toolset2", false)])
                .with_toolsets(&["all"])
                .build(),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = Arc::clone(&reg);
            handles.push(tokio::spawn(async move {
                let ctx = RequestContext::new();
                reg.available_tools(&ctx)
                    .await
                    .iter()
                    .map(|t| t.definition.name.clone())
                    .collect::<Vec<_>>()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), vec!["a", "b"]);
        }
    }
}
