//! Registry Builder
//!
//! Collects the catalog and filter configuration, then produces an immutable
//! [`Registry`]. The builder is an owned value consumed by `build`, so it
//! cannot be shared between concurrent configuration calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::aliases::{chained_aliases, resolve_aliases};
use crate::capability::{Capability, ServerPrompt, ServerResourceTemplate, ServerTool};
use crate::error::RegistryError;
use crate::feature::{FeatureChecker, SharedChecker};
use crate::registry::{unrecognized_toolsets, Catalog, EnabledToolsets, FilterConfig, Registry};
use crate::request::RequestScope;
use crate::selection::{clean_tools, contains_toolset, expand_default_toolset};
use crate::toolset::{is_reserved_keyword, ToolsetId, TOOLSET_ALL};

/// Options for [`Builder::build_checked`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnableToolsetsOptions {
    /// Fail when a requested toolset does not exist instead of only logging it.
    pub error_on_unknown: bool,
}

#[derive(Debug, Default)]
pub struct Builder {
    tools: Vec<ServerTool>,
    resource_templates: Vec<ServerResourceTemplate>,
    prompts: Vec<ServerPrompt>,
    /// `None` until `with_toolsets` is called; the defaults apply in that case.
    toolsets: Option<Vec<String>>,
    read_only: bool,
    additional_tools: Vec<String>,
    feature_checker: Option<SharedChecker>,
    aliases: HashMap<String, String>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tool catalog.
    pub fn set_tools(mut self, tools: Vec<ServerTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn set_resource_templates(mut self, templates: Vec<ServerResourceTemplate>) -> Self {
        self.resource_templates = templates;
        self
    }

    pub fn set_prompts(mut self, prompts: Vec<ServerPrompt>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Append tools that must all be annotated read-only.
    pub fn add_read_tools(mut self, tools: Vec<ServerTool>) -> Result<Self, RegistryError> {
        if let Some(bad) = tools.iter().find(|t| !t.is_read_only()) {
            return Err(RegistryError::MisdeclaredTool {
                name: bad.definition.name.clone(),
                expected_read_only: true,
            });
        }
        self.tools.extend(tools);
        Ok(self)
    }

    /// Append tools that must all be mutating.
    pub fn add_write_tools(mut self, tools: Vec<ServerTool>) -> Result<Self, RegistryError> {
        if let Some(bad) = tools.iter().find(|t| t.is_read_only()) {
            return Err(RegistryError::MisdeclaredTool {
                name: bad.definition.name.clone(),
                expected_read_only: false,
            });
        }
        self.tools.extend(tools);
        Ok(self)
    }

    pub fn add_resource_templates(mut self, templates: Vec<ServerResourceTemplate>) -> Self {
        self.resource_templates.extend(templates);
        self
    }

    pub fn add_prompts(mut self, prompts: Vec<ServerPrompt>) -> Self {
        self.prompts.extend(prompts);
        self
    }

    /// Toolsets to enable. Names are trimmed and deduplicated; `all` and
    /// `default` are keywords. An empty list enables no toolset.
    pub fn with_toolsets<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.toolsets = Some(clean_tools(names));
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Tools to expose regardless of toolset selection. Deprecated names are
    /// resolved to canonical ones when the registry is built.
    pub fn with_tools<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.additional_tools = clean_tools(names);
        self
    }

    pub fn with_feature_checker<C: FeatureChecker + 'static>(self, checker: C) -> Self {
        self.with_shared_feature_checker(Arc::new(checker))
    }

    pub fn with_shared_feature_checker(mut self, checker: Arc<dyn FeatureChecker>) -> Self {
        self.feature_checker = Some(SharedChecker::new(checker));
        self
    }

    /// Merge `aliases` (old name -> canonical name); later entries win.
    pub fn with_deprecated_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    pub fn resolve_tool_aliases<S: AsRef<str>>(&self, names: &[S]) -> (Vec<String>, HashMap<String, String>) {
        resolve_aliases(&self.aliases, names)
    }

    /// Requested toolsets, in input order, that match nothing in the catalog.
    pub fn unrecognized_toolsets(&self) -> Vec<String> {
        self.toolsets
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|name| !is_reserved_keyword(name) && !self.has_toolset(name))
            .cloned()
            .collect()
    }

    /// Build, failing on unknown toolsets when the options ask for it.
    pub fn build_checked(self, options: &EnableToolsetsOptions) -> Result<Registry, RegistryError> {
        if options.error_on_unknown {
            if let Some(unknown) = self.unrecognized_toolsets().into_iter().next() {
                return Err(RegistryError::ToolsetDoesNotExist(unknown));
            }
        }
        Ok(self.build())
    }

    pub fn build(self) -> Registry {
        let explicit = self.toolsets.is_some();
        let catalog = Catalog {
            tools: dedupe(self.tools),
            resource_templates: dedupe(self.resource_templates),
            prompts: dedupe(self.prompts),
            aliases: self.aliases,
        };

        for (alias, target) in chained_aliases(&catalog.aliases) {
            warn!(alias = %alias, target = %target, "deprecated alias points at another alias; it will not be followed");
        }

        let requested = self.toolsets.unwrap_or_default();
        let enabled = resolve_enabled(explicit, &requested, &catalog);

        for unknown in unrecognized_toolsets(&requested, &catalog) {
            warn!(toolset = %unknown, "unrecognized toolset requested");
        }

        let (additional, _) = resolve_aliases(&catalog.aliases, &self.additional_tools);

        let registry = Registry {
            catalog: Arc::new(catalog),
            filter: FilterConfig {
                enabled,
                read_only: self.read_only,
                additional_tools: additional.into_iter().collect(),
                feature_checker: self.feature_checker,
                requested_toolsets: requested,
                scope: RequestScope::unrestricted(),
            },
        };

        info!(
            tools = registry.catalog.tools.len(),
            resource_templates = registry.catalog.resource_templates.len(),
            prompts = registry.catalog.prompts.len(),
            read_only = registry.filter.read_only,
            "capability registry built"
        );
        registry
    }

    fn has_toolset(&self, id: &str) -> bool {
        self.tools.iter().any(|t| t.toolset.id == id)
            || self.resource_templates.iter().any(|r| r.toolset.id == id)
            || self.prompts.iter().any(|p| p.toolset.id == id)
    }
}

/// Default toolsets when nothing was configured; otherwise the requested
/// list with `all` short-circuiting and `default` expanded.
fn resolve_enabled(explicit: bool, requested: &[String], catalog: &Catalog) -> EnabledToolsets {
    let defaults = catalog.default_toolset_ids();
    if !explicit {
        return EnabledToolsets::Only(defaults.into_iter().collect());
    }
    if contains_toolset(requested, TOOLSET_ALL) {
        return EnabledToolsets::All;
    }
    let expanded = expand_default_toolset(requested, &defaults);
    EnabledToolsets::Only(expanded.into_iter().map(ToolsetId::from).collect())
}

/// Keep the first declaration of each lookup key; later duplicates are dropped.
fn dedupe<C: Capability>(items: Vec<C>) -> Vec<C> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.scope_key().to_string()) {
            kept.push(item);
        } else {
            let kind = C::KIND;
            warn!(name = %item.scope_key(), kind = ?kind, "duplicate capability name, ignoring later declaration");
        }
    }
    kept
}
