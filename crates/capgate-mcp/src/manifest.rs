//! Manifest Loader
//!
//! Scans the manifest directory, parses one toolset per JSON file and turns
//! the declarations into a registry builder. Every capability that names an
//! upstream `method` is backed by a [`ForwardingHandler`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use capgate_registry::{
    Builder, HandlerRef, Prompt, ResourceTemplate, ServerPrompt, ServerResourceTemplate, ServerTool, ToolDefinition,
    ToolsetMetadata,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::upstream::ForwardingHandler;

const MAX_MANIFEST_BYTES: u64 = 1_000_000;

/// Apply a manifest entry's flags and upstream method to a declaration.
macro_rules! apply_gates {
    ($decl:expr, $gates:expr, $socket:expr) => {{
        let gates: &ManifestGates = $gates;
        let mut decl = $decl;
        if let Some(flag) = &gates.feature_flag_enable {
            decl = decl.with_feature_flag_enable(flag.as_str());
        }
        if let Some(flag) = &gates.feature_flag_disable {
            decl = decl.with_feature_flag_disable(flag.as_str());
        }
        if let Some(method) = &gates.method {
            decl = decl.with_handler(HandlerRef::new(ForwardingHandler::new(
                $socket.to_path_buf(),
                method.as_str(),
            )));
        }
        decl
    }};
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub toolset: ManifestToolset,
    #[serde(default)]
    pub read_tools: Vec<ManifestTool>,
    #[serde(default)]
    pub write_tools: Vec<ManifestTool>,
    #[serde(default)]
    pub resource_templates: Vec<ManifestResourceTemplate>,
    #[serde(default)]
    pub prompts: Vec<ManifestPrompt>,
    #[serde(default)]
    pub deprecated_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestToolset {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestGates {
    #[serde(default)]
    pub feature_flag_enable: Option<String>,
    #[serde(default)]
    pub feature_flag_disable: Option<String>,
    /// Upstream socket method the capability forwards to.
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestTool {
    #[serde(flatten)]
    pub definition: ToolDefinition,
    #[serde(flatten)]
    pub gates: ManifestGates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResourceTemplate {
    #[serde(flatten)]
    pub template: ResourceTemplate,
    #[serde(flatten)]
    pub gates: ManifestGates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestPrompt {
    #[serde(flatten)]
    pub prompt: Prompt,
    #[serde(flatten)]
    pub gates: ManifestGates,
}

impl Manifest {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.toolset.id.trim().is_empty() {
            anyhow::bail!("toolset id must not be empty");
        }
        if capgate_registry::toolset::is_reserved_keyword(&self.toolset.id) {
            anyhow::bail!("toolset id '{}' is a reserved keyword", self.toolset.id);
        }
        Ok(())
    }

    fn metadata(&self) -> ToolsetMetadata {
        let meta = ToolsetMetadata::new(self.toolset.id.as_str(), self.toolset.description.as_str())
            .with_default(self.toolset.default);
        match &self.toolset.icon {
            Some(icon) => meta.with_icon(icon.as_str()),
            None => meta,
        }
    }
}

/// Load all manifests from a directory tree (recursive). A missing directory
/// yields an empty catalog; unreadable or invalid files are skipped.
pub fn load_manifests(base_dir: &Path) -> anyhow::Result<Vec<Manifest>> {
    let mut files = Vec::new();
    if !base_dir.exists() {
        info!(dir = %base_dir.display(), "manifest directory does not exist");
        return Ok(Vec::new());
    }
    collect_json_files(base_dir, &mut files)?;
    files.sort();

    let mut manifests = Vec::new();
    for path in files {
        match load_manifest_file(&path) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!(file = %path.display(), error = %e, "failed to load manifest"),
        }
    }

    info!(count = manifests.len(), dir = %base_dir.display(), "loaded manifests");
    Ok(manifests)
}

fn load_manifest_file(path: &Path) -> anyhow::Result<Manifest> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_MANIFEST_BYTES {
        anyhow::bail!("manifest file too large (max 1MB)");
    }

    let content = fs::read_to_string(path)?;
    let manifest: Manifest = serde_json::from_str(&content).context("failed to parse JSON")?;
    manifest.validate()?;
    Ok(manifest)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();

        // Skip dotfiles and editor leftovers
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') || name.ends_with(".tmp") || name.ends_with(".swp") {
                continue;
            }
        }

        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
            out.push(path);
        }
    }
    Ok(())
}

/// Fill `builder` with the manifests' capabilities and aliases.
///
/// Read tools default to a read-only hint and write tools to a mutating one;
/// a tool whose explicit annotation contradicts its section fails the whole
/// load.
pub fn populate_builder(mut builder: Builder, manifests: &[Manifest], socket: &Path) -> anyhow::Result<Builder> {
    for manifest in manifests {
        let meta = manifest.metadata();

        let read_tools = manifest
            .read_tools
            .iter()
            .map(|t| server_tool(t, true, &meta, socket))
            .collect();
        builder = builder
            .add_read_tools(read_tools)
            .with_context(|| format!("toolset '{}'", manifest.toolset.id))?;

        let write_tools = manifest
            .write_tools
            .iter()
            .map(|t| server_tool(t, false, &meta, socket))
            .collect();
        builder = builder
            .add_write_tools(write_tools)
            .with_context(|| format!("toolset '{}'", manifest.toolset.id))?;

        let templates = manifest
            .resource_templates
            .iter()
            .map(|r| {
                let decl = ServerResourceTemplate::new(r.template.clone(), meta.clone());
                apply_gates!(decl, &r.gates, socket)
            })
            .collect();
        builder = builder.add_resource_templates(templates);

        let prompts = manifest
            .prompts
            .iter()
            .map(|p| {
                let decl = ServerPrompt::new(p.prompt.clone(), meta.clone());
                apply_gates!(decl, &p.gates, socket)
            })
            .collect();
        builder = builder.add_prompts(prompts);

        builder = builder.with_deprecated_aliases(manifest.deprecated_aliases.clone());
    }
    Ok(builder)
}

fn server_tool(tool: &ManifestTool, section_read_only: bool, meta: &ToolsetMetadata, socket: &Path) -> ServerTool {
    let mut definition = tool.definition.clone();
    let declared = definition.annotations.as_ref().and_then(|a| a.read_only_hint);
    if declared.is_none() {
        definition = definition.with_read_only_hint(section_read_only);
    }
    apply_gates!(ServerTool::new(definition, meta.clone()), &tool.gates, socket)
}

/// Default manifest directory: `~/.capgate/manifests`.
pub fn default_manifest_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory unavailable"))?;
    Ok(home.join(".capgate").join("manifests"))
}

/// Default upstream socket: `~/.capgate/capgate.sock`.
pub fn default_socket_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory unavailable"))?;
    Ok(home.join(".capgate").join("capgate.sock"))
}
