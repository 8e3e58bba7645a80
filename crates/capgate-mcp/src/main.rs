mod initialize;
mod manifest;
mod protocol;
mod server;
mod upstream;

use std::path::PathBuf;

use capgate_registry::selection::{parse_list, toolsets_help};
use capgate_registry::{Builder, EnableToolsetsOptions, RequestContext, StaticFlags};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use protocol::{error, JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use server::Server;

#[derive(Parser, Debug)]
#[command(name = "capgate-mcp", version, about = "MCP server exposing manifest-declared toolsets over stdio")]
struct Args {
    /// Comma-separated toolsets to enable; `all` and `default` are keywords.
    /// When omitted the default toolsets are enabled.
    #[arg(long)]
    toolsets: Option<String>,

    /// Comma-separated tools to expose regardless of toolset selection.
    #[arg(long, default_value = "")]
    tools: String,

    /// Hide every tool that is not annotated read-only.
    #[arg(long)]
    read_only: bool,

    /// Comma-separated feature flags to treat as enabled.
    #[arg(long, default_value = "")]
    features: String,

    /// Directory of toolset manifests. Defaults to ~/.capgate/manifests.
    #[arg(long)]
    manifest_dir: Option<PathBuf>,

    /// Upstream JSON-RPC socket for capability calls. Defaults to ~/.capgate/capgate.sock.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Refuse to start when a requested toolset does not exist.
    #[arg(long)]
    strict_toolsets: bool,

    /// Print the available toolsets and exit.
    #[arg(long)]
    list_toolsets: bool,

    /// Log filter directive, overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value = "stdio")]
    transport: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.transport != "stdio" {
        anyhow::bail!("only stdio transport is supported");
    }

    let manifest_dir = match args.manifest_dir.clone() {
        Some(dir) => dir,
        None => manifest::default_manifest_dir()?,
    };
    let socket = match args.socket.clone() {
        Some(path) => path,
        None => manifest::default_socket_path()?,
    };

    let manifests = manifest::load_manifests(&manifest_dir)?;
    let mut builder = manifest::populate_builder(Builder::new(), &manifests, &socket)?
        .with_read_only(args.read_only)
        .with_tools(parse_list(&args.tools).as_slice())
        .with_feature_checker(StaticFlags::new(parse_list(&args.features)));
    if let Some(toolsets) = &args.toolsets {
        builder = builder.with_toolsets(parse_list(toolsets).as_slice());
    }

    let registry = builder.build_checked(&EnableToolsetsOptions {
        error_on_unknown: args.strict_toolsets,
    })?;

    if args.list_toolsets {
        println!("{}", toolsets_help(&registry));
        return Ok(());
    }

    let unknown = registry.unrecognized_toolsets();
    if !unknown.is_empty() {
        warn!(toolsets = ?unknown, "ignoring unrecognized toolsets");
    }
    info!(
        enabled = ?registry.enabled_toolset_ids(),
        read_only = registry.is_read_only(),
        socket = %socket.display(),
        "capgate-mcp ready"
    );

    let server = Server::new(registry);

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => server.handle(request, &RequestContext::new()).await,
            Err(e) => Some(error(serde_json::Value::Null, PARSE_ERROR, format!("parse error: {}", e), None)),
        };

        if let Some(response) = response {
            write_response(&mut stdout, &response).await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}

async fn write_response(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> anyhow::Result<()> {
    stdout.write_all(serde_json::to_string(response)?.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
