use crate::protocol::{
    InitializeRequest, InitializeResponse, ListChanged, ResourcesCapabilities, ServerCapabilities, ServerInfo,
    MCP_PROTOCOL_VERSION,
};

pub fn handle_initialize(request: InitializeRequest, read_only: bool) -> InitializeResponse {
    tracing::info!(
        client = %request.client_info.name,
        client_version = %request.client_info.version,
        protocol = %request.protocol_version,
        "client initialized"
    );

    let mut instructions = String::from(
        "Capgate exposes the toolsets enabled for this server. Use tools/list to see what is available.",
    );
    if read_only {
        instructions.push_str(" The server runs in read-only mode; mutating tools are hidden.");
    } else {
        instructions.push_str(" Confirm destructive actions before calling mutating tools.");
    }

    InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ListChanged { list_changed: false },
            resources: Some(ResourcesCapabilities {
                subscribe: false,
                list_changed: false,
            }),
            prompts: Some(ListChanged { list_changed: false }),
        },
        server_info: ServerInfo {
            name: "capgate-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions,
    }
}
