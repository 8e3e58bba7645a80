//! Request dispatch. Every request is answered from a registry narrowed to
//! the method and item it names, so hidden capabilities are never listed or
//! invoked.

use capgate_registry::{
    HandlerRef, McpMethod, Registry, RequestContext, MCP_METHOD_PROMPTS_GET, MCP_METHOD_RESOURCES_READ,
    MCP_METHOD_TOOLS_CALL,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::initialize;
use crate::protocol::{
    error, success, InitializeRequest, JsonRpcRequest, JsonRpcResponse, PromptsGetRequest, PromptsListResponse,
    ResourceTemplatesListResponse, ResourcesReadRequest, ToolsCallRequest, ToolsCallResponse, ToolsListResponse,
    INVALID_PARAMS, METHOD_NOT_FOUND, UPSTREAM_ERROR,
};
use crate::upstream::UpstreamFault;

pub struct Server {
    registry: Registry,
}

impl Server {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Handle one request. Notifications (no `id`) get no response.
    pub async fn handle(&self, request: JsonRpcRequest, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification received");
            return None;
        };

        let response = match McpMethod::parse(&request.method) {
            Some(McpMethod::Initialize) => match serde_json::from_value::<InitializeRequest>(request.params) {
                Ok(init) => to_success(id, initialize::handle_initialize(init, self.registry.is_read_only())),
                Err(e) => error(id, INVALID_PARAMS, format!("invalid initialize params: {}", e), None),
            },
            Some(McpMethod::ToolsList) => {
                let scoped = self.registry.for_mcp_request(McpMethod::ToolsList.as_str(), "");
                let tools = scoped
                    .available_tools(ctx)
                    .await
                    .into_iter()
                    .map(|t| t.definition.clone())
                    .collect();
                to_success(id, ToolsListResponse { tools, next_cursor: None })
            }
            Some(McpMethod::ResourcesTemplatesList) => {
                let scoped = self.registry.for_mcp_request(McpMethod::ResourcesTemplatesList.as_str(), "");
                let resource_templates = scoped
                    .available_resource_templates(ctx)
                    .await
                    .into_iter()
                    .map(|r| r.template.clone())
                    .collect();
                to_success(id, ResourceTemplatesListResponse { resource_templates })
            }
            Some(McpMethod::ResourcesList) => success(id, json!({ "resources": [] })),
            Some(McpMethod::PromptsList) => {
                let scoped = self.registry.for_mcp_request(McpMethod::PromptsList.as_str(), "");
                let prompts = scoped
                    .available_prompts(ctx)
                    .await
                    .into_iter()
                    .map(|p| p.prompt.clone())
                    .collect();
                to_success(id, PromptsListResponse { prompts })
            }
            Some(McpMethod::ToolsCall) => match serde_json::from_value::<ToolsCallRequest>(request.params) {
                Ok(call) => self.call_tool(id, call, ctx).await,
                Err(e) => error(id, INVALID_PARAMS, format!("invalid tools/call params: {}", e), None),
            },
            Some(McpMethod::ResourcesRead) => match serde_json::from_value::<ResourcesReadRequest>(request.params) {
                Ok(read) => self.read_resource(id, read, ctx).await,
                Err(e) => error(id, INVALID_PARAMS, format!("invalid resources/read params: {}", e), None),
            },
            Some(McpMethod::PromptsGet) => match serde_json::from_value::<PromptsGetRequest>(request.params) {
                Ok(get) => self.get_prompt(id, get, ctx).await,
                Err(e) => error(id, INVALID_PARAMS, format!("invalid prompts/get params: {}", e), None),
            },
            None => error(id, METHOD_NOT_FOUND, format!("method not found: {}", request.method), None),
        };
        Some(response)
    }

    async fn call_tool(&self, id: Value, call: ToolsCallRequest, ctx: &RequestContext) -> JsonRpcResponse {
        if call.name.is_empty() {
            return error(id, INVALID_PARAMS, "tools/call requires a tool name", None);
        }
        let scoped = self.registry.for_mcp_request(MCP_METHOD_TOOLS_CALL, &call.name);
        let canonical = self
            .registry
            .deprecated_aliases()
            .get(&call.name)
            .map_or(call.name.as_str(), String::as_str);
        let Some(tool) = only(scoped.available_tools(ctx).await, |t| t.definition.name == canonical) else {
            return error(id, METHOD_NOT_FOUND, format!("unknown tool: {}", call.name), None);
        };
        if tool.definition.name != call.name {
            warn!(requested = %call.name, canonical = %tool.definition.name, "deprecated tool name used");
        }

        let Some(handler) = tool.handler() else {
            return error(id, UPSTREAM_ERROR, format!("tool has no handler: {}", tool.definition.name), None);
        };
        match handler.handle(ctx, call.arguments).await {
            Ok(result) => to_success(id, ToolsCallResponse::text(compact(&result), false)),
            Err(e) => match e.downcast_ref::<UpstreamFault>() {
                Some(fault) => to_success(
                    id,
                    ToolsCallResponse::text(compact(&json!({ "error": fault.0 })), true),
                ),
                None => error(id, UPSTREAM_ERROR, e.to_string(), None),
            },
        }
    }

    async fn read_resource(&self, id: Value, read: ResourcesReadRequest, ctx: &RequestContext) -> JsonRpcResponse {
        if read.uri.is_empty() {
            return error(id, INVALID_PARAMS, "resources/read requires a uri", None);
        }
        let scoped = self.registry.for_mcp_request(MCP_METHOD_RESOURCES_READ, &read.uri);
        let available = scoped.available_resource_templates(ctx).await;
        let Some(template) = only(available, |r| r.template.matches(&read.uri)) else {
            return error(id, INVALID_PARAMS, format!("resource not found: {}", read.uri), None);
        };
        let mime_type = template.template.mime_type.clone().unwrap_or_else(|| "application/json".to_string());

        match forward(template.handler(), ctx, json!({ "uri": read.uri })).await {
            Ok(result) => success(
                id,
                json!({ "contents": [{ "uri": read.uri, "mimeType": mime_type, "text": compact(&result) }] }),
            ),
            Err(message) => error(id, UPSTREAM_ERROR, message, None),
        }
    }

    async fn get_prompt(&self, id: Value, get: PromptsGetRequest, ctx: &RequestContext) -> JsonRpcResponse {
        if get.name.is_empty() {
            return error(id, INVALID_PARAMS, "prompts/get requires a prompt name", None);
        }
        let scoped = self.registry.for_mcp_request(MCP_METHOD_PROMPTS_GET, &get.name);
        let available = scoped.available_prompts(ctx).await;
        let Some(prompt) = only(available, |p| p.prompt.name == get.name) else {
            return error(id, INVALID_PARAMS, format!("unknown prompt: {}", get.name), None);
        };

        match forward(prompt.handler(), ctx, get.arguments).await {
            Ok(result) => success(
                id,
                json!({
                    "description": prompt.prompt.description,
                    "messages": [{ "role": "user", "content": { "type": "text", "text": compact(&result) } }],
                }),
            ),
            Err(message) => error(id, UPSTREAM_ERROR, message, None),
        }
    }
}

/// The single capability a narrowed registry exposes, if it is the expected one.
fn only<'a, C>(available: Vec<&'a C>, expected: impl Fn(&C) -> bool) -> Option<&'a C> {
    match available.as_slice() {
        [one] if expected(*one) => Some(*one),
        _ => None,
    }
}

async fn forward(handler: Option<&HandlerRef>, ctx: &RequestContext, params: Value) -> Result<Value, String> {
    let Some(handler) = handler else {
        return Err("capability has no handler".to_string());
    };
    handler.handle(ctx, params).await.map_err(|e| e.to_string())
}

fn to_success<T: serde::Serialize>(id: Value, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => success(id, value),
        Err(e) => error(id, UPSTREAM_ERROR, format!("failed to encode result: {}", e), None),
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use capgate_registry::{
        Builder, Handler, HandlerError, Prompt, ResourceTemplate, ServerPrompt, ServerResourceTemplate, ServerTool,
        ToolDefinition, ToolsetMetadata,
    };

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _ctx: &RequestContext, params: Value) -> Result<Value, HandlerError> {
            Ok(json!({ "echo": params }))
        }
    }

    struct Denied;

    #[async_trait]
    impl Handler for Denied {
        async fn handle(&self, _ctx: &RequestContext, _params: Value) -> Result<Value, HandlerError> {
            Err(Box::new(UpstreamFault(json!({ "code": 1, "message": "denied" }))))
        }
    }

    fn tool(name: &str, toolset: &str, read_only: bool) -> ServerTool {
        ServerTool::new(
            ToolDefinition::new(name, format!("{name} tool")).with_read_only_hint(read_only),
            ToolsetMetadata::new(toolset, ""),
        )
        .with_handler(HandlerRef::new(Echo))
    }

    fn server(read_only: bool) -> Server {
        let registry = Builder::new()
            .set_tools(vec![
                tool("issue_read", "issues", true),
                tool("create_issue", "issues", false),
                tool("list_runs", "actions", true),
                ServerTool::new(
                    ToolDefinition::new("delete_repo", "").with_read_only_hint(false),
                    ToolsetMetadata::new("repos", ""),
                )
                .with_handler(HandlerRef::new(Denied)),
            ])
            .set_resource_templates(vec![ServerResourceTemplate::new(
                ResourceTemplate {
                    name: "issue".into(),
                    uri_template: "repo://{owner}/issues/{n}".into(),
                    description: None,
                    mime_type: None,
                },
                ToolsetMetadata::new("issues", ""),
            )
            .with_handler(HandlerRef::new(Echo))])
            .set_prompts(vec![ServerPrompt::new(
                Prompt {
                    name: "triage".into(),
                    description: Some("Triage".into()),
                    arguments: vec![],
                },
                ToolsetMetadata::new("issues", ""),
            )])
            .with_deprecated_aliases(HashMap::from([("get_issue".to_string(), "issue_read".to_string())]))
            .with_toolsets(&["issues", "repos"])
            .with_read_only(read_only)
            .build();
        Server::new(registry)
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params,
        }
    }

    async fn call(server: &Server, method: &str, params: Value) -> JsonRpcResponse {
        server
            .handle(request(method, params), &RequestContext::new())
            .await
            .unwrap()
    }

    fn tool_names(resp: &JsonRpcResponse) -> Vec<String> {
        resp.result.as_ref().unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_tools_list_respects_toolsets() {
        let resp = call(&server(false), "tools/list", Value::Null).await;
        assert_eq!(tool_names(&resp), vec!["create_issue", "issue_read", "delete_repo"]);
    }

    #[tokio::test]
    async fn test_tools_list_read_only_hides_mutating() {
        let resp = call(&server(true), "tools/list", Value::Null).await;
        assert_eq!(tool_names(&resp), vec!["issue_read"]);
    }

    #[tokio::test]
    async fn test_tools_call_resolves_alias() {
        let resp = call(&server(false), "tools/call", json!({"name": "get_issue", "arguments": {"n": 7}})).await;
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(false));
        assert_eq!(result["content"][0]["text"], json!(r#"{"echo":{"n":7}}"#));
    }

    #[tokio::test]
    async fn test_tools_call_hidden_tool_not_found() {
        let disabled_toolset = call(&server(false), "tools/call", json!({"name": "list_runs"})).await;
        assert_eq!(disabled_toolset.error.unwrap().code, METHOD_NOT_FOUND);

        let read_only = call(&server(true), "tools/call", json!({"name": "create_issue"})).await;
        assert_eq!(read_only.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_call_upstream_fault_is_tool_error() {
        let resp = call(&server(false), "tools/call", json!({"name": "delete_repo"})).await;
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_tools_call_invalid_params() {
        let resp = call(&server(false), "tools/call", json!({"arguments": {}})).await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_resource_templates_and_read() {
        let srv = server(false);
        let list = call(&srv, "resources/templates/list", Value::Null).await;
        assert_eq!(
            list.result.unwrap()["resourceTemplates"][0]["uriTemplate"],
            json!("repo://{owner}/issues/{n}")
        );

        let read = call(&srv, "resources/read", json!({"uri": "repo://{owner}/issues/{n}"})).await;
        assert!(read.result.is_some());

        let missing = call(&srv, "resources/read", json!({"uri": "repo://other"})).await;
        assert_eq!(missing.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_read_concrete_uri() {
        let read = call(&server(false), "resources/read", json!({"uri": "repo://octo/issues/7"})).await;
        let result = read.result.unwrap();
        assert_eq!(result["contents"][0]["uri"], json!("repo://octo/issues/7"));
        assert_eq!(result["contents"][0]["text"], json!(r#"{"echo":{"uri":"repo://octo/issues/7"}}"#));
    }

    #[tokio::test]
    async fn test_empty_item_parameter_is_rejected() {
        let srv = server(false);
        let cases = [
            ("tools/call", json!({"name": ""})),
            ("resources/read", json!({"uri": ""})),
            ("prompts/get", json!({"name": ""})),
        ];
        for (method, params) in cases {
            let resp = call(&srv, method, params).await;
            assert!(resp.result.is_none(), "{method} must not run a capability");
            assert_eq!(resp.error.unwrap().code, INVALID_PARAMS, "method {method}");
        }
    }

    #[tokio::test]
    async fn test_prompts_list_and_get_without_handler() {
        let srv = server(false);
        let list = call(&srv, "prompts/list", Value::Null).await;
        assert_eq!(list.result.unwrap()["prompts"][0]["name"], json!("triage"));

        let get = call(&srv, "prompts/get", json!({"name": "triage"})).await;
        assert_eq!(get.error.unwrap().code, UPSTREAM_ERROR);
    }

    #[tokio::test]
    async fn test_initialize_and_unknown_method() {
        let srv = server(true);
        let init = call(
            &srv,
            "initialize",
            json!({"protocolVersion": "2025-03-26", "clientInfo": {"name": "test", "version": "0"}}),
        )
        .await;
        let result = init.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], json!("capgate-mcp"));
        assert!(result["instructions"].as_str().unwrap().contains("read-only"));

        let unknown = call(&srv, "completion/complete", Value::Null).await;
        assert_eq!(unknown.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let mut req = request("notifications/initialized", Value::Null);
        req.id = None;
        assert!(server(false).handle(req, &RequestContext::new()).await.is_none());
    }
}
