//! MCP Server implementation
//!
//! Exposes [`EnvManager`] operations as MCP tools using the rmcp SDK.

use std::sync::Arc;

use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
    PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult,
    ResourceContents, ResourcesCapability, ServerCapabilities, ServerInfo, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{tool, Error as McpError, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::environment::{EnvManager, FileContent, PackageInfo};
use crate::error::{EnvError, ErrorInfo};

/// URI of the environment listing resource
pub const ENVS_RESOURCE_URI: &str = "envs://list";

const INSTRUCTIONS: &str = "You are an expert Python environment manager and code executor.

ENVIRONMENT PERSISTENCE:
- You MUST use exactly ONE `env_id` for the entire conversation.
- DO NOT create multiple environment IDs.
- DO NOT create a new environment for each request.
- The server handles environment creation automatically on your first call.
- Reuse your chosen `env_id` in all subsequent tool calls (execute_python, write_file, etc).

FILE RETRIEVAL & DISPLAY:
- Whenever code execution or file operations create or identify a file \
(especially images like .png, .jpg), you MUST call `read_file` to retrieve \
and show it to the user.
- NEVER just print the absolute path to the user; they cannot see local files on your host.
- If a tool result contains a file path, immediately follow up with `read_file` \
for that specific file.";

/// MCP Server for persistent Python environments
#[derive(Clone)]
pub struct PythonExecutorServer {
    manager: Arc<EnvManager>,
}

impl PythonExecutorServer {
    /// Create a server around an existing manager
    pub fn new(manager: Arc<EnvManager>) -> Self {
        Self { manager }
    }

    /// Create a server backed by the real uv binary
    pub fn with_config(config: &Config) -> Self {
        Self::new(Arc::new(EnvManager::from_config(config)))
    }

    pub fn manager(&self) -> &EnvManager {
        &self.manager
    }

    fn environments_json(&self) -> Result<String, EnvError> {
        let response = ListEnvsResponse {
            environments: self.manager.list_envs()?,
        };
        Ok(serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string()))
    }
}

// === Tool Parameter Types ===

/// Parameters for execute_python tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecutePythonParams {
    /// Environment ID; reuse the same one for the whole conversation
    pub env_id: String,

    /// Python source written to `filename` before running
    #[serde(default)]
    pub code: Option<String>,

    /// File to write and run (defaults to main.py)
    #[serde(default)]
    pub filename: Option<String>,

    /// Packages to `uv add` before running
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Parameters for write_file tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    pub env_id: String,
    /// Path relative to the environment root
    pub filename: String,
    pub content: String,
}

/// Parameters for tools addressing one file
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileParams {
    pub env_id: String,
    /// Path relative to the environment root
    pub filename: String,
}

/// Parameters for tools addressing one environment
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EnvParams {
    pub env_id: String,
}

/// Parameters for package tools
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackagesParams {
    pub env_id: String,
    /// Requirement specs, e.g. "requests" or "numpy>=2"
    pub packages: Vec<String>,
}

/// Parameters for create_env tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEnvParams {
    pub env_id: String,
    /// Packages to install right away
    #[serde(default)]
    pub packages: Vec<String>,
}

// === Tool Response Types ===

/// Response from execute_python tool
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub hint: String,
}

/// Response from write_file tool
#[derive(Debug, Serialize)]
pub struct WriteFileResponse {
    pub status: &'static str,
    pub filename: String,
    pub bytes_written: usize,
    pub hint: String,
}

/// Response from list_files tool
#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub env_id: String,
    pub files: Vec<String>,
}

/// Response from install_packages and remove_packages tools
#[derive(Debug, Serialize)]
pub struct PackagesChangedResponse {
    pub status: &'static str,
    pub env_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
}

/// Response from list_packages tool
#[derive(Debug, Serialize)]
pub struct ListPackagesResponse {
    pub env_id: String,
    pub packages: Vec<PackageInfo>,
}

/// Response from list_envs tool and the envs resource
#[derive(Debug, Serialize)]
pub struct ListEnvsResponse {
    pub environments: Vec<String>,
}

/// Response from delete_env tool
#[derive(Debug, Serialize)]
pub struct DeleteEnvResponse {
    pub status: &'static str,
    pub env_id: String,
}

/// Response from get_file_path tool
#[derive(Debug, Serialize)]
pub struct FilePathResponse {
    pub absolute_path: String,
}

/// Error payload for failed tools
#[derive(Debug, Serialize)]
struct ToolError {
    success: bool,
    error: String,
    error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

impl ToolError {
    fn result(err: &EnvError) -> CallToolResult {
        let info = ErrorInfo::from(err);
        tracing::debug!("Tool failed ({}): {}", info.error_type, info.message);

        let body = ToolError {
            success: false,
            error: info.message,
            error_type: info.error_type,
            suggestion: info.suggestion,
            exit_code: info.exit_code,
            stderr: info.stderr,
        };
        let json = serde_json::to_string_pretty(&body)
            .unwrap_or_else(|_| json!({"success": false, "error": err.to_string()}).to_string());
        CallToolResult::error(vec![Content::text(json)])
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Map a manager result to a tool result
fn respond<T, R: Serialize>(
    result: Result<T, EnvError>,
    f: impl FnOnce(T) -> R,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => json_result(&f(value)),
        Err(e) => Ok(ToolError::result(&e)),
    }
}

// === MCP Tool Implementations ===

#[tool(tool_box)]
impl PythonExecutorServer {
    #[tool(
        description = "Execute Python code in a persistent environment. If code is provided, it will be written to filename (default main.py) before execution. If images/files are generated, you MUST follow up with read_file to display them."
    )]
    pub async fn execute_python(
        &self,
        #[tool(aggr)] params: ExecutePythonParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .execute_python(
                &params.env_id,
                params.code.as_deref(),
                params.filename.as_deref(),
                &params.packages,
            )
            .await;

        let env_id = params.env_id;
        respond(result, |out| ExecuteResponse {
            stdout: out.stdout,
            stderr: out.stderr,
            exit_code: out.exit_code,
            hint: format!(
                "If images or data files were generated, call read_file(env_id='{}', filename='...') to show them.",
                env_id
            ),
        })
    }

    #[tool(
        description = "Write a file to an environment. After writing, you MUST use read_file to show the content to the user if needed."
    )]
    pub async fn write_file(
        &self,
        #[tool(aggr)] params: WriteFileParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .write_file(&params.env_id, &params.filename, &params.content)
            .await;

        respond(result, |bytes_written| WriteFileResponse {
            status: "success",
            hint: format!(
                "To show this file to the user, call read_file(env_id='{}', filename='{}')",
                params.env_id, params.filename
            ),
            filename: params.filename.clone(),
            bytes_written,
        })
    }

    /// Images come back as MCP image content, everything else as JSON text
    #[tool(
        description = "Read a file from an environment. Use this to show images, data, or code contents to the user. Returns structured data for text/binary files and image content for images."
    )]
    pub async fn read_file(
        &self,
        #[tool(aggr)] params: FileParams,
    ) -> Result<CallToolResult, McpError> {
        match self.manager.read_file(&params.env_id, &params.filename).await {
            Ok(FileContent::Image { mime_type, data }) => {
                Ok(CallToolResult::success(vec![Content::image(data, mime_type)]))
            }
            Ok(FileContent::Document(doc)) => json_result(&doc),
            Err(e) => Ok(ToolError::result(&e)),
        }
    }

    #[tool(
        description = "List all files in an environment (excluding virtualenv). Use this to discover files that might need to be read via read_file."
    )]
    pub async fn list_files(
        &self,
        #[tool(aggr)] params: EnvParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self.manager.list_files(&params.env_id).await;
        respond(result, |files| ListFilesResponse {
            env_id: params.env_id,
            files,
        })
    }

    #[tool(description = "Install packages into a persistent environment.")]
    pub async fn install_packages(
        &self,
        #[tool(aggr)] params: PackagesParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .install_packages(&params.env_id, &params.packages)
            .await;
        respond(result, |()| PackagesChangedResponse {
            status: "success",
            env_id: params.env_id,
            installed: Some(params.packages),
            removed: None,
        })
    }

    #[tool(description = "Remove packages from a persistent environment.")]
    pub async fn remove_packages(
        &self,
        #[tool(aggr)] params: PackagesParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .remove_packages(&params.env_id, &params.packages)
            .await;
        respond(result, |()| PackagesChangedResponse {
            status: "success",
            env_id: params.env_id,
            installed: None,
            removed: Some(params.packages),
        })
    }

    #[tool(description = "List all installed packages in a persistent environment.")]
    pub async fn list_packages(
        &self,
        #[tool(aggr)] params: EnvParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self.manager.list_packages(&params.env_id).await;
        respond(result, |packages| ListPackagesResponse {
            env_id: params.env_id,
            packages,
        })
    }

    #[tool(description = "List all persistent environments.")]
    pub async fn list_envs(&self) -> Result<CallToolResult, McpError> {
        respond(self.manager.list_envs(), |environments| ListEnvsResponse {
            environments,
        })
    }

    #[tool(description = "Delete a persistent environment.")]
    pub async fn delete_env(
        &self,
        #[tool(aggr)] params: EnvParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self.manager.delete_env(&params.env_id).await;
        respond(result, |()| DeleteEnvResponse {
            status: "deleted",
            env_id: params.env_id,
        })
    }

    #[tool(
        description = "Create a persistent environment, optionally installing packages. Environments are also created automatically on first use."
    )]
    pub async fn create_env(
        &self,
        #[tool(aggr)] params: CreateEnvParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .create_env(&params.env_id, &params.packages)
            .await;
        respond(result, |outcome| outcome)
    }

    #[tool(
        description = "Get the absolute host path of a file in an environment. Do not show this path to the user; use read_file to display the file instead."
    )]
    pub async fn get_file_path(
        &self,
        #[tool(aggr)] params: FileParams,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .manager
            .get_file_path(&params.env_id, &params.filename)
            .await;
        respond(result, |path| FilePathResponse {
            absolute_path: path.to_string_lossy().into_owned(),
        })
    }
}

#[tool(tool_box)]
impl ServerHandler for PythonExecutorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "mcp-python-executor".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_resources(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![RawResource::new(ENVS_RESOURCE_URI, "environments").no_annotation()],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if request.uri != ENVS_RESOURCE_URI {
            return Err(McpError::resource_not_found(
                "resource not found",
                Some(json!({ "uri": request.uri })),
            ));
        }

        let text = self
            .environments_json()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
