use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    deapi::{DeapiClient, resolve_api_key},
    tools::{failure_result, json_tool_result},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRequestStatusRequest {
    #[schemars(description = "生成请求的 ID（generate_image 返回的 request_id）")]
    pub request_id: String,
    #[schemars(description = "API 密钥，不提供则使用环境变量 DEAPI_API_KEY")]
    pub api_key: Option<String>,
}

/// 查询生成请求的状态。status 不为 done 时只是中间状态，
/// 这里不做任何下载或 metadata 写入。
pub async fn get_request_status(
    client: &DeapiClient,
    Parameters(request): Parameters<GetRequestStatusRequest>,
) -> Result<CallToolResult, McpError> {
    let api_key = match resolve_api_key(request.api_key.as_deref()) {
        Ok(key) => key,
        Err(failure) => return failure_result(&failure),
    };
    match client.request_status(&request.request_id, &api_key).await {
        Ok(response) => json_tool_result(&response),
        Err(failure) => failure_result(&failure),
    }
}
