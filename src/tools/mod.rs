pub mod download_image;
pub mod generate_image;
pub mod request_status;
pub mod search_images;
pub mod url_validation;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::deapi::ApiFailure;

pub use download_image::{download_image, DownloadImageRequest};
pub use generate_image::{
    generate_image, generate_image_quick, GenerateImageQuickRequest, GenerateImageRequest,
};
pub use request_status::{get_request_status, GetRequestStatusRequest};
pub use search_images::{search_generated_images, SearchGeneratedImagesRequest};
pub use url_validation::validate_http_url;

/// 把工具返回的数据序列化为文本内容。成功与失败都走这条路：
/// 失败以 {error, message} 结构返回，不抛 MCP 协议错误。
pub fn json_tool_result<T: Serialize>(payload: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(payload).map_err(|err| {
        McpError::internal_error(
            "serialize tool response failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub fn failure_result(failure: &ApiFailure) -> Result<CallToolResult, McpError> {
    json_tool_result(failure)
}
