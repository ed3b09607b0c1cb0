use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};

use crate::{
    deapi::ApiFailure,
    store::{ImageMetadata, MetadataStore, search_index},
    tools::{failure_result, json_tool_result},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchGeneratedImagesRequest {
    #[schemars(description = "搜索关键词，会在 prompt 和 description 中搜索")]
    pub query: Option<String>,
    #[schemars(description = "模型名称过滤（精确匹配）")]
    pub model: Option<String>,
    #[schemars(description = "标签过滤，命中任意一个标签即通过")]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "返回结果数量限制，默认 10")]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    count: usize,
    images: Vec<ImageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// 按关键词、模型、标签搜索已保存的图片 metadata
pub async fn search_generated_images(
    store: &MetadataStore,
    Parameters(request): Parameters<SearchGeneratedImagesRequest>,
) -> Result<CallToolResult, McpError> {
    let limit = request.limit.unwrap_or(10) as usize;

    let index = match store.load_index().await {
        Ok(Some(index)) => index,
        Ok(None) => {
            // 索引不存在说明还没保存过任何图片，不算错误
            return json_tool_result(&SearchResponse {
                count: 0,
                images: Vec::new(),
                message: Some("还没有保存任何图片 metadata".to_string()),
            });
        }
        Err(err) => {
            return failure_result(&ApiFailure {
                error: "Search failed".to_string(),
                message: err.to_string(),
                details: None,
            });
        }
    };

    let results = search_index(
        &index,
        request.query.as_deref(),
        request.model.as_deref(),
        request.tags.as_deref(),
        limit,
    );
    json_tool_result(&SearchResponse {
        count: results.len(),
        images: results,
        message: None,
    })
}
