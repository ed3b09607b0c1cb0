use std::path::PathBuf;

use chrono::Utc;
use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{
    deapi::{self, ApiFailure, DeapiClient, Lora, resolve_api_key},
    store::{GenerationCache, ImageMetadata, MetadataStore},
    tools::{failure_result, json_tool_result, validate_http_url},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadImageRequest {
    #[schemars(description = "生成请求的 ID（generate_image 返回的 request_id）")]
    pub request_id: String,
    #[schemars(
        description = "保存图片的路径。不提供则使用默认路径 static/images/ai-generated/{request_id}.png"
    )]
    pub save_path: Option<String>,
    #[schemars(description = "API 密钥，不提供则使用环境变量 DEAPI_API_KEY")]
    pub api_key: Option<String>,
    #[schemars(description = "图片生成提示词（用于保存 metadata）")]
    pub prompt: Option<String>,
    #[schemars(description = "使用的模型（用于保存 metadata）")]
    pub model: Option<String>,
    #[schemars(description = "图片宽度（用于保存 metadata）")]
    pub width: Option<u32>,
    #[schemars(description = "图片高度（用于保存 metadata）")]
    pub height: Option<u32>,
    #[schemars(description = "随机种子（用于保存 metadata）")]
    pub seed: Option<i64>,
    #[schemars(description = "推理步数（用于保存 metadata）")]
    pub steps: Option<u32>,
    #[schemars(description = "Guidance scale（用于保存 metadata）")]
    pub guidance: Option<f64>,
    #[schemars(description = "LoRA 模型数组（用于保存 metadata）")]
    pub loras: Option<Vec<Lora>>,
    #[schemars(description = "负面提示词（用于保存 metadata）")]
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadPending {
    success: bool,
    status: String,
    progress: f64,
    message: String,
}

#[derive(Debug, Serialize)]
struct DownloadSuccess {
    success: bool,
    file_path: String,
    status: String,
    url: String,
    metadata_saved: bool,
}

/// 下载生成完成的图片。先查状态，未完成时把当前进度返回给调用方；
/// 完成时拉取 result_url 写入本地，并在能拿到 prompt 时保存 metadata。
pub async fn download_image(
    client: &DeapiClient,
    cache: &GenerationCache,
    store: &MetadataStore,
    Parameters(request): Parameters<DownloadImageRequest>,
) -> Result<CallToolResult, McpError> {
    let api_key = match resolve_api_key(request.api_key.as_deref()) {
        Ok(key) => key,
        Err(failure) => return failure_result(&failure),
    };

    let status_response = match client.request_status(&request.request_id, &api_key).await {
        Ok(response) => response,
        Err(failure) => return failure_result(&failure),
    };
    let Some(data) = status_response.data else {
        return failure_result(&ApiFailure {
            error: "Invalid response".to_string(),
            message: "响应中缺少 data 字段".to_string(),
            details: None,
        });
    };

    let status = data.status.unwrap_or_default();
    if status != "done" {
        return json_tool_result(&DownloadPending {
            success: false,
            status: status.clone(),
            progress: data.progress.unwrap_or(0.0),
            message: format!("图片还在生成中（状态：{status}），请稍后再试"),
        });
    }

    let Some(result_url) = data.result_url.filter(|value| !value.is_empty()) else {
        return failure_result(&ApiFailure {
            error: "No result URL".to_string(),
            message: "状态为 done 但未找到 result_url".to_string(),
            details: None,
        });
    };
    if let Err(failure) = validate_http_url(&result_url) {
        return failure_result(&failure);
    }

    let save_file = match request.save_path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => store.default_image_path(&request.request_id),
    };

    let bytes = match client.fetch_result(&result_url, &api_key).await {
        Ok(bytes) => bytes,
        Err(failure) => return failure_result(&failure),
    };
    if let Some(parent) = save_file.parent() {
        fs::create_dir_all(parent).await.map_err(|err| {
            McpError::internal_error(
                "create image directory failed",
                Some(serde_json::Value::String(err.to_string())),
            )
        })?;
    }
    fs::write(&save_file, &bytes).await.map_err(|err| {
        McpError::internal_error(
            "save image failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;

    // 生成参数优先级：显式参数 > 提交时的缓存 > 固定默认值
    let cached = cache.take(&request.request_id);
    let gen_prompt = request
        .prompt
        .clone()
        .or_else(|| cached.as_ref().map(|params| params.prompt.clone()));

    let mut metadata_saved = false;
    if let Some(prompt) = gen_prompt {
        let metadata = ImageMetadata {
            request_id: request.request_id.clone(),
            prompt,
            model: request
                .model
                .clone()
                .or_else(|| cached.as_ref().map(|params| params.model.clone()))
                .unwrap_or_else(|| deapi::DEFAULT_MODEL.to_string()),
            width: request
                .width
                .or(cached.as_ref().map(|params| params.width))
                .unwrap_or(deapi::DEFAULT_WIDTH),
            height: request
                .height
                .or(cached.as_ref().map(|params| params.height))
                .unwrap_or(deapi::DEFAULT_HEIGHT),
            seed: request
                .seed
                .or(cached.as_ref().map(|params| params.seed))
                .unwrap_or(deapi::DEFAULT_SEED),
            steps: request
                .steps
                .or(cached.as_ref().map(|params| params.steps))
                .unwrap_or(deapi::DEFAULT_STEPS),
            guidance: request
                .guidance
                .or(cached.as_ref().map(|params| params.guidance))
                .unwrap_or(deapi::DEFAULT_GUIDANCE),
            loras: request
                .loras
                .clone()
                .filter(|loras| !loras.is_empty())
                .or_else(|| cached.as_ref().map(|params| params.loras.clone()))
                .unwrap_or_default(),
            negative_prompt: request
                .negative_prompt
                .clone()
                .or_else(|| cached.as_ref().and_then(|params| params.negative_prompt.clone())),
            result_url: result_url.clone(),
            file_path: save_file.display().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            tags: Vec::new(),
            description: String::new(),
        };
        store.save(&metadata).await.map_err(|err| {
            McpError::internal_error(
                "save image metadata failed",
                Some(serde_json::Value::String(err.to_string())),
            )
        })?;
        metadata_saved = true;
    }

    json_tool_result(&DownloadSuccess {
        success: true,
        file_path: save_file.display().to_string(),
        status: "done".to_string(),
        url: result_url,
        metadata_saved,
    })
}
