use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    deapi::{
        self, DeapiClient, Lora, Txt2ImgPayload, resolve_api_key,
    },
    store::{GenerationCache, GenerationParams},
    tools::{failure_result, json_tool_result},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageRequest {
    #[schemars(description = "图片生成提示词，描述想要生成的图片内容")]
    pub prompt: String,
    #[schemars(description = "使用的模型名称，默认 Flux1schnell")]
    pub model: Option<String>,
    #[schemars(description = "图片宽度（像素），默认 768")]
    pub width: Option<u32>,
    #[schemars(description = "图片高度（像素），默认 768")]
    pub height: Option<u32>,
    #[schemars(description = "随机种子，用于复现结果，-1 表示随机。默认 -1")]
    pub seed: Option<i64>,
    #[schemars(description = "推理步数，默认 4。更多步数通常质量更好但速度更慢")]
    pub steps: Option<u32>,
    #[schemars(description = "Guidance scale，控制生成图片与提示词的匹配程度。默认 7.5")]
    pub guidance: Option<f64>,
    #[schemars(description = "LoRA 模型数组，用于应用额外的风格或特征")]
    pub loras: Option<Vec<Lora>>,
    #[schemars(description = "负面提示词，用于排除不想要的内容")]
    pub negative_prompt: Option<String>,
    #[schemars(description = "API 密钥，不提供则使用环境变量 DEAPI_API_KEY")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageQuickRequest {
    #[schemars(description = "图片生成提示词，描述想要生成的图片内容")]
    pub prompt: String,
    #[schemars(description = "API 密钥，不提供则使用环境变量 DEAPI_API_KEY")]
    pub api_key: Option<String>,
}

/// 提交 txt2img 生成请求。成功时返回 {data: {request_id}}，
/// 并把本次参数缓存起来，供 download_image 写 metadata 时使用。
pub async fn generate_image(
    client: &DeapiClient,
    cache: &GenerationCache,
    Parameters(request): Parameters<GenerateImageRequest>,
) -> Result<CallToolResult, McpError> {
    let api_key = match resolve_api_key(request.api_key.as_deref()) {
        Ok(key) => key,
        Err(failure) => return failure_result(&failure),
    };

    let payload = Txt2ImgPayload {
        prompt: request.prompt,
        model: request
            .model
            .unwrap_or_else(|| deapi::DEFAULT_MODEL.to_string()),
        width: request.width.unwrap_or(deapi::DEFAULT_WIDTH),
        height: request.height.unwrap_or(deapi::DEFAULT_HEIGHT),
        steps: request.steps.unwrap_or(deapi::DEFAULT_STEPS),
        seed: request.seed.unwrap_or(deapi::DEFAULT_SEED),
        guidance: request.guidance.unwrap_or(deapi::DEFAULT_GUIDANCE),
        loras: request.loras.unwrap_or_default(),
        negative_prompt: request.negative_prompt,
    };

    let response = match client.submit_txt2img(&payload, &api_key).await {
        Ok(response) => response,
        Err(failure) => return failure_result(&failure),
    };

    // 拿到 request_id 后缓存生成参数，下载时消费
    if let Some(request_id) = response
        .data
        .as_ref()
        .and_then(|data| data.request_id.clone())
    {
        cache.insert(
            request_id,
            GenerationParams {
                prompt: payload.prompt.clone(),
                model: payload.model.clone(),
                width: payload.width,
                height: payload.height,
                seed: payload.seed,
                steps: payload.steps,
                guidance: payload.guidance,
                loras: payload.loras.clone(),
                negative_prompt: payload.negative_prompt.clone(),
            },
        );
    }

    json_tool_result(&response)
}

/// generate_image 的简化版本，全部使用默认参数
pub async fn generate_image_quick(
    client: &DeapiClient,
    cache: &GenerationCache,
    Parameters(request): Parameters<GenerateImageQuickRequest>,
) -> Result<CallToolResult, McpError> {
    generate_image(
        client,
        cache,
        Parameters(GenerateImageRequest {
            prompt: request.prompt,
            model: None,
            width: None,
            height: None,
            seed: None,
            steps: None,
            guidance: None,
            loras: None,
            negative_prompt: None,
            api_key: request.api_key,
        }),
    )
    .await
}
