use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::deapi::DeapiClient;
use crate::store::{GenerationCache, MetadataStore};
use crate::tools::{
    DownloadImageRequest, GenerateImageQuickRequest, GenerateImageRequest,
    GetRequestStatusRequest, SearchGeneratedImagesRequest,
};

#[derive(Clone)]
pub struct Txt2ImgServer {
    tool_router: ToolRouter<Self>,
    client: DeapiClient,
    cache: Arc<GenerationCache>,
    store: Arc<MetadataStore>,
}

impl Txt2ImgServer {
    pub fn new(client: DeapiClient, cache: Arc<GenerationCache>, store: Arc<MetadataStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            client,
            cache,
            store,
        }
    }
}

#[tool_router]
impl Txt2ImgServer {
    #[tool(
        description = "使用 deapi.ai API 生成图片。这是异步接口，返回 request_id，需要用 get_request_status 查询进度，用 download_image 下载结果"
    )]
    async fn generate_image(
        &self,
        Parameters(request): Parameters<GenerateImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_image(&self.client, &self.cache, Parameters(request)).await
    }

    #[tool(description = "快速生成图片（全部使用默认参数），generate_image 的简化版本")]
    async fn generate_image_quick(
        &self,
        Parameters(request): Parameters<GenerateImageQuickRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_image_quick(&self.client, &self.cache, Parameters(request)).await
    }

    #[tool(
        description = "查询图片生成请求的状态，status 为 pending、processing、done 或 failed"
    )]
    async fn get_request_status(
        &self,
        Parameters(request): Parameters<GetRequestStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::get_request_status(&self.client, Parameters(request)).await
    }

    #[tool(
        description = "下载生成完成的图片到本地，并保存 metadata 以便未来搜索和再利用。图片未完成时返回当前进度"
    )]
    async fn download_image(
        &self,
        Parameters(request): Parameters<DownloadImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::download_image(&self.client, &self.cache, &self.store, Parameters(request))
            .await
    }

    #[tool(description = "按关键词、模型、标签搜索已生成图片的 metadata")]
    async fn search_generated_images(
        &self,
        Parameters(request): Parameters<SearchGeneratedImagesRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::search_generated_images(&self.store, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for Txt2ImgServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
