use reqwest::Client;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEAPI_BASE_URL: &str = "https://api.deapi.ai";
const TXT2IMG_PATH: &str = "/api/v1/client/txt2img";
const REQUEST_STATUS_PATH: &str = "/api/v1/client/request-status";

// 未配置时的占位符，与 .env.example 保持一致
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";

// 与上游 API 文档一致的生成参数默认值
pub const DEFAULT_MODEL: &str = "Flux1schnell";
pub const DEFAULT_WIDTH: u32 = 768;
pub const DEFAULT_HEIGHT: u32 = 768;
pub const DEFAULT_SEED: i64 = -1;
pub const DEFAULT_STEPS: u32 = 4;
pub const DEFAULT_GUIDANCE: f64 = 7.5;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// 统一的失败返回结构，作为数据返回给调用方，不抛协议错误
#[derive(Debug, Clone, Serialize)]
pub struct ApiFailure {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiFailure {
    pub fn api_key_not_configured() -> Self {
        Self {
            error: "API key not configured".to_string(),
            message: "Please set DEAPI_API_KEY environment variable or provide api_key parameter"
                .to_string(),
            details: None,
        }
    }

    fn http_status(status: reqwest::StatusCode, body: String) -> Self {
        Self {
            error: format!("HTTP {}", status.as_u16()),
            message: body,
            details: Some(status.to_string()),
        }
    }

    fn request_failed(err: reqwest::Error) -> Self {
        Self {
            error: "Request failed".to_string(),
            message: err.to_string(),
            details: None,
        }
    }

    fn download_failed(err: reqwest::Error) -> Self {
        Self {
            error: "Download failed".to_string(),
            message: err.to_string(),
            details: None,
        }
    }

    fn invalid_response(err: impl std::fmt::Display) -> Self {
        Self {
            error: "Invalid response".to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// 解析本次调用实际使用的 API key：参数优先，其次环境变量 DEAPI_API_KEY。
/// 占位符或空值视为未配置，直接返回失败，不发起任何网络请求。
pub fn resolve_api_key(api_key: Option<&str>) -> Result<String, ApiFailure> {
    let from_arg = api_key.map(str::trim).filter(|value| !value.is_empty());
    let from_env = std::env::var("DEAPI_API_KEY").ok();
    let auth_key = match from_arg {
        Some(value) => value.to_string(),
        None => from_env.unwrap_or_else(|| API_KEY_PLACEHOLDER.to_string()),
    };
    let auth_key = auth_key.trim().to_string();
    if auth_key.is_empty() || auth_key == API_KEY_PLACEHOLDER {
        return Err(ApiFailure::api_key_not_configured());
    }
    Ok(auth_key)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Lora {
    #[schemars(description = "LoRA 模型名称")]
    pub name: String,
    #[schemars(description = "LoRA 权重，必须 >= 0")]
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct Txt2ImgPayload {
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: i64,
    pub guidance: f64,
    pub loras: Vec<Lora>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Txt2ImgResponse {
    pub data: Option<Txt2ImgData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Txt2ImgData {
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestStatusResponse {
    pub data: Option<RequestStatusData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestStatusData {
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub preview: Option<String>,
    pub result_url: Option<String>,
    pub result: Option<String>,
}

#[derive(Clone)]
pub struct DeapiClient {
    http: Client,
    base_url: String,
}

impl Default for DeapiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DeapiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEAPI_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 提交 txt2img 生成请求，成功时返回包含 request_id 的响应
    pub async fn submit_txt2img(
        &self,
        payload: &Txt2ImgPayload,
        api_key: &str,
    ) -> Result<Txt2ImgResponse, ApiFailure> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, TXT2IMG_PATH))
            .timeout(GENERATION_TIMEOUT)
            .header("accept", "application/json")
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
            .map_err(ApiFailure::request_failed)?;
        let response = assert_ok_response(response).await?;
        response
            .json::<Txt2ImgResponse>()
            .await
            .map_err(ApiFailure::invalid_response)
    }

    /// 查询生成请求的状态
    pub async fn request_status(
        &self,
        request_id: &str,
        api_key: &str,
    ) -> Result<RequestStatusResponse, ApiFailure> {
        let response = self
            .http
            .get(format!(
                "{}{}/{}",
                self.base_url, REQUEST_STATUS_PATH, request_id
            ))
            .timeout(STATUS_TIMEOUT)
            .header("accept", "application/json")
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(ApiFailure::request_failed)?;
        let response = assert_ok_response(response).await?;
        response
            .json::<RequestStatusResponse>()
            .await
            .map_err(ApiFailure::invalid_response)
    }

    /// 下载 result_url 指向的图片字节
    pub async fn fetch_result(
        &self,
        result_url: &str,
        api_key: &str,
    ) -> Result<Vec<u8>, ApiFailure> {
        eprintln!("[DEBUG] fetch_result: downloading {result_url}");
        let response = self
            .http
            .get(result_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(ApiFailure::download_failed)?;
        let response = assert_ok_response(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(ApiFailure::download_failed)?;
        Ok(bytes.to_vec())
    }
}

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response, ApiFailure> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    eprintln!("[DEBUG] deapi request failed: {status} {body}");
    Err(ApiFailure::http_status(status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env_key() {
        unsafe { std::env::remove_var("DEAPI_API_KEY") };
    }

    #[test]
    fn resolve_api_key_prefers_argument() {
        clear_env_key();
        let key = resolve_api_key(Some("sk-arg")).unwrap();
        assert_eq!(key, "sk-arg");
    }

    #[test]
    fn resolve_api_key_rejects_placeholder() {
        clear_env_key();
        let failure = resolve_api_key(Some(API_KEY_PLACEHOLDER)).unwrap_err();
        assert_eq!(failure.error, "API key not configured");
    }

    #[test]
    fn resolve_api_key_rejects_missing() {
        clear_env_key();
        let failure = resolve_api_key(None).unwrap_err();
        assert_eq!(failure.error, "API key not configured");
    }

    #[test]
    fn payload_omits_missing_negative_prompt() {
        let payload = Txt2ImgPayload {
            prompt: "a cat".to_string(),
            model: "Flux1schnell".to_string(),
            width: 768,
            height: 768,
            steps: 4,
            seed: -1,
            guidance: 7.5,
            loras: Vec::new(),
            negative_prompt: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("negative_prompt").is_none());
        assert_eq!(json["loras"], serde_json::json!([]));
        assert_eq!(json["seed"], serde_json::json!(-1));
    }
}
