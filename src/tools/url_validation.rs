use url::Url;

use crate::deapi::ApiFailure;

/// 校验上游返回的 result_url，只允许 http/https
pub fn validate_http_url(raw: &str) -> Result<Url, ApiFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiFailure {
            error: "Invalid response".to_string(),
            message: "result_url 为空".to_string(),
            details: None,
        });
    }
    let parsed = Url::parse(trimmed).map_err(|err| ApiFailure {
        error: "Invalid response".to_string(),
        message: "result_url 格式无效".to_string(),
        details: Some(err.to_string()),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ApiFailure {
            error: "Invalid response".to_string(),
            message: "result_url 仅允许http或https协议".to_string(),
            details: Some(format!("当前协议: {scheme}")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        let url = validate_http_url("https://cdn.deapi.ai/results/req-1.png").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn rejects_other_schemes() {
        let failure = validate_http_url("file:///etc/passwd").unwrap_err();
        assert_eq!(failure.error, "Invalid response");
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_http_url("   ").is_err());
    }
}
