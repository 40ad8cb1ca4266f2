//! AI enhancement client: one HTTP request per task to the enhancement service.
//!
//! The service exposes `POST <endpoint>/enhance` taking
//! `{content, task_type, options, aiConfig[, cssConfig]}` and answering
//! `{success, enhanced_content, error}`, plus `GET <endpoint>/api/health`.
//!
//! Every request is sent once with a timeout. There is no retry loop: a
//! failure is reported to the caller as an [`Md2PagesError`] and the caller
//! decides what to do.

use crate::config::{AiSettings, EnhanceConfig, EnhanceTask};
use crate::error::Md2PagesError;
use crate::style::CssHints;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest content the service accepts, in characters.
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Body of `POST /enhance`.
#[derive(Debug, Serialize)]
pub struct EnhanceRequest<'a> {
    pub content: &'a str,
    pub task_type: EnhanceTask,
    pub options: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "aiConfig")]
    pub ai_config: AiSettings,
    #[serde(rename = "cssConfig", skip_serializing_if = "Option::is_none")]
    pub css_config: Option<&'a CssHints>,
}

/// Body of the `POST /enhance` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnhanceResponse {
    pub success: bool,
    #[serde(default)]
    pub enhanced_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Error body FastAPI-style services use for 4xx/5xx answers.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// A whole response wrapped in a single code fence.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*)\n```\s*$").unwrap());

/// HTTP client for the enhancement service.
#[derive(Debug, Clone)]
pub struct EnhanceClient {
    http: reqwest::Client,
    config: EnhanceConfig,
}

impl EnhanceClient {
    /// Build a client; validates `config` first.
    pub fn new(config: EnhanceConfig) -> Result<Self, Md2PagesError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Md2PagesError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Run one task on `content` and return the service's output.
    ///
    /// `css` is sent as `cssConfig` for [`EnhanceTask::AutoCssStyle`] and
    /// ignored otherwise. A response wrapped in one code fence is unwrapped.
    pub async fn enhance(
        &self,
        task: EnhanceTask,
        content: &str,
        css: Option<&CssHints>,
    ) -> Result<String, Md2PagesError> {
        validate_content(content)?;
        let ai_config = self.request_settings()?;

        let request = EnhanceRequest {
            content,
            task_type: task,
            options: serde_json::Map::new(),
            ai_config,
            css_config: if task == EnhanceTask::AutoCssStyle {
                css
            } else {
                None
            },
        };

        let url = self.url("/enhance");
        info!(
            "Enhancement task {} ({} chars, model {})",
            task,
            content.chars().count(),
            request.ai_config.effective_model()
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(ErrorBody {
                    detail: serde_json::Value::String(s),
                }) => format!("HTTP {status}: {s}"),
                Ok(ErrorBody { detail }) => format!("HTTP {status}: {detail}"),
                Err(_) => format!("HTTP {status}"),
            };
            warn!("Enhancement task {} failed: {}", task, reason);
            return Err(Md2PagesError::EnhanceRequestFailed { url, reason });
        }

        let body: EnhanceResponse = response
            .json()
            .await
            .map_err(|e| Md2PagesError::EnhanceRequestFailed {
                url: url.clone(),
                reason: format!("malformed response: {e}"),
            })?;

        let output = interpret_response(task, body)?;
        debug!("Enhancement task {} returned {} chars", task, output.len());
        Ok(output)
    }

    /// Probe `<endpoint>/api/health`; true when the service reports healthy.
    pub async fn health(&self) -> Result<bool, Md2PagesError> {
        let url = self.url("/api/health");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        if !response.status().is_success() {
            debug!("Health check returned HTTP {}", response.status());
            return Ok(false);
        }
        let body: HealthResponse = match response.json().await {
            Ok(b) => b,
            Err(_) => return Ok(false),
        };
        Ok(body.status == "healthy")
    }

    /// Settings as sent on the wire: the API key resolved and required.
    fn request_settings(&self) -> Result<AiSettings, Md2PagesError> {
        let settings = &self.config.settings;
        settings
            .validate()
            .map_err(|e| Md2PagesError::EnhanceInvalid(e.to_string()))?;
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            Md2PagesError::EnhanceInvalid(format!(
                "no API key configured; set one or export {}",
                crate::config::API_KEY_ENV
            ))
        })?;
        Ok(AiSettings {
            api_key: Some(api_key),
            ..settings.clone()
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Md2PagesError {
        if e.is_timeout() {
            Md2PagesError::EnhanceTimeout {
                url: url.to_string(),
                secs: self.config.timeout_secs,
            }
        } else {
            Md2PagesError::EnhanceRequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Reject content the service would refuse anyway.
pub fn validate_content(content: &str) -> Result<(), Md2PagesError> {
    if content.trim().is_empty() {
        return Err(Md2PagesError::EnhanceInvalid("content is empty".into()));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(Md2PagesError::EnhanceInvalid(format!(
            "content is {chars} characters; the limit is {MAX_CONTENT_CHARS}"
        )));
    }
    Ok(())
}

/// Turn a decoded response into the task output.
fn interpret_response(task: EnhanceTask, body: EnhanceResponse) -> Result<String, Md2PagesError> {
    if !body.success {
        return Err(Md2PagesError::EnhanceRejected {
            task: task.to_string(),
            message: body.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    match body.enhanced_content {
        Some(content) if !content.trim().is_empty() => Ok(strip_outer_fences(&content)),
        _ => Err(Md2PagesError::EnhanceRejected {
            task: task.to_string(),
            message: "service returned no content".to_string(),
        }),
    }
}

/// Unwrap output the model wrapped in a single code fence.
pub fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_outer_fences("```markdown\n# A\n\ntext\n```"), "# A\n\ntext");
    }

    #[test]
    fn strips_css_fence() {
        assert_eq!(strip_outer_fences("```css\nh1 { color: red; }\n```\n"), "h1 { color: red; }");
    }

    #[test]
    fn inner_fences_untouched() {
        let md = "# A\n\n```rust\nfn main() {}\n```\n\nafter";
        assert_eq!(strip_outer_fences(md), md);
    }

    #[test]
    fn content_limits() {
        assert!(validate_content("").is_err());
        assert!(validate_content("   \n").is_err());
        assert!(validate_content("# ok").is_ok());
        assert!(validate_content(&"字".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert!(validate_content(&"a".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }

    #[test]
    fn failure_response_is_rejected() {
        let body = EnhanceResponse {
            success: false,
            enhanced_content: None,
            error: Some("quota".into()),
        };
        let err = interpret_response(EnhanceTask::SegmentText, body).unwrap_err();
        assert!(matches!(err, Md2PagesError::EnhanceRejected { ref message, .. } if message == "quota"));
    }

    #[test]
    fn empty_success_is_rejected() {
        let body = EnhanceResponse {
            success: true,
            enhanced_content: Some("  ".into()),
            error: None,
        };
        assert!(interpret_response(EnhanceTask::AutoImage, body).is_err());
    }

    #[test]
    fn request_serialises_wire_shape() {
        let hints = crate::style::StyleConfig::default().css_hints();
        let req = EnhanceRequest {
            content: "# x",
            task_type: EnhanceTask::AutoCssStyle,
            options: serde_json::Map::new(),
            ai_config: AiSettings::default(),
            css_config: Some(&hints),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["task_type"], "auto_css_style");
        assert_eq!(json["aiConfig"]["modelName"], "gpt-3.5-turbo");
        assert!(json["cssConfig"].get("fontFamily").is_some());
        assert!(json["options"].as_object().unwrap().is_empty());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = EnhanceConfig {
            timeout_secs: 0,
            ..EnhanceConfig::default()
        };
        assert!(EnhanceClient::new(config).is_err());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = EnhanceClient::new(EnhanceConfig {
            endpoint: "http://localhost:8000/".into(),
            ..EnhanceConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/enhance"), "http://localhost:8000/enhance");
    }
}
