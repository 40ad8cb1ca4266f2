//! Configuration types for Markdown pagination.
//!
//! Every pagination knob lives in [`PaginationConfig`], built via its
//! [`PaginationConfigBuilder`]. The optional AI enhancement pass has its own
//! [`EnhanceConfig`], nested inside.

use crate::error::Md2PagesError;
use crate::pipeline::render::{RenderMarkdown, RenderOptions};
use crate::pipeline::split::{SplitLimits, DEFAULT_MAX_PAGE_CHARS, DEFAULT_MIN_PAGE_CHARS};
use crate::progress::ProgressCallback;
use crate::style::StyleConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for one pagination run.
///
/// Built via [`PaginationConfig::builder()`] or using
/// [`PaginationConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pages::PaginationConfig;
///
/// let config = PaginationConfig::builder()
///     .min_page_chars(200)
///     .max_page_chars(1200)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PaginationConfig {
    /// A page never ends at a top-level heading before this many characters. Default: 300.
    pub min_page_chars: usize,

    /// A page ends at the next heading or blank line past this many characters. Default: 1500.
    ///
    /// Ignored when the document carries explicit page-break markers.
    pub max_page_chars: usize,

    /// Markdown engine switches. Default: everything on.
    pub render: RenderOptions,

    /// Pre-constructed renderer. Takes precedence over `render`.
    pub renderer: Option<Arc<dyn RenderMarkdown>>,

    /// Wrap each page in a standalone styled document. Default: None (fragments only).
    pub style: Option<StyleConfig>,

    /// Separator used by [`crate::output::PaginationOutput::joined`]. Default: None.
    pub page_separator: PageSeparator,

    /// AI enhancement applied before pagination. Default: None.
    pub enhance: Option<EnhanceConfig>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
            render: RenderOptions::default(),
            renderer: None,
            style: None,
            page_separator: PageSeparator::default(),
            enhance: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PaginationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationConfig")
            .field("min_page_chars", &self.min_page_chars)
            .field("max_page_chars", &self.max_page_chars)
            .field("render", &self.render)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn RenderMarkdown>"))
            .field("style", &self.style)
            .field("page_separator", &self.page_separator)
            .field("enhance", &self.enhance)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PaginationProgressCallback>"),
            )
            .finish()
    }
}

impl PaginationConfig {
    /// Create a new builder for `PaginationConfig`.
    pub fn builder() -> PaginationConfigBuilder {
        PaginationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Heuristic splitting thresholds.
    pub fn split_limits(&self) -> SplitLimits {
        SplitLimits {
            min_page_chars: self.min_page_chars,
            max_page_chars: self.max_page_chars,
        }
    }
}

/// Builder for [`PaginationConfig`].
#[derive(Debug)]
pub struct PaginationConfigBuilder {
    config: PaginationConfig,
}

impl PaginationConfigBuilder {
    pub fn min_page_chars(mut self, n: usize) -> Self {
        self.config.min_page_chars = n;
        self
    }

    pub fn max_page_chars(mut self, n: usize) -> Self {
        self.config.max_page_chars = n;
        self
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn RenderMarkdown>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn style(mut self, style: StyleConfig) -> Self {
        self.config.style = Some(style);
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn enhance(mut self, enhance: EnhanceConfig) -> Self {
        self.config.enhance = Some(enhance);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PaginationConfig, Md2PagesError> {
        let c = &self.config;
        if c.max_page_chars == 0 {
            return Err(Md2PagesError::InvalidConfig(
                "max_page_chars must be ≥ 1".into(),
            ));
        }
        if c.min_page_chars > c.max_page_chars {
            return Err(Md2PagesError::InvalidConfig(format!(
                "min_page_chars ({}) must not exceed max_page_chars ({})",
                c.min_page_chars, c.max_page_chars
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(Md2PagesError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref style) = c.style {
            if !(0.0..=1.0).contains(&style.background_opacity) {
                return Err(Md2PagesError::InvalidConfig(format!(
                    "Background opacity must be 0.0–1.0, got {}",
                    style.background_opacity
                )));
            }
            if style.font_size_px == 0 || style.page_width_px == 0 {
                return Err(Md2PagesError::InvalidConfig(
                    "Font size and page width must be ≥ 1px".into(),
                ));
            }
        }
        if let Some(ref enhance) = c.enhance {
            enhance.validate()?;
        }
        Ok(self.config)
    }
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// An AI enhancement task understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceTask {
    /// Insert page-break markers at sensible positions.
    SegmentText,
    /// Generate CSS for the document.
    AutoCssStyle,
    /// Reformat tables.
    BeautifyTable,
    /// Insert image placeholders.
    AutoImage,
}

impl EnhanceTask {
    pub const ALL: [EnhanceTask; 4] = [
        EnhanceTask::SegmentText,
        EnhanceTask::AutoCssStyle,
        EnhanceTask::BeautifyTable,
        EnhanceTask::AutoImage,
    ];

    /// Wire name, as sent in `task_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhanceTask::SegmentText => "segment_text",
            EnhanceTask::AutoCssStyle => "auto_css_style",
            EnhanceTask::BeautifyTable => "beautify_table",
            EnhanceTask::AutoImage => "auto_image",
        }
    }

    /// True when the task's output replaces the document text.
    pub fn rewrites_document(&self) -> bool {
        !matches!(self, EnhanceTask::AutoCssStyle)
    }
}

impl fmt::Display for EnhanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnhanceTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnhanceTask::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown task '{s}' (expected segment_text, auto_css_style, beautify_table or auto_image)"
                )
            })
    }
}

/// Model settings forwarded to the enhancement service as `aiConfig`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    /// OpenAI-compatible API base URL. Default: `https://api.openai.com/v1`.
    pub base_url: String,

    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier. Default: `gpt-3.5-turbo`.
    pub model_name: String,

    /// Overrides `model_name` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_model_name: Option<String>,

    /// Sampling temperature, 0.0–2.0. Default: 0.7.
    pub temperature: f32,

    /// Completion token cap, 1–4000. Default: 2000.
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_break_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_style_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_beautify_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_generation_prompt: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model_name: "gpt-3.5-turbo".to_string(),
            custom_model_name: None,
            temperature: 0.7,
            max_tokens: 2000,
            page_break_prompt: None,
            css_style_prompt: None,
            table_beautify_prompt: None,
            image_generation_prompt: None,
        }
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model_name", &self.model_name)
            .field("custom_model_name", &self.custom_model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("page_break_prompt", &self.page_break_prompt.is_some())
            .field("css_style_prompt", &self.css_style_prompt.is_some())
            .field("table_beautify_prompt", &self.table_beautify_prompt.is_some())
            .field("image_generation_prompt", &self.image_generation_prompt.is_some())
            .finish()
    }
}

impl AiSettings {
    /// The model the service will use.
    pub fn effective_model(&self) -> &str {
        self.custom_model_name
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.model_name)
    }

    /// Configured key, else the environment's, ignoring blank values.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    /// Check ranges and URL shape. Does not check the API key.
    pub fn validate(&self) -> Result<(), Md2PagesError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Md2PagesError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                self.temperature
            )));
        }
        if !(1..=4000).contains(&self.max_tokens) {
            return Err(Md2PagesError::InvalidConfig(format!(
                "Max tokens must be 1–4000, got {}",
                self.max_tokens
            )));
        }
        if !is_http_url(&self.base_url) {
            return Err(Md2PagesError::InvalidConfig(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// Settings for the AI enhancement pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceConfig {
    /// Service base URL. Default: `http://localhost:8000`.
    pub endpoint: String,

    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,

    pub settings: AiSettings,

    /// Tasks applied in order before pagination. Default: none.
    pub tasks: Vec<EnhanceTask>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            settings: AiSettings::default(),
            tasks: Vec::new(),
        }
    }
}

impl EnhanceConfig {
    pub fn with_tasks(tasks: impl IntoIterator<Item = EnhanceTask>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Md2PagesError> {
        if !is_http_url(&self.endpoint) {
            return Err(Md2PagesError::InvalidConfig(format!(
                "Enhancement endpoint must start with http:// or https://, got '{}'",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Md2PagesError::InvalidConfig(
                "Enhancement timeout must be ≥ 1 second".into(),
            ));
        }
        self.settings.validate()
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── Separator ────────────────────────────────────────────────────────────

/// How to separate pages in joined HTML output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n<hr />\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom HTML inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n<hr />\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PaginationConfig::default();
        assert_eq!(c.min_page_chars, 300);
        assert_eq!(c.max_page_chars, 1500);
        assert_eq!(c.download_timeout_secs, 120);
        assert!(c.render.html && c.render.breaks && c.render.linkify && c.render.typographer);
        assert!(c.enhance.is_none());
    }

    #[test]
    fn builder_rejects_inverted_limits() {
        let err = PaginationConfig::builder()
            .min_page_chars(2000)
            .max_page_chars(1000)
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PagesError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_max() {
        assert!(PaginationConfig::builder()
            .min_page_chars(0)
            .max_page_chars(0)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_bad_opacity() {
        let style = StyleConfig {
            background_opacity: 1.5,
            ..StyleConfig::default()
        };
        assert!(PaginationConfig::builder().style(style).build().is_err());
    }

    #[test]
    fn split_limits_mirror_config() {
        let c = PaginationConfig::builder()
            .min_page_chars(10)
            .max_page_chars(20)
            .build()
            .unwrap();
        assert_eq!(
            c.split_limits(),
            SplitLimits {
                min_page_chars: 10,
                max_page_chars: 20
            }
        );
    }

    #[test]
    fn ai_settings_ranges() {
        let mut s = AiSettings::default();
        assert!(s.validate().is_ok());
        s.temperature = 2.5;
        assert!(s.validate().is_err());
        s.temperature = 0.0;
        s.max_tokens = 4001;
        assert!(s.validate().is_err());
        s.max_tokens = 1;
        s.base_url = "ftp://x".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn enhance_config_validates_endpoint() {
        let c = EnhanceConfig {
            endpoint: "localhost:8000".into(),
            ..EnhanceConfig::default()
        };
        assert!(PaginationConfig::builder().enhance(c).build().is_err());
    }

    #[test]
    fn api_key_masked_in_debug() {
        let s = AiSettings {
            api_key: Some("sk-very-secret-key-1234".into()),
            ..AiSettings::default()
        };
        let dbg = format!("{:?}", s);
        assert!(!dbg.contains("very-secret"), "{dbg}");
        assert!(dbg.contains("***"));
    }

    #[test]
    fn ai_settings_wire_names() {
        let s = AiSettings {
            api_key: Some("k".into()),
            page_break_prompt: Some("p".into()),
            ..AiSettings::default()
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["baseUrl"], "https://api.openai.com/v1");
        assert_eq!(json["apiKey"], "k");
        assert_eq!(json["modelName"], "gpt-3.5-turbo");
        assert_eq!(json["maxTokens"], 2000);
        assert_eq!(json["pageBreakPrompt"], "p");
        assert!(json.get("customModelName").is_none());
    }

    #[test]
    fn effective_model_prefers_custom() {
        let mut s = AiSettings::default();
        assert_eq!(s.effective_model(), "gpt-3.5-turbo");
        s.custom_model_name = Some("qwen-plus".into());
        assert_eq!(s.effective_model(), "qwen-plus");
        s.custom_model_name = Some("  ".into());
        assert_eq!(s.effective_model(), "gpt-3.5-turbo");
    }

    #[test]
    fn configured_key_wins() {
        let s = AiSettings {
            api_key: Some("configured".into()),
            ..AiSettings::default()
        };
        assert_eq!(s.resolved_api_key().as_deref(), Some("configured"));
    }

    #[test]
    fn task_names_round_trip() {
        for task in EnhanceTask::ALL {
            assert_eq!(task.as_str().parse::<EnhanceTask>(), Ok(task));
        }
        assert!("summarise".parse::<EnhanceTask>().is_err());
        assert_eq!(
            serde_json::to_string(&EnhanceTask::AutoCssStyle).unwrap(),
            "\"auto_css_style\""
        );
    }

    #[test]
    fn separator_render() {
        assert_eq!(PageSeparator::None.render(2), "\n\n");
        assert_eq!(PageSeparator::HorizontalRule.render(2), "\n\n<hr />\n\n");
        assert_eq!(PageSeparator::Comment.render(3), "\n\n<!-- page 3 -->\n\n");
        assert_eq!(
            PageSeparator::Custom("<div class=\"cut\"></div>".into()).render(1),
            "\n\n<div class=\"cut\"></div>\n\n"
        );
    }
}
