//! Page styling: wrap a rendered page fragment in a standalone HTML document.
//!
//! Each page becomes its own document so it can be opened, screenshotted or
//! exported on its own. The stylesheet covers every class the renderer
//! emits (`markdown-strong`, `markdown-em`, `code-block`, `error`) plus
//! tables, and is followed by the caller's custom CSS.

use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How a background image fills the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundSize {
    #[default]
    Cover,
    Contain,
    Auto,
}

impl BackgroundSize {
    pub fn as_css(&self) -> &'static str {
        match self {
            BackgroundSize::Cover => "cover",
            BackgroundSize::Contain => "contain",
            BackgroundSize::Auto => "auto",
        }
    }
}

impl std::str::FromStr for BackgroundSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cover" => Ok(BackgroundSize::Cover),
            "contain" => Ok(BackgroundSize::Contain),
            "auto" => Ok(BackgroundSize::Auto),
            other => Err(format!(
                "unknown background size '{other}' (expected cover, contain or auto)"
            )),
        }
    }
}

/// Visual settings for standalone page documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub font_family: String,
    /// Base font size in CSS pixels. Default: 16.
    pub font_size_px: u32,
    /// Unitless line height. Default: 1.6.
    pub line_height: f32,
    pub text_color: String,
    pub background_color: String,
    /// Background image URL, drawn beneath the text.
    pub background_image: Option<String>,
    /// Background image opacity, 0.0–1.0. Default: 1.0.
    pub background_opacity: f32,
    pub background_size: BackgroundSize,
    /// Page width in CSS pixels. Default: 800.
    pub page_width_px: u32,
    /// Extra CSS appended after the built-in stylesheet.
    pub custom_css: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font_family: "-apple-system, BlinkMacSystemFont, 'Segoe UI', 'PingFang SC', 'Microsoft YaHei', sans-serif".to_string(),
            font_size_px: 16,
            line_height: 1.6,
            text_color: "#333333".to_string(),
            background_color: "#ffffff".to_string(),
            background_image: None,
            background_opacity: 1.0,
            background_size: BackgroundSize::Cover,
            page_width_px: 800,
            custom_css: String::new(),
        }
    }
}

/// Typography settings in the shape the enhancement service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssHints {
    #[serde(rename = "customCSS")]
    pub custom_css: String,
    pub font_family: String,
    pub font_size: u32,
    pub line_height: f32,
    pub text_color: String,
}

impl StyleConfig {
    pub fn css_hints(&self) -> CssHints {
        CssHints {
            custom_css: self.custom_css.clone(),
            font_family: self.font_family.clone(),
            font_size: self.font_size_px,
            line_height: self.line_height,
            text_color: self.text_color.clone(),
        }
    }

    /// Append `css` to the custom stylesheet.
    pub fn push_custom_css(&mut self, css: &str) {
        let css = css.trim();
        if css.is_empty() {
            return;
        }
        if !self.custom_css.is_empty() && !self.custom_css.ends_with('\n') {
            self.custom_css.push('\n');
        }
        self.custom_css.push_str(css);
        self.custom_css.push('\n');
    }

    /// The full stylesheet for a page document.
    pub fn stylesheet(&self) -> String {
        let mut css = String::new();
        let _ = write!(
            css,
            "html, body {{ margin: 0; padding: 0; background: {bg}; }}\n\
             .page {{ position: relative; box-sizing: border-box; width: {width}px; \
             margin: 0 auto; padding: 40px; font-family: {font}; font-size: {size}px; \
             line-height: {lh}; color: {color}; }}\n",
            bg = css_value(&self.background_color),
            width = self.page_width_px,
            font = css_value(&self.font_family),
            size = self.font_size_px,
            lh = self.line_height,
            color = css_value(&self.text_color),
        );

        if let Some(url) = &self.background_image {
            let _ = write!(
                css,
                ".page::before {{ content: \"\"; position: absolute; inset: 0; z-index: 0; \
                 background-image: url(\"{url}\"); background-size: {size}; \
                 background-position: center; background-repeat: no-repeat; \
                 opacity: {opacity}; pointer-events: none; }}\n\
                 .page > .page-body {{ position: relative; z-index: 1; }}\n",
                url = css_string(url),
                size = self.background_size.as_css(),
                opacity = self.background_opacity.clamp(0.0, 1.0),
            );
        }

        css.push_str(BASE_CSS);

        if !self.custom_css.trim().is_empty() {
            css.push_str(&self.custom_css.replace("</", "<\\/"));
            if !css.ends_with('\n') {
                css.push('\n');
            }
        }
        css
    }
}

const BASE_CSS: &str = "\
h1, h2, h3, h4, h5, h6 { margin: 1.2em 0 0.6em; line-height: 1.3; }
p { margin: 0 0 1em; }
.markdown-strong { font-weight: 700; }
.markdown-em { font-style: italic; }
.code-block { background: #f6f8fa; border-radius: 6px; padding: 12px 16px; overflow-x: auto; font-size: 0.9em; }
.code-block code { font-family: 'SFMono-Regular', Consolas, 'Liberation Mono', Menlo, monospace; }
.error { color: #b00020; background: #fdecea; border: 1px solid #f5c2c0; border-radius: 4px; padding: 8px 12px; }
table { border-collapse: collapse; width: 100%; margin: 1em 0; }
th, td { border: 1px solid #d0d7de; padding: 6px 12px; text-align: left; }
th { background: #f6f8fa; font-weight: 600; }
tr:nth-child(even) td { background: #fafbfc; }
hr { border: none; border-top: 1px solid #d0d7de; margin: 1.5em 0; }
img { max-width: 100%; }
blockquote { margin: 0 0 1em; padding: 0 1em; color: #57606a; border-left: 4px solid #d0d7de; }
";

/// Wrap a page fragment in a standalone HTML document.
pub fn wrap_page(html: &str, page_num: usize, total_pages: usize, style: &StyleConfig) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         <style>\n{css}</style>\n\
         </head>\n\
         <body>\n\
         <div class=\"page\" data-page=\"{page_num}\" data-total=\"{total_pages}\">\n\
         <div class=\"page-body\">\n{body}\n</div>\n\
         </div>\n\
         </body>\n\
         </html>\n",
        title = encode_text(&format!("Page {page_num} of {total_pages}")),
        css = style.stylesheet(),
        body = html.trim_end(),
    )
}

/// Strip characters that could close a declaration or the style element.
fn css_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>'))
        .collect()
}

/// Escape a value for use inside a double-quoted CSS string.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => {}
            '<' => out.push_str("\\3c "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_produces_document() {
        let doc = wrap_page("<p>hi</p>\n", 2, 5, &StyleConfig::default());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>Page 2 of 5</title>"));
        assert!(doc.contains("data-page=\"2\""));
        assert!(doc.contains("<p>hi</p>"));
        assert!(doc.contains(".markdown-strong"));
        assert!(doc.contains(".code-block"));
        assert!(doc.contains(".error"));
        assert!(doc.contains("border-collapse"));
    }

    #[test]
    fn typography_flows_into_css() {
        let style = StyleConfig {
            font_size_px: 20,
            line_height: 1.8,
            text_color: "#112233".into(),
            page_width_px: 640,
            ..StyleConfig::default()
        };
        let css = style.stylesheet();
        assert!(css.contains("font-size: 20px"));
        assert!(css.contains("line-height: 1.8"));
        assert!(css.contains("color: #112233"));
        assert!(css.contains("width: 640px"));
    }

    #[test]
    fn background_image_layer() {
        let style = StyleConfig {
            background_image: Some("https://example.org/bg.png".into()),
            background_opacity: 0.3,
            background_size: BackgroundSize::Contain,
            ..StyleConfig::default()
        };
        let css = style.stylesheet();
        assert!(css.contains("url(\"https://example.org/bg.png\")"));
        assert!(css.contains("opacity: 0.3"));
        assert!(css.contains("background-size: contain"));
        assert!(!StyleConfig::default().stylesheet().contains("::before"));
    }

    #[test]
    fn custom_css_appended_and_cannot_close_style() {
        let mut style = StyleConfig::default();
        style.push_custom_css("h1 { color: red; }");
        style.push_custom_css("</style><script>");
        let css = style.stylesheet();
        assert!(css.contains("h1 { color: red; }"));
        assert!(!css.contains("</style>"));
    }

    #[test]
    fn values_cannot_break_out_of_declarations() {
        let style = StyleConfig {
            text_color: "red; } body { display: none".into(),
            ..StyleConfig::default()
        };
        assert!(!style.stylesheet().contains("} body {"));
        assert_eq!(css_value("red; }"), "red ");
    }

    #[test]
    fn css_hints_use_wire_names() {
        let json = serde_json::to_value(StyleConfig::default().css_hints()).unwrap();
        assert_eq!(json["fontSize"], 16);
        assert!(json.get("customCSS").is_some());
        assert!(json.get("textColor").is_some());
    }

    #[test]
    fn background_size_parses() {
        assert_eq!("Contain".parse::<BackgroundSize>(), Ok(BackgroundSize::Contain));
        assert!("stretch".parse::<BackgroundSize>().is_err());
    }
}
