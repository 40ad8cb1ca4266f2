//! Markdown → HTML rendering behind a never-failing adapter.
//!
//! The engine is [`pulldown_cmark`], driven by an explicitly constructed
//! [`MarkdownRenderer`] value. There is no shared global instance: the
//! options ([`RenderOptions`]) and the custom markup ([`RenderRules`]) are
//! plain values handed to the constructor, and the renderer is passed into
//! the page assembler.
//!
//! ## Custom markup
//!
//! [`RenderRules`] is a table from [`RuleTag`] to a template function. The
//! standard table emits:
//!
//! | Tag | Output |
//! |-----|--------|
//! | strong | `<strong class="markdown-strong">…</strong>` |
//! | emphasis | `<em class="markdown-em">…</em>` |
//! | horizontal rule | `<hr />` |
//! | code block | `<pre class="code-block"><code class="language-X">…</code></pre>` |
//!
//! A tag missing from the table falls back to the engine's own markup.
//!
//! ## Failure boundary
//!
//! [`render_guarded`] is the only way the pipeline renders. It returns an
//! empty string for empty input and swaps any engine error or panic for
//! [`RENDER_FAILED_HTML`], so rendering never fails past this module.

use crate::error::RenderError;
use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Fragment substituted for any page or table the engine could not render.
pub const RENDER_FAILED_HTML: &str = r#"<div class="error">Markdown rendering failed</div>"#;

/// Anything that can turn Markdown into HTML.
///
/// Implementations may fail; the pipeline only calls them through
/// [`render_guarded`].
pub trait RenderMarkdown: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Engine switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Pass raw HTML through. When off, HTML is shown as escaped text.
    pub html: bool,
    /// Turn single newlines inside a paragraph into `<br />`.
    pub breaks: bool,
    /// Turn bare `http(s)://` and `www.` URLs into links.
    pub linkify: bool,
    /// Dashes, ellipses and curly single quotes. Double quotes stay straight.
    pub typographer: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            html: true,
            breaks: true,
            linkify: true,
            typographer: true,
        }
    }
}

/// Elements whose markup can be replaced through [`RenderRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleTag {
    StrongOpen,
    StrongClose,
    EmOpen,
    EmClose,
    HorizontalRule,
    CodeBlock,
}

/// Inputs available to a template. Only code blocks fill them in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleArgs<'a> {
    /// Fence info string, trimmed; empty for indented blocks.
    pub info: &'a str,
    /// Raw block content, not yet escaped.
    pub content: &'a str,
}

/// A template producing the HTML for one [`RuleTag`].
pub type TemplateFn = Arc<dyn Fn(&RuleArgs<'_>) -> String + Send + Sync>;

/// Table of custom markup templates, keyed by tag.
#[derive(Clone, Default)]
pub struct RenderRules {
    templates: HashMap<RuleTag, TemplateFn>,
}

impl RenderRules {
    /// No overrides: the engine's own markup everywhere.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The classed markup used for page output.
    pub fn standard() -> Self {
        Self::empty()
            .with(RuleTag::StrongOpen, |_| r#"<strong class="markdown-strong">"#.to_string())
            .with(RuleTag::StrongClose, |_| "</strong>".to_string())
            .with(RuleTag::EmOpen, |_| r#"<em class="markdown-em">"#.to_string())
            .with(RuleTag::EmClose, |_| "</em>".to_string())
            .with(RuleTag::HorizontalRule, |_| "<hr />".to_string())
            .with(RuleTag::CodeBlock, code_block_template)
    }

    /// Set (or replace) the template for `tag`.
    pub fn with<F>(mut self, tag: RuleTag, template: F) -> Self
    where
        F: Fn(&RuleArgs<'_>) -> String + Send + Sync + 'static,
    {
        self.templates.insert(tag, Arc::new(template));
        self
    }

    /// Drop the template for `tag`.
    pub fn without(mut self, tag: RuleTag) -> Self {
        self.templates.remove(&tag);
        self
    }

    pub fn contains(&self, tag: RuleTag) -> bool {
        self.templates.contains_key(&tag)
    }

    /// Run the template for `tag`, if there is one.
    pub fn apply(&self, tag: RuleTag, args: &RuleArgs<'_>) -> Option<String> {
        self.templates.get(&tag).map(|t| t(args))
    }
}

impl fmt::Debug for RenderRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&RuleTag> = self.templates.keys().collect();
        tags.sort();
        f.debug_struct("RenderRules").field("tags", &tags).finish()
    }
}

fn code_block_template(args: &RuleArgs<'_>) -> String {
    let class = if args.info.is_empty() {
        String::new()
    } else {
        format!(
            r#" class="language-{}""#,
            encode_double_quoted_attribute(args.info)
        )
    };
    format!(
        r#"<pre class="code-block"><code{}>{}</code></pre>"#,
        class,
        encode_text(args.content)
    )
}

/// Bare URLs for linkify. Trailing sentence punctuation is trimmed later.
static RE_BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:https?://|www\.)[^\s<>"'`]+"#).unwrap());

/// The pulldown-cmark backed renderer.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: RenderOptions,
    rules: RenderRules,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::with_options(RenderOptions::default())
    }
}

impl MarkdownRenderer {
    pub fn new(options: RenderOptions, rules: RenderRules) -> Self {
        Self { options, rules }
    }

    /// Renderer with the standard rule table.
    pub fn with_options(options: RenderOptions) -> Self {
        Self::new(options, RenderRules::standard())
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn rules(&self) -> &RenderRules {
        &self.rules
    }

    fn parser_options(&self) -> Options {
        let mut opts = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        if self.options.typographer {
            opts |= Options::ENABLE_SMART_PUNCTUATION;
        }
        opts
    }

    fn render_to_string(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.parser_options()).into_offset_iter();
        let straight = parser.map(|(event, range)| straighten_double_quote(event, markdown.get(range)));
        let events = self.rewrite(TextMergeStream::new(straight));
        let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    /// Apply the options and rule table to the raw event stream.
    fn rewrite<'a>(&self, events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
        let mut out: Vec<Event<'a>> = Vec::new();
        let mut code: Option<(String, String)> = None;
        let mut link_depth = 0usize;

        for event in events {
            if let Some((_, content)) = code.as_mut() {
                match event {
                    Event::Text(text) => content.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some((info, content)) = code.take() {
                            let args = RuleArgs {
                                info: &info,
                                content: &content,
                            };
                            if let Some(html) = self.rules.apply(RuleTag::CodeBlock, &args) {
                                out.push(Event::Html(format!("{html}\n").into()));
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) if self.rules.contains(RuleTag::CodeBlock) => {
                    let info = match kind {
                        CodeBlockKind::Fenced(info) => info.trim().to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code = Some((info, String::new()));
                }
                Event::Start(Tag::Strong) => out.push(self.rule_or(RuleTag::StrongOpen, event)),
                Event::End(TagEnd::Strong) => out.push(self.rule_or(RuleTag::StrongClose, event)),
                Event::Start(Tag::Emphasis) => out.push(self.rule_or(RuleTag::EmOpen, event)),
                Event::End(TagEnd::Emphasis) => out.push(self.rule_or(RuleTag::EmClose, event)),
                Event::Rule => match self.rules.apply(RuleTag::HorizontalRule, &RuleArgs::default()) {
                    Some(html) => out.push(Event::Html(format!("{html}\n").into())),
                    None => out.push(Event::Rule),
                },
                Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {
                    link_depth += 1;
                    out.push(event);
                }
                Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                    link_depth = link_depth.saturating_sub(1);
                    out.push(event);
                }
                Event::SoftBreak if self.options.breaks => out.push(Event::HardBreak),
                Event::Html(raw) | Event::InlineHtml(raw) if !self.options.html => {
                    out.push(Event::Text(raw));
                }
                Event::Text(text) if self.options.linkify && link_depth == 0 => {
                    push_linkified(&mut out, text);
                }
                other => out.push(other),
            }
        }

        out
    }

    fn rule_or<'a>(&self, tag: RuleTag, fallback: Event<'a>) -> Event<'a> {
        match self.rules.apply(tag, &RuleArgs::default()) {
            Some(html) => Event::InlineHtml(html.into()),
            None => fallback,
        }
    }
}

impl RenderMarkdown for MarkdownRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        Ok(self.render_to_string(markdown))
    }
}

/// Typographer output keeps `"` straight; dashes, ellipses and single
/// quotes are still substituted. Curly quotes typed in the source stay.
fn straighten_double_quote<'a>(event: Event<'a>, source: Option<&str>) -> Event<'a> {
    match event {
        Event::Text(ref text)
            if source == Some("\"") && matches!(&**text, "\u{201c}" | "\u{201d}") =>
        {
            Event::Text("\"".into())
        }
        other => other,
    }
}

/// Split a text event around bare URLs, emitting anchors for each.
fn push_linkified<'a>(out: &mut Vec<Event<'a>>, text: CowStr<'a>) {
    if !RE_BARE_URL.is_match(&text) {
        out.push(Event::Text(text));
        return;
    }

    let s: &str = &text;
    let mut last = 0;
    for m in RE_BARE_URL.find_iter(s) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if url.is_empty() {
            continue;
        }
        if m.start() > last {
            out.push(Event::Text(s[last..m.start()].to_string().into()));
        }
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Event::InlineHtml(
            format!(
                r#"<a href="{}">{}</a>"#,
                encode_double_quoted_attribute(&href),
                encode_text(url)
            )
            .into(),
        ));
        last = m.start() + url.len();
    }
    if last < s.len() {
        out.push(Event::Text(s[last..].to_string().into()));
    }
}

/// What [`render_guarded`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Rendered HTML, or [`RENDER_FAILED_HTML`] on failure.
    pub html: String,
    /// The failure that triggered the fallback, if any.
    pub error: Option<RenderError>,
}

/// Render through `renderer`, never failing.
///
/// Empty input renders to the empty string. Errors and panics are logged
/// and replaced by [`RENDER_FAILED_HTML`].
pub fn render_guarded(renderer: &dyn RenderMarkdown, markdown: &str) -> RenderOutcome {
    if markdown.is_empty() {
        return RenderOutcome {
            html: String::new(),
            error: None,
        };
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(markdown)))
        .unwrap_or_else(|payload| Err(RenderError::Panicked(panic_message(payload.as_ref()))));

    match result {
        Ok(html) => RenderOutcome { html, error: None },
        Err(e) => {
            warn!("Markdown rendering failed: {}", e);
            RenderOutcome {
                html: RENDER_FAILED_HTML.to_string(),
                error: Some(e),
            }
        }
    }
}

/// Render through `renderer`, returning only the HTML.
pub fn render_markdown_to_html(renderer: &dyn RenderMarkdown, markdown: &str) -> String {
    render_guarded(renderer, markdown).html
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
