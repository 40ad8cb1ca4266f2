//! CLI binary for md2pages.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PaginationConfig` and prints or writes the pages.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pages::{
    convert, write_pages, AiSettings, BackgroundSize, EnhanceClient, EnhanceConfig, EnhanceTask,
    PageSeparator, PaginationConfig, PaginationOutput, PaginationProgressCallback,
    ProgressCallback, RenderOptions, StyleConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the page currently being rendered.
    page_started: Mutex<Option<Instant>>,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_pagination_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading Markdown…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            degraded: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn page_elapsed_ms(&self) -> u128 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl PaginationProgressCallback for CliProgressCallback {
    fn on_pagination_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, html_len: usize) {
        let elapsed_ms = self.page_elapsed_ms();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{html_len:>6} bytes")),
            dim(&format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, detail: &str) {
        let elapsed_ms = self.page_elapsed_ms();
        self.degraded.fetch_add(1, Ordering::SeqCst);

        let msg: String = if detail.chars().count() > 80 {
            format!("{}\u{2026}", detail.chars().take(79).collect::<String>())
        } else {
            detail.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            yellow("⚠"),
            page_num,
            total,
            yellow(&msg),
            dim(&format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_pagination_complete(&self, total_pages: usize, clean_pages: usize) {
        let degraded = total_pages.saturating_sub(clean_pages);
        self.bar.finish_and_clear();

        if degraded == 0 {
            eprintln!("{} {} pages rendered", green("✔"), bold(&total_pages.to_string()));
        } else {
            eprintln!(
                "{} {} pages rendered  ({} with warnings)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                yellow(&degraded.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Paginate to stdout (HTML fragments, blank line between pages)
  md2pages notes.md

  # One standalone HTML file per page
  md2pages notes.md --standalone -o pages/

  # Smaller pages, comment between pages
  md2pages --max-page-chars 800 --separator comment notes.md

  # Read from stdin, print page Markdown instead of HTML
  cat notes.md | md2pages - --markdown

  # Styled pages with a background image
  md2pages notes.md -o pages/ --font-size 18 --background-image https://example.org/paper.png \
      --background-opacity 0.2

  # Let the AI service insert page breaks and generate CSS first
  md2pages notes.md -o pages/ --enhance segment_text --enhance auto_css_style

  # Check that the enhancement service is up
  md2pages --health

  # Full structured output
  md2pages --json notes.md > pages.json

PAGE BREAKS:
  Put any of these on their own line to force a page break:
    <!-- PAGE_BREAK -->   <!-- NEWPAGE -->   <!-- 换页 -->   <!-- 分页 -->
  Without markers, pages break at top-level headings once a page holds
  --min-page-chars characters, or at the next heading or blank line once it
  exceeds --max-page-chars. Tables are never split.

ENHANCEMENT TASKS:
  segment_text     insert page-break markers at sensible positions
  auto_css_style   generate CSS for the pages (implies --standalone)
  beautify_table   reformat tables
  auto_image       insert image placeholders

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key forwarded to the enhancement service
  MD2PAGES_ENDPOINT       Enhancement service URL (default http://localhost:8000)
  RUST_LOG                Override log filter (e.g. md2pages=debug)
"#;

/// Split Markdown into styled, page-sized HTML without tearing tables.
#[derive(Parser, Debug)]
#[command(
    name = "md2pages",
    version,
    about = "Split Markdown into page-sized HTML without tearing tables",
    long_about = "Split Markdown documents (local files, stdin or URLs) into ordered, \
page-sized HTML. Explicit page-break markers are honoured; otherwise pages are cut by \
length and heading structure. Tables are never split across pages. Optionally runs an \
AI enhancement service first and wraps each page in a styled standalone document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file path, HTTP/HTTPS URL, or `-` for stdin.
    #[arg(required_unless_present = "health")]
    input: Option<String>,

    /// Write one file per page (page-001.html, …) into this directory.
    #[arg(short, long = "output-dir", env = "MD2PAGES_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Output structured JSON (PaginationOutput) instead of HTML.
    #[arg(long, env = "MD2PAGES_JSON")]
    json: bool,

    /// Print each page's Markdown instead of its HTML.
    #[arg(long, conflicts_with = "json")]
    markdown: bool,

    /// Page separator on stdout: none, hr, comment, or custom HTML.
    #[arg(long, env = "MD2PAGES_SEPARATOR", default_value = "none")]
    separator: String,

    /// A page never ends at a top-level heading before this many characters.
    #[arg(long, env = "MD2PAGES_MIN_PAGE_CHARS", default_value_t = 300)]
    min_page_chars: usize,

    /// A page ends at the next heading or blank line past this many characters.
    #[arg(long, env = "MD2PAGES_MAX_PAGE_CHARS", default_value_t = 1500)]
    max_page_chars: usize,

    /// Show raw HTML in the Markdown as text instead of passing it through.
    #[arg(long)]
    no_html: bool,

    /// Keep single newlines as spaces instead of <br />.
    #[arg(long)]
    no_breaks: bool,

    /// Do not turn bare URLs into links.
    #[arg(long)]
    no_linkify: bool,

    /// Disable smart dashes, ellipses and single quotes.
    #[arg(long)]
    no_typographer: bool,

    // ── Style ────────────────────────────────────────────────────────────
    /// Wrap each page in a standalone styled HTML document.
    #[arg(long, env = "MD2PAGES_STANDALONE")]
    standalone: bool,

    /// CSS font-family for pages.
    #[arg(long)]
    font_family: Option<String>,

    /// Base font size in px.
    #[arg(long)]
    font_size: Option<u32>,

    /// Unitless line height.
    #[arg(long)]
    line_height: Option<f32>,

    /// Text colour (any CSS colour).
    #[arg(long)]
    text_color: Option<String>,

    /// Page background colour.
    #[arg(long)]
    background_color: Option<String>,

    /// Background image URL.
    #[arg(long)]
    background_image: Option<String>,

    /// Background image opacity (0.0–1.0).
    #[arg(long)]
    background_opacity: Option<f32>,

    /// Background image size: cover, contain, auto.
    #[arg(long)]
    background_size: Option<BackgroundSize>,

    /// Page width in px.
    #[arg(long)]
    page_width: Option<u32>,

    /// File with extra CSS appended to the page stylesheet.
    #[arg(long)]
    css: Option<PathBuf>,

    // ── AI enhancement ───────────────────────────────────────────────────
    /// Enhancement task to run before paginating (repeatable, applied in order).
    #[arg(long = "enhance", value_name = "TASK")]
    enhance: Vec<EnhanceTask>,

    /// Enhancement service URL.
    #[arg(long, env = "MD2PAGES_ENDPOINT", default_value = "http://localhost:8000")]
    endpoint: String,

    /// Enhancement request timeout in seconds.
    #[arg(long, env = "MD2PAGES_ENHANCE_TIMEOUT", default_value_t = 30)]
    enhance_timeout: u64,

    /// OpenAI-compatible API base URL used by the service.
    #[arg(long, env = "MD2PAGES_API_BASE_URL")]
    api_base_url: Option<String>,

    /// API key forwarded to the service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name (default gpt-3.5-turbo).
    #[arg(long, env = "MD2PAGES_MODEL")]
    model: Option<String>,

    /// Custom model name; overrides --model.
    #[arg(long)]
    custom_model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Completion token cap (1–4000).
    #[arg(long, default_value_t = 2000)]
    max_tokens: u32,

    /// Override the page-break instruction sent with segment_text.
    #[arg(long)]
    page_break_prompt: Option<String>,

    /// Override the instruction sent with auto_css_style.
    #[arg(long)]
    css_prompt: Option<String>,

    /// Check the enhancement service's health and exit.
    #[arg(long)]
    health: bool,

    // ── Misc ─────────────────────────────────────────────────────────────
    /// HTTP download timeout in seconds.
    #[arg(long, env = "MD2PAGES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "MD2PAGES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PAGES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PAGES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.health;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Health check ─────────────────────────────────────────────────────
    if cli.health {
        let client = EnhanceClient::new(enhance_config(&cli)).context("Invalid enhancement settings")?;
        let healthy = client.health().await.context("Health check failed")?;
        if healthy {
            println!("{} {} is healthy", green("✔"), cli.endpoint);
            return Ok(());
        }
        println!("{} {} is not healthy", red("✘"), cli.endpoint);
        std::process::exit(1);
    }

    let input = cli
        .input
        .clone()
        .context("An input file, URL or '-' is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn PaginationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = convert(&input, &config)
        .await
        .context("Pagination failed")?;

    if let Some(ref dir) = cli.output_dir {
        let written = write_pages(&output.pages, dir)
            .await
            .context("Failed to write pages")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {}ms  →  {}",
                if output.is_clean() { green("✔") } else { cyan("⚠") },
                written.len(),
                output.stats.duration_ms,
                bold(&dir.display().to_string()),
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output_dir.is_none() {
        let text = stdout_text(&output, &config.page_separator, cli.markdown);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Paginated into {} pages ({:?} mode, {} tables) in {}ms",
            output.stats.total_pages,
            output.stats.split_mode,
            output.stats.tables_extracted,
            output.stats.duration_ms
        );
        for page in output.pages.iter().filter(|p| !p.diagnostics.is_empty()) {
            for d in &page.diagnostics {
                eprintln!("  {} {}", yellow("⚠"), d);
            }
        }
    }

    Ok(())
}

/// What to print on stdout when no output directory is given.
fn stdout_text(output: &PaginationOutput, separator: &PageSeparator, markdown: bool) -> String {
    if markdown {
        return output
            .pages
            .iter()
            .map(|p| p.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n<!-- PAGE_BREAK -->\n\n");
    }
    if output.pages.iter().any(|p| p.document.is_some()) {
        let mut out = String::new();
        for (i, page) in output.pages.iter().enumerate() {
            if i > 0 {
                out.push_str(&separator.render(page.page_num));
            }
            out.push_str(page.best_html().trim_end());
        }
        return out;
    }
    output.joined(separator)
}

/// Map CLI args to `PaginationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PaginationConfig> {
    let render = RenderOptions {
        html: !cli.no_html,
        breaks: !cli.no_breaks,
        linkify: !cli.no_linkify,
        typographer: !cli.no_typographer,
    };

    let mut builder = PaginationConfig::builder()
        .min_page_chars(cli.min_page_chars)
        .max_page_chars(cli.max_page_chars)
        .render_options(render)
        .page_separator(parse_separator(&cli.separator))
        .download_timeout_secs(cli.download_timeout);

    if let Some(style) = build_style(cli).await? {
        builder = builder.style(style);
    }

    if !cli.enhance.is_empty() {
        builder = builder.enhance(enhance_config(cli));
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// A style when `--standalone` or any style flag is given.
async fn build_style(cli: &Cli) -> Result<Option<StyleConfig>> {
    let any_flag = cli.font_family.is_some()
        || cli.font_size.is_some()
        || cli.line_height.is_some()
        || cli.text_color.is_some()
        || cli.background_color.is_some()
        || cli.background_image.is_some()
        || cli.background_opacity.is_some()
        || cli.background_size.is_some()
        || cli.page_width.is_some()
        || cli.css.is_some();
    if !cli.standalone && !any_flag {
        return Ok(None);
    }

    let mut style = StyleConfig::default();
    if let Some(ref f) = cli.font_family {
        style.font_family = f.clone();
    }
    if let Some(px) = cli.font_size {
        style.font_size_px = px;
    }
    if let Some(lh) = cli.line_height {
        style.line_height = lh;
    }
    if let Some(ref c) = cli.text_color {
        style.text_color = c.clone();
    }
    if let Some(ref c) = cli.background_color {
        style.background_color = c.clone();
    }
    style.background_image = cli.background_image.clone();
    if let Some(o) = cli.background_opacity {
        style.background_opacity = o;
    }
    if let Some(size) = cli.background_size {
        style.background_size = size;
    }
    if let Some(w) = cli.page_width {
        style.page_width_px = w;
    }
    if let Some(ref path) = cli.css {
        let css = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read CSS from {:?}", path))?;
        style.push_custom_css(&css);
    }
    Ok(Some(style))
}

fn enhance_config(cli: &Cli) -> EnhanceConfig {
    let defaults = AiSettings::default();
    EnhanceConfig {
        endpoint: cli.endpoint.clone(),
        timeout_secs: cli.enhance_timeout,
        settings: AiSettings {
            base_url: cli.api_base_url.clone().unwrap_or(defaults.base_url),
            api_key: cli.api_key.clone(),
            model_name: cli.model.clone().unwrap_or(defaults.model_name),
            custom_model_name: cli.custom_model.clone(),
            temperature: cli.temperature,
            max_tokens: cli.max_tokens,
            page_break_prompt: cli.page_break_prompt.clone(),
            css_style_prompt: cli.css_prompt.clone(),
            ..defaults
        },
        tasks: cli.enhance.clone(),
    }
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
