//! Web fetch tool — download a page and extract readable text.
//!
//! HTML is parsed with `scraper` and rendered as plain text or light
//! markdown; JSON is pretty-printed; everything else is returned raw.
//! Results are JSON objects so the model can see the final URL, status and
//! truncation.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{Value, json};
use tracing::{info, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_2) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 5;
const SHORT_CONTENT_CHARS: usize = 500;

/// Elements whose whole subtree is never rendered.
const SKIP_TAGS: &[&str] = &["head", "script", "style", "noscript", "svg", "template"];

/// Elements that start and end on their own line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "nav", "aside", "ul", "ol",
    "li", "table", "tr", "blockquote", "pre", "form", "figure", "dl", "dt", "dd", "hr",
    "h1", "h2", "h3", "h4", "h5", "h6",
];

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));

/// Text output format for HTML pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Text,
    Markdown,
}

pub struct WebFetchTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebFetchTool {
    pub fn new(max_chars: usize) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::failed("web_fetch", e))?;
        Ok(Self { client, max_chars })
    }

    async fn fetch_one(&self, url: &str, mode: ExtractMode, max_chars: usize) -> Value {
        if let Err(reason) = validate_url(url) {
            return json!({"error": format!("URL validation failed: {reason}"), "url": url});
        }

        info!(url = %url, "Fetching URL");
        let response = match self.client.get(url).send().await.and_then(|r| r.error_for_status()) {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "Web fetch failed");
                return json!({"error": e.to_string(), "url": url});
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return json!({"error": e.to_string(), "url": url}),
        };

        let extracted = extract(&body, &content_type, mode);
        let total = extracted.text.chars().count();
        let truncated = total > max_chars;
        let text: String = if truncated {
            extracted.text.chars().take(max_chars).collect()
        } else {
            extracted.text
        };
        let length = text.chars().count();

        let mut result = json!({
            "url": url,
            "finalUrl": final_url,
            "status": status,
            "title": extracted.title,
            "extractor": extracted.extractor,
            "truncated": truncated,
            "length": length,
            "text": text,
        });
        if length < SHORT_CONTENT_CHARS && extracted.extractor == "html" {
            result["warning"] =
                json!("Content is very short. This page may require JavaScript rendering.");
        }

        info!(url = %url, length, extractor = extracted.extractor, "Fetched URL");
        result
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch URL and extract readable content. Supports batch fetching multiple URLs. \
         Use extractMode='markdown' to preserve links and structure, or 'text' (default) for plain text."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .property("url", ParameterSchema::string().describe("URL to fetch (single URL)"))
            .property(
                "urls",
                ParameterSchema::array(ParameterSchema::string())
                    .describe("Multiple URLs to fetch (batch mode)"),
            )
            .property(
                "extractMode",
                ParameterSchema::string()
                    .one_of(["markdown", "text"])
                    .describe("Content extraction mode: 'text' (default) or 'markdown'"),
            )
            .property(
                "maxChars",
                ParameterSchema::integer()
                    .min(100.0)
                    .describe("Maximum characters to return per page"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let mode = match arguments["extractMode"].as_str() {
            Some("markdown") => ExtractMode::Markdown,
            _ => ExtractMode::Text,
        };
        let max_chars = arguments["maxChars"]
            .as_u64()
            .map_or(self.max_chars, |n| n as usize);

        if let Some(urls) = arguments["urls"].as_array().filter(|u| !u.is_empty()) {
            let mut results = Vec::with_capacity(urls.len());
            for url in urls {
                results.push(self.fetch_one(url.as_str().unwrap_or_default(), mode, max_chars).await);
            }
            return Ok(json!({"batch": true, "count": results.len(), "results": results}).to_string());
        }

        match arguments["url"].as_str().filter(|u| !u.is_empty()) {
            Some(url) => Ok(self.fetch_one(url, mode, max_chars).await.to_string()),
            None => Ok(json!({"error": "Either 'url' or 'urls' parameter is required"}).to_string()),
        }
    }
}

/// Only http(s) URLs with a host are fetched.
pub fn validate_url(url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("Only http/https allowed, got '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("Missing domain".into());
    }
    Ok(())
}

/// Extracted page content.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub title: String,
    pub extractor: &'static str,
}

/// Pick an extractor from the content type (or the body's first bytes).
pub fn extract(body: &str, content_type: &str, mode: ExtractMode) -> Extracted {
    if content_type.contains("application/json") {
        let text = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| body.to_string());
        return Extracted { text, title: String::new(), extractor: "json" };
    }

    let head: String = body.trim_start().chars().take(256).collect::<String>().to_lowercase();
    if content_type.contains("text/html") || head.starts_with("<!doctype") || head.starts_with("<html") {
        let document = Html::parse_document(body);
        let title = document
            .select(&TITLE)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .unwrap_or_default();
        return Extracted { text: render_document(&document, mode), title, extractor: "html" };
    }

    Extracted { text: body.to_string(), title: String::new(), extractor: "raw" }
}

/// Reduce an HTML document to plain text or light markdown.
pub fn html_to_text(html: &str, mode: ExtractMode) -> String {
    render_document(&Html::parse_document(html), mode)
}

fn render_document(document: &Html, mode: ExtractMode) -> String {
    let mut out = String::new();
    render_element(document.root_element(), mode, &mut out);
    normalize(&out)
}

fn render_element(element: ElementRef<'_>, mode: ExtractMode, out: &mut String) {
    let name = element.value().name();
    if SKIP_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    if mode == ExtractMode::Markdown {
        if let Some(level) = heading_level(name) {
            break_line(out);
            out.push_str(&format!("{} {}", "#".repeat(level), inline_text(element)));
            break_line(out);
            return;
        }
        if name == "a"
            && let Some(href) = element.value().attr("href")
        {
            out.push_str(&format!("[{}]({href})", inline_text(element)));
            return;
        }
        if name == "li" {
            break_line(out);
            out.push_str("- ");
            render_children(element, mode, out);
            break_line(out);
            return;
        }
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        break_line(out);
    }
    render_children(element, mode, out);
    if block {
        break_line(out);
    }
}

fn render_children(element: ElementRef<'_>, mode: ExtractMode, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, mode, out);
                }
            }
            _ => {}
        }
    }
}

/// Append a text node with its whitespace collapsed, keeping one space at
/// either edge so inline siblings stay separated.
fn push_text(out: &mut String, text: &str) {
    let words = collapse_whitespace(text);
    let at_boundary = out.is_empty() || out.ends_with([' ', '\n']);
    if words.is_empty() {
        if !at_boundary {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !at_boundary {
        out.push(' ');
    }
    out.push_str(&words);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn inline_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_children(element, ExtractMode::Text, &mut out);
    collapse_whitespace(&out)
}

fn heading_level(name: &str) -> Option<usize> {
    match name.as_bytes() {
        [b'h', level @ b'1'..=b'6'] => Some(usize::from(level - b'0')),
        _ => None,
    }
}

fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim every line and keep at most one blank line in a row.
fn normalize(text: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in text.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim().to_string()
}
