//! Markdown → HTML → PDF for generated reports.
//!
//! Rendering is best effort: the full stylesheet is tried first, then a
//! stripped-down one. If both fail the report is kept without a PDF.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use pulldown_cmark::{html, Event, Options, Parser};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

pub const REPORTS_DIR: &str = "reports";
pub const REPORT_FILE_PREFIX: &str = "immigration_report";

pub const FULL_STYLESHEET: &str = r#"
@page { size: A4; margin: 2cm; }
body { font-family: Helvetica, Arial, sans-serif; font-size: 11pt; line-height: 1.6; color: #333333; }
h1 { font-size: 24pt; font-weight: bold; color: #1a1a1a; margin-top: 20pt; margin-bottom: 12pt;
     border-bottom: 2px solid #2c5aa0; padding-bottom: 8pt; }
h2 { font-size: 18pt; font-weight: bold; color: #2c5aa0; margin-top: 16pt; margin-bottom: 10pt;
     border-bottom: 1px solid #e0e0e0; padding-bottom: 6pt; }
h3 { font-size: 14pt; font-weight: bold; color: #444444; margin-top: 12pt; margin-bottom: 8pt; }
h4 { font-size: 12pt; font-weight: bold; color: #555555; margin-top: 10pt; margin-bottom: 6pt; }
p { margin-top: 8pt; margin-bottom: 8pt; }
ul, ol { margin-top: 8pt; margin-bottom: 8pt; padding-left: 24pt; }
li { margin-top: 4pt; margin-bottom: 4pt; }
table { width: 100%; border-collapse: collapse; margin-top: 12pt; margin-bottom: 12pt; font-size: 10pt;
        page-break-inside: avoid; }
th { background-color: #2c5aa0; color: white; font-weight: bold; padding: 8pt; text-align: left;
     border: 1px solid #1a4a7a; }
td { padding: 6pt 8pt; border: 1px solid #dddddd; }
tr:nth-child(even) { background-color: #f9f9f9; }
blockquote { border-left: 4px solid #2c5aa0; padding-left: 12pt; margin-left: 0; margin-top: 8pt;
             margin-bottom: 8pt; color: #555555; font-style: italic; }
code { background-color: #f4f4f4; padding: 2pt 4pt; font-family: 'Courier New', monospace; font-size: 10pt; }
pre { background-color: #f4f4f4; padding: 8pt; margin-top: 8pt; margin-bottom: 8pt; }
pre code { background-color: transparent; padding: 0; }
hr { border: none; border-top: 1px solid #dddddd; margin: 16pt 0; }
strong { font-weight: bold; color: #1a1a1a; }
em { font-style: italic; }
h1, h2 { page-break-after: avoid; }
"#;

pub const SIMPLE_STYLESHEET: &str = r#"
@page { size: A4; margin: 2cm; }
body { font-family: Helvetica, Arial, sans-serif; font-size: 11pt; line-height: 1.6; }
h1 { font-size: 24pt; font-weight: bold; margin: 20pt 0 12pt 0; border-bottom: 2px solid #2c5aa0; padding-bottom: 8pt; }
h2 { font-size: 18pt; font-weight: bold; color: #2c5aa0; margin: 16pt 0 10pt 0; border-bottom: 1px solid #e0e0e0; padding-bottom: 6pt; }
h3 { font-size: 14pt; font-weight: bold; margin: 12pt 0 8pt 0; }
p { margin: 8pt 0; }
ul, ol { margin: 8pt 0; padding-left: 24pt; }
table { width: 100%; border-collapse: collapse; margin: 12pt 0; }
th { background-color: #2c5aa0; color: white; padding: 8pt; border: 1px solid #1a4a7a; }
td { padding: 6pt 8pt; border: 1px solid #dddddd; }
tr:nth-child(even) { background-color: #f9f9f9; }
"#;

/// Converts a standalone HTML document into a PDF file.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str, output: &Path) -> Result<()>;
}

/// Shells out to an HTML→PDF command invoked as `<command> <input.html> <output.pdf>`.
pub struct CommandPdfRenderer {
    command: String,
}

impl CommandPdfRenderer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl PdfRenderer for CommandPdfRenderer {
    async fn render(&self, html: &str, output: &Path) -> Result<()> {
        let input = tempfile::Builder::new()
            .prefix("report-")
            .suffix(".html")
            .tempfile()
            .context("failed to create temporary HTML file")?;
        tokio::fs::write(input.path(), html)
            .await
            .context("failed to write temporary HTML file")?;

        let result = Command::new(&self.command)
            .arg(input.path())
            .arg(output)
            .output()
            .await
            .with_context(|| format!("failed to run PDF command '{}'", self.command))?;

        if !result.status.success() {
            bail!(
                "PDF command '{}' exited with {}: {}",
                self.command,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            bail!("PDF command '{}' produced no output file", self.command);
        }
        Ok(())
    }
}

/// Where a rendered PDF ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPdf {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
}

/// Markdown with tables, lists, and single newlines kept as line breaks.
/// NUL bytes are stripped from the output.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out.replace('\0', "")
}

pub fn wrap_document(body: &str, stylesheet: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>{stylesheet}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

/// `<prefix>_<YYYYmmdd_HHMMSS>_<8 hex>.pdf`
pub fn generate_pdf_filename(prefix: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{timestamp}_{}.pdf", &unique[..8])
}

/// Renders `markdown` under `<media_root>/reports/`. Failures are logged and yield `None`.
pub async fn render_report_pdf(
    renderer: &dyn PdfRenderer,
    markdown: &str,
    media_root: &Path,
    media_url: &str,
) -> Option<RenderedPdf> {
    let dir = media_root.join(REPORTS_DIR);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        warn!("PDF generation skipped, cannot create {}: {e}", dir.display());
        return None;
    }

    let filename = generate_pdf_filename(REPORT_FILE_PREFIX);
    let path = dir.join(&filename);
    let body = markdown_to_html(markdown);

    if let Err(first) = renderer
        .render(&wrap_document(&body, FULL_STYLESHEET), &path)
        .await
    {
        warn!("PDF render with full stylesheet failed ({first:#}), retrying with simple stylesheet");
        if let Err(second) = renderer
            .render(&wrap_document(&body, SIMPLE_STYLESHEET), &path)
            .await
        {
            warn!("PDF generation failed, continuing without PDF: {second:#}");
            return None;
        }
    }

    info!("Report PDF written to {}", path.display());
    Some(RenderedPdf {
        url: format!("{media_url}{REPORTS_DIR}/{filename}"),
        filename,
        path,
    })
}
