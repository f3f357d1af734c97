use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::types::{Label, ScanReport, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Html,
}

impl ReportFormat {
    /// Pick a format from the output file extension; anything unknown is text.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => ReportFormat::Json,
            Some("html") | Some("htm") => ReportFormat::Html,
            _ => ReportFormat::Text,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    start_time: String,
    end_time: String,
    duration_secs: f64,
    tested_count: u64,
    found_count: usize,
    interrupted: bool,
    results: &'a [ScanResult],
}

pub fn render(report: &ScanReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => render_json(report),
        ReportFormat::Html => Ok(render_html(report)),
    }
}

/// Render the report in the format implied by `path` and write it there.
pub fn write_report(path: impl AsRef<Path>, report: &ScanReport) -> Result<()> {
    let path = path.as_ref();
    let body = render(report, ReportFormat::from_path(path))?;
    fs::write(path, body).with_context(|| format!("failed to write report: {}", path.display()))
}

fn ts(t: OffsetDateTime) -> String {
    t.format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target   : {}", report.target);
    let _ = writeln!(out, "Started  : {}", ts(report.start_time));
    let _ = writeln!(out, "Finished : {}", ts(report.end_time));
    let _ = writeln!(out, "Duration : {:.2}s", report.duration_secs());
    let _ = writeln!(out, "Tested   : {}", report.tested_count);
    let _ = writeln!(out, "Found    : {}", report.found_count());
    if report.interrupted {
        let _ = writeln!(out, "Status   : interrupted");
    }
    out.push('\n');
    for r in &report.results {
        let _ = writeln!(out, "[{}] {}", r.status, r.url);
    }
    out
}

pub fn render_json(report: &ScanReport) -> Result<String> {
    let doc = JsonReport {
        target: &report.target,
        start_time: ts(report.start_time),
        end_time: ts(report.end_time),
        duration_secs: report.duration_secs(),
        tested_count: report.tested_count,
        found_count: report.found_count(),
        interrupted: report.interrupted,
        results: &report.results,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn badge_color(label: Label) -> &'static str {
    match label {
        Label::Found => "#2e7d32",
        Label::Redirect => "#1565c0",
        Label::Forbidden => "#f9a825",
        Label::Unauthorized => "#8e24aa",
        Label::Other => "#00838f",
        Label::Template => "#c62828",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_html(report: &ScanReport) -> String {
    let mut labels: Vec<Label> = report.results.iter().map(|r| r.label).collect();
    labels.sort();
    labels.dedup();

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>Scan report: {}</title>", escape_html(&report.target));
    out.push_str(
        "<style>\
body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;width:100%;margin-bottom:2em}\
td,th{border-bottom:1px solid #ddd;padding:.4em;text-align:left}\
.badge{color:#fff;border-radius:4px;padding:.1em .5em;font-weight:bold}\
.tpl{color:#c62828;font-style:italic}\
</style></head><body>\n",
    );
    let _ = writeln!(out, "<h1>Scan report: {}</h1>", escape_html(&report.target));
    out.push_str("<ul>\n");
    let _ = writeln!(out, "<li>Started: {}</li>", ts(report.start_time));
    let _ = writeln!(out, "<li>Finished: {}</li>", ts(report.end_time));
    let _ = writeln!(out, "<li>Duration: {:.2}s</li>", report.duration_secs());
    let _ = writeln!(out, "<li>Tested: {}</li>", report.tested_count);
    let _ = writeln!(out, "<li>Found: {}</li>", report.found_count());
    if report.interrupted {
        out.push_str("<li>Scan was interrupted</li>\n");
    }
    out.push_str("</ul>\n");

    for label in labels {
        let _ = writeln!(out, "<h2>{label}</h2>");
        out.push_str("<table><tr><th>Status</th><th>URL</th><th>Length</th><th>Template</th></tr>\n");
        for r in report.results.iter().filter(|r| r.label == label) {
            let template = r
                .matched_template
                .as_deref()
                .map(|t| format!("<span class=\"tpl\">{}</span>", escape_html(t)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "<tr><td><span class=\"badge\" style=\"background:{}\">{}</span></td>\
<td><a href=\"{url}\">{url}</a></td><td>{}</td><td>{}</td></tr>",
                badge_color(r.label),
                r.status,
                r.content_length,
                template,
                url = escape_html(&r.url),
            );
        }
        out.push_str("</table>\n");
    }
    out.push_str("</body></html>\n");
    out
}
