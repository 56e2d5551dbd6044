//! Text and JSON rendering for command results

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::{self, Write};

use crate::config::OutputFormat;
use crate::scan::Finding;
use crate::services::MapEntry;
use crate::trace::{Chain, ChainLink};

/// Render any result as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
}

pub fn chain(chain: &Chain, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(chain),
        OutputFormat::Text => render_chain(chain),
    }
}

pub fn findings(findings: &[Finding], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(findings),
        OutputFormat::Text => render_findings(findings),
    }
}

pub fn map(entries: &[MapEntry], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(entries),
        OutputFormat::Text => render_map(entries),
    }
}

/// Run a text writer into a fresh string
fn render_text<F>(write: F) -> Result<String>
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    write(&mut out).context("Failed to render text output")?;
    Ok(out)
}

/// Chain as an indented tree, source at the top
pub fn render_chain(chain: &Chain) -> Result<String> {
    render_text(|out| write_chain(out, chain))
}

fn write_chain(out: &mut String, chain: &Chain) -> fmt::Result {
    writeln!(out, "{}", chain.target)?;
    writeln!(out, "  owner: {}", chain.owner)?;
    writeln!(out)?;

    for (depth, link) in chain.links.iter().enumerate() {
        let indent = "   ".repeat(depth);
        let branch = if depth == 0 { "" } else { "└─ " };
        let marker = if chain.broken_at == Some(depth) { "  <- broken" } else { "" };
        writeln!(out, "{}{}{}{}", indent, branch, link_line(link), marker)?;

        let detail_indent = "   ".repeat(depth + 1);
        if let Some(message) = &link.message {
            writeln!(out, "{}message: {}", detail_indent, message)?;
        }
        let fields = link.source.fields();
        if !fields.is_empty() {
            let joined: Vec<String> = fields
                .iter()
                .filter(|(name, value)| !(*name == "url" && link.is_external() && *value == link.name))
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            if !joined.is_empty() {
                writeln!(out, "{}{}", detail_indent, joined.join(" "))?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "end: {}", chain.end)
}

fn link_line(link: &ChainLink) -> String {
    if link.is_external() {
        return link.to_string();
    }
    let mut line = format!("{} {}", link, link.state);
    if link.suspended {
        line.push_str(" (suspended)");
    }
    if let Some(reason) = &link.reason {
        line.push_str(&format!(" [{}]", reason));
    }
    line
}

/// One block per finding, highest severity first
pub fn render_findings(findings: &[Finding]) -> Result<String> {
    if findings.is_empty() {
        return Ok("No findings\n".to_string());
    }
    render_text(|out| write_findings(out, findings))
}

fn write_findings(out: &mut String, findings: &[Finding]) -> fmt::Result {
    for finding in findings {
        writeln!(
            out,
            "{:<8} {:<32} {}",
            finding.severity.as_str().to_uppercase(),
            finding.rule_id,
            finding.subject
        )?;
        writeln!(out, "         {}", finding.message)?;
        writeln!(out, "         verify: {}", finding.verify_command)?;
    }
    writeln!(out, "{} finding(s)", findings.len())
}

/// Fixed-width table: object, owner, state
pub fn render_map(entries: &[MapEntry]) -> Result<String> {
    if entries.is_empty() {
        return Ok("No objects\n".to_string());
    }
    render_text(|out| write_map(out, entries))
}

fn write_map(out: &mut String, entries: &[MapEntry]) -> fmt::Result {
    let rows: Vec<(String, String, String)> = entries
        .iter()
        .map(|e| {
            let mut state = e.status.state.to_string();
            if e.status.suspended {
                state.push_str(" (suspended)");
            }
            (e.object.to_string(), e.owner.to_string(), state)
        })
        .collect();

    let object_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0).max("OBJECT".len());
    let owner_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0).max("OWNER".len());

    writeln!(
        out,
        "{:<ow$}  {:<pw$}  STATE",
        "OBJECT",
        "OWNER",
        ow = object_width,
        pw = owner_width
    )?;
    for (object, owner, state) in rows {
        writeln!(
            out,
            "{:<ow$}  {:<pw$}  {}",
            object,
            owner,
            state,
            ow = object_width,
            pw = owner_width
        )?;
    }
    Ok(())
}
