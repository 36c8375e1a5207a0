//! Output renderers and formatting helpers for CLI commands.

use std::io::{self, Write};

use anyhow::anyhow;
use chrono::SecondsFormat;
use clap::ValueEnum;
use colored::Colorize;
use serde_json::Value;

use crate::client::{CliError, CliResult};
use crate::models::{LogRecord, Role};

const INDENT: &str = "  ";

/// Output format for commands that render structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Aligned columns for humans.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Writes command results to an output sink.
pub(crate) struct Renderer<W: Write = io::Stdout> {
    writer: W,
    color: bool,
}

impl Renderer {
    /// Renderer writing to standard output.
    #[must_use]
    pub(crate) fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> Renderer<W> {
    /// Renderer writing to `writer`; colors are only emitted when `color` is set.
    pub(crate) const fn new(writer: W, color: bool) -> Self {
        Self { writer, color }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.writer
    }

    /// Pretty-print a JSON body with two-space indentation.
    ///
    /// An empty body prints nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Render`] when the body is not JSON, or a failure
    /// when the sink cannot be written.
    pub(crate) fn render_json(&mut self, body: &[u8]) -> CliResult<()> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let value: Value = serde_json::from_slice(body).map_err(CliError::render)?;
        let text = pretty_json(&value, self.color);
        self.line(&text)
    }

    /// One line per log record.
    ///
    /// # Errors
    ///
    /// Returns a failure when the sink cannot be written.
    pub(crate) fn render_logs(&mut self, records: &[LogRecord]) -> CliResult<()> {
        for record in records {
            let line = format_log_line(record, self.color);
            self.line(&line)?;
        }
        Ok(())
    }

    /// Roles as a table or as JSON.
    ///
    /// # Errors
    ///
    /// Returns a failure when the roles cannot be encoded or written.
    pub(crate) fn render_roles(&mut self, roles: &[Role], format: OutputFormat) -> CliResult<()> {
        match format {
            OutputFormat::Json => {
                let value = serde_json::to_value(roles)
                    .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
                let text = pretty_json(&value, self.color);
                self.line(&text)
            }
            OutputFormat::Table => {
                if roles.is_empty() {
                    return self.line("No roles found.");
                }
                let header = format!("{:<32} {:<28} DESCRIPTION", "ID", "NAME");
                let header = paint(&header, self.color, |text| text.bold());
                self.line(&header)?;
                for role in roles {
                    let line = format!(
                        "{:<32} {:<28} {}",
                        role.id,
                        role.name,
                        role.description.as_deref().unwrap_or_default()
                    );
                    self.line(line.trim_end())?;
                }
                Ok(())
            }
        }
    }

    /// Write a plain line.
    ///
    /// # Errors
    ///
    /// Returns a failure when the sink cannot be written.
    pub(crate) fn line(&mut self, text: &str) -> CliResult<()> {
        writeln!(self.writer, "{text}")
            .and_then(|()| self.writer.flush())
            .map_err(|err| CliError::failure(anyhow!("failed to write output: {err}")))
    }
}

fn paint(text: &str, color: bool, style: impl FnOnce(&str) -> colored::ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

/// Format a log record as `[date] (type) key="value" ...`.
#[must_use]
pub(crate) fn format_log_line(record: &LogRecord, color: bool) -> String {
    let log_type = record.log_type.as_str();
    let log_type = if log_type.starts_with('s') {
        paint(log_type, color, |text| text.green())
    } else if log_type.starts_with('f') {
        paint(log_type, color, |text| text.bright_red())
    } else {
        log_type.to_string()
    };

    let date = record
        .date
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    let mut line = format!(
        "[{date}] ({log_type}) client_name={} client_id={}",
        quote(record.client_name.as_deref().unwrap_or_default()),
        quote(record.client_id.as_deref().unwrap_or_default()),
    );

    if let Some(user_agent) = record.user_agent() {
        line.push_str(" user_agent=");
        line.push_str(&quote(user_agent));
    }
    if let Some((error_type, message)) = record.error() {
        line.push_str(" error_type=");
        line.push_str(&quote(error_type));
        line.push_str(" error_message=");
        line.push_str(&quote(message));
    }
    line
}

/// Re-indent `value` with two spaces, optionally colorizing tokens.
#[must_use]
pub(crate) fn pretty_json(value: &Value, color: bool) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0, color);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize, color: bool) {
    match value {
        Value::Null => out.push_str(&paint("null", color, |text| text.dimmed())),
        Value::Bool(flag) => out.push_str(&paint(&flag.to_string(), color, |text| text.yellow())),
        Value::Number(number) => {
            out.push_str(&paint(&number.to_string(), color, |text| text.cyan()));
        }
        Value::String(text) => out.push_str(&paint(&quote(text), color, |text| text.green())),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                newline(out, depth + 1);
                write_value(out, item, depth + 1, color);
            }
            newline(out, depth);
            out.push(']');
        }
        Value::Object(fields) if fields.is_empty() => out.push_str("{}"),
        Value::Object(fields) => {
            out.push('{');
            for (index, (key, field)) in fields.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                newline(out, depth + 1);
                out.push_str(&paint(&quote(key), color, |text| text.blue()));
                out.push_str(": ");
                write_value(out, field, depth + 1, color);
            }
            newline(out, depth);
            out.push('}');
        }
    }
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    out.push_str(&INDENT.repeat(depth));
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
