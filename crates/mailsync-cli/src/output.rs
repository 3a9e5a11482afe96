//! Rendering command results on stdout

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

/// Output encoding for structured results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

/// Encode `value` in the requested format
pub fn render<T: Serialize + ?Sized>(format: Format, value: &T) -> Result<String> {
    match format {
        Format::Json => {
            let mut json = serde_json::to_string_pretty(value).context("failed to encode")?;
            json.push('\n');
            Ok(json)
        }
        Format::Yaml => serde_yaml::to_string(value).context("failed to encode"),
    }
}

/// Write `value` to stdout
pub fn print<T: Serialize + ?Sized>(format: Format, value: &T) -> Result<()> {
    let rendered = render(format, value)?;
    let mut out = std::io::stdout().lock();
    out.write_all(rendered.as_bytes())?;
    out.flush()?;
    Ok(())
}
