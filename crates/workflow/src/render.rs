//! Template rendering and managed file blocks
//!
//! Templates are plain text with literal placeholder tokens such as
//! `<server_name>`. There is no templating language: each token is replaced
//! verbatim by its value. Rendered artifacts are written into target files
//! inside marker-delimited blocks so that re-running a step replaces the
//! block instead of appending a second copy.

use crate::context::CommandRunner;
use crate::error::{Error, Result};

/// Replace every occurrence of each placeholder with its value
///
/// Substitutions are applied in the order given. Keys must be non-empty and
/// no key may contain another, otherwise the result would depend on the
/// order; such sets are rejected. A value containing another placeholder
/// token is not re-expanded by earlier keys but would be by later ones, so
/// values should not contain placeholder tokens.
pub fn render(template: &str, substitutions: &[(&str, &str)]) -> Result<String> {
    validate_keys(substitutions)?;

    let mut out = template.to_string();
    for (key, value) in substitutions {
        if out.contains(key) {
            out = out.replace(key, value);
        }
    }
    Ok(out)
}

fn validate_keys(substitutions: &[(&str, &str)]) -> Result<()> {
    for (i, (first, _)) in substitutions.iter().enumerate() {
        if first.is_empty() {
            return Err(Error::EmptyPlaceholder);
        }
        for (second, _) in &substitutions[i + 1..] {
            if first.contains(second) || second.contains(first) {
                return Err(Error::OverlappingPlaceholders {
                    first: (*first).to_string(),
                    second: (*second).to_string(),
                });
            }
        }
    }
    Ok(())
}

/// List `<name>` tokens still present in rendered text
///
/// Only tokens made of lowercase letters, digits and underscores count, so
/// markup like `<VirtualHost>` or `</a>` is not reported.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            let token = format!("<{name}>");
            if !found.contains(&token) {
                found.push(token);
            }
        }
        rest = &after[end..];
    }

    found
}

/// Result of placing a block into file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEdit {
    /// The full new content
    pub content: String,
    /// Whether the content differs from the input
    pub changed: bool,
}

/// Marker lines delimiting a managed block
fn markers(marker: &str) -> (String, String) {
    (
        format!("# BEGIN stackup {marker}"),
        format!("# END stackup {marker}"),
    )
}

/// Insert or replace the block tagged `marker` in `existing`
///
/// The block is appended at the end of the file when absent. An existing
/// block with identical content leaves the file untouched. A BEGIN marker
/// without its END marker is an error.
pub fn upsert_block(existing: &str, block: &str, marker: &str) -> Result<BlockEdit> {
    let (begin, end) = markers(marker);
    let mut lines: Vec<&str> = existing.lines().collect();
    let block_lines: Vec<&str> = block.lines().collect();

    match lines.iter().position(|l| l.trim_end() == begin) {
        Some(start) => {
            let stop = lines[start + 1..]
                .iter()
                .position(|l| l.trim_end() == end)
                .map(|offset| start + 1 + offset)
                .ok_or_else(|| Error::UnterminatedBlock {
                    marker: marker.to_string(),
                })?;
            if lines[start + 1..stop] == block_lines[..] {
                return Ok(BlockEdit {
                    content: existing.to_string(),
                    changed: false,
                });
            }
            lines.splice(start + 1..stop, block_lines);
        }
        None => {
            lines.push(&begin);
            lines.extend(block_lines);
            lines.push(&end);
        }
    }

    let mut content = lines.join("\n");
    content.push('\n');
    Ok(BlockEdit {
        changed: content != existing,
        content,
    })
}

/// A file on the managed host holding one marker-delimited block
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub path: String,
    pub marker: String,
    pub elevate: bool,
}

impl ManagedFile {
    pub fn new(path: impl Into<String>, marker: impl Into<String>, elevate: bool) -> Self {
        Self {
            path: path.into(),
            marker: marker.into(),
            elevate,
        }
    }

    /// Make the file's block contain `text`, returning whether it changed
    pub fn apply(&self, runner: &dyn CommandRunner, text: &str) -> Result<bool> {
        let existing = runner.read_file(&self.path, self.elevate)?.unwrap_or_default();
        let edit = upsert_block(&existing, text, &self.marker)?;
        if !edit.changed {
            log::debug!("{} already up to date", self.path);
            return Ok(false);
        }
        log::debug!("writing block {} into {}", self.marker, self.path);
        runner.write_file(&self.path, &edit.content, self.elevate)?;
        Ok(true)
    }
}
