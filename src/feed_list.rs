//! The feed list ("serverlist") reader.
//!
//! One feed per line, in the same format podget uses:
//!
//! ```text
//! # comment
//! http://example.test/feed.xml sample My Show
//! ```
//!
//! The first two space-separated tokens are the URL and the category; the
//! rest of the line, trimmed, is the display name and also the directory the
//! feed is mirrored into.  Lines that do not have all three parts are skipped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// One feed to synchronise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    /// Address of the RSS document.
    pub url: String,
    /// Free-form grouping word.  Only shown in verbose output.
    pub category: String,
    /// Used verbatim as the output directory name.
    pub name: String,
}

/// Read and parse the feed list at `path`.
pub fn read_feed_list(path: &Path) -> Result<Vec<FeedDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read feed list {}", path.display()))?;
    Ok(parse_feed_list(&content))
}

/// Parse feed list text.  Never fails: malformed lines are dropped.
pub fn parse_feed_list(content: &str) -> Vec<FeedDescriptor> {
    content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<FeedDescriptor> {
    let mut parts = line.splitn(3, ' ');
    let url = parts.next()?;
    let category = parts.next()?;
    let name = parts.next()?.trim();

    if url.is_empty() || name.is_empty() {
        return None;
    }

    Some(FeedDescriptor {
        url: url.to_string(),
        category: category.to_string(),
        name: name.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
