//! Records extracted from a single feed document.
//!
//! A [`Channel`] only lives for the duration of one sync run.  Nothing here
//! is persisted: the files on disk are the only state that survives.

use chrono::{DateTime, Local, Utc};

/// Title used when an item has no `<title>` element.
pub const UNTITLED: &str = "(untitled)";

/// The single `<channel>` of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// `<title>`, trimmed.  May be empty.
    pub title: String,

    /// `<lastBuildDate>`, when present and a valid RFC 2822 date.
    pub last_build_date: Option<DateTime<Utc>>,

    /// `<image><url>`, used for the `folder.<ext>` cover file.
    pub image_url: Option<String>,

    /// Items in document order.
    pub items: Vec<Item>,
}

/// One entry of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Human-readable title; [`UNTITLED`] when the feed gives none.
    pub title: String,

    /// `<pubDate>`, when present and a valid RFC 2822 date.
    pub pub_date: Option<DateTime<Utc>>,

    /// `<description>` as given, markup included.  Goes into the sidecar.
    pub description: Option<String>,

    /// The attached media.  Items without one cannot be downloaded.
    pub enclosure: Option<Enclosure>,
}

/// The `<enclosure>` of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    /// The `url` attribute.  Empty when the feed gives an empty one.
    pub url: String,
    /// The `type` attribute, e.g. `audio/mpeg`.
    pub mime_type: Option<String>,
    /// Advertised length in bytes.  Informational only; feeds often lie.
    pub length: Option<u64>,
}

impl Item {
    /// The enclosure URL, if the item has a non-empty one.
    pub fn enclosure_url(&self) -> Option<&str> {
        self.enclosure
            .as_ref()
            .map(|enclosure| enclosure.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// Format a feed timestamp the way the console output shows it.
pub fn local_time(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local)
        .format("%a %b %e %H:%M:%S %Y")
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
