//! Deciding what to do with each item of a channel.
//!
//! Planning reads the filesystem but never writes to it.  The files in a feed
//! directory are the whole sync state: a finished file means "already have
//! it", a `.temp` file means "resume from its length", nothing means "fetch".
//!
//! ## Naming
//!
//! Episodes are normally stored under the last path segment of their
//! enclosure URL.  Some feeds serve every episode as e.g. `.../media.mp3`
//! behind different directories or query strings, which would make episodes
//! overwrite each other.  [`has_collisions`] detects this for a whole channel
//! before any item is planned, and when it fires every item of that channel
//! is named after its sanitised title instead.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::feed::{Channel, Item, UNTITLED};

/// Appended to the destination path while a transfer is in progress.
pub const STAGE_SUFFIX: &str = ".temp";

/// Appended to the destination path for the title/description text file.
pub const SIDECAR_SUFFIX: &str = ".txt";

const IMAGE_BASENAME: &str = "folder";
const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Characters that are not allowed in file names on common filesystems.
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Where an item lands on disk.  Derived fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Where the bytes come from.
    pub url: String,
    /// The finished file.  Only ever written by renaming `stage` onto it.
    pub dest: PathBuf,
    /// `<dest>.temp`, holding the bytes received so far.
    pub stage: PathBuf,
    /// `<dest>.txt`, the title and description.
    pub sidecar: PathBuf,
}

impl DownloadTarget {
    pub fn new(url: impl Into<String>, dest: PathBuf) -> Self {
        Self {
            url: url.into(),
            stage: with_suffix(&dest, STAGE_SUFFIX),
            sidecar: with_suffix(&dest, SIDECAR_SUFFIX),
            dest,
        }
    }

    /// The destination's file name, for log lines.
    pub fn file_name(&self) -> String {
        self.dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingEnclosure,
    /// The destination exists.  The target is kept so the sidecar can still
    /// be created if it went missing.
    AlreadyHave(DownloadTarget),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEnclosure => write!(f, "missing/empty enclosure"),
            SkipReason::AlreadyHave(_) => write!(f, "already have it"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Skip(SkipReason),
    Fetch(DownloadTarget),
    /// A stage file of `known_bytes` is already on disk.
    ResumeFetch {
        target: DownloadTarget,
        known_bytes: u64,
    },
}

/// An item paired with the decision made for it.
#[derive(Debug)]
pub struct PlannedItem<'a> {
    pub item: &'a Item,
    /// Decided before any transfer of the channel starts.
    pub action: Action,
}

/// True when two or more enclosure URLs in `channel` share a file name.
pub fn has_collisions(channel: &Channel) -> bool {
    let mut seen = HashSet::new();
    channel
        .items
        .iter()
        .filter_map(Item::enclosure_url)
        .filter_map(url_basename)
        .any(|name| !seen.insert(name))
}

/// Plan every item of `channel`, in document order, for the feed directory
/// `dir`.  The collision pre-pass runs once before any item is looked at.
pub fn plan_channel<'a>(
    channel: &'a Channel,
    dir: &Path,
) -> Result<Vec<PlannedItem<'a>>, SyncError> {
    let by_title = has_collisions(channel);
    channel
        .items
        .iter()
        .map(|item| {
            Ok(PlannedItem {
                item,
                action: plan_item(item, dir, by_title)?,
            })
        })
        .collect()
}

/// Plan a single item.  `by_title` is the channel-wide collision flag.
pub fn plan_item(item: &Item, dir: &Path, by_title: bool) -> Result<Action, SyncError> {
    let Some(url) = item.enclosure_url() else {
        return Ok(Action::Skip(SkipReason::MissingEnclosure));
    };

    let file_name = match url_basename(url) {
        Some(name) if !by_title => name,
        _ => title_file_name(&item.title, url),
    };
    let target = DownloadTarget::new(url, dir.join(file_name));

    if target.dest.exists() {
        return Ok(Action::Skip(SkipReason::AlreadyHave(target)));
    }

    match stage_len(&target.stage)? {
        Some(known_bytes) => Ok(Action::ResumeFetch {
            target,
            known_bytes,
        }),
        None => Ok(Action::Fetch(target)),
    }
}

/// Plan the channel cover image.  It is fetched once and never refreshed.
pub fn plan_image(image_url: &str, dir: &Path) -> Action {
    let extension = url_basename(image_url)
        .as_deref()
        .and_then(extension_of)
        .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string());
    let target = DownloadTarget::new(
        image_url,
        dir.join(format!("{IMAGE_BASENAME}.{extension}")),
    );

    if target.dest.exists() {
        Action::Skip(SkipReason::AlreadyHave(target))
    } else {
        Action::Fetch(target)
    }
}

/// Replace characters that are not allowed in file names with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// The last path segment of `url`, ignoring query and fragment.
fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let name = parsed.path().rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .filter(|ext| !ext.is_empty())
}

/// `<sanitised title>.<url extension>`.  Titles that would name the feed
/// directory itself or its parent (`.`, `..`) use [`UNTITLED`].
fn title_file_name(title: &str, url: &str) -> String {
    let stem = match sanitize_title(title) {
        stem if stem.trim_matches('.').is_empty() => UNTITLED.to_string(),
        stem => stem,
    };
    match url_basename(url).as_deref().and_then(extension_of) {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem,
    }
}

fn stage_len(stage: &Path) -> Result<Option<u64>, SyncError> {
    match fs::metadata(stage) {
        Ok(metadata) => Ok(Some(metadata.len())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SyncError::Io {
            path: stage.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
