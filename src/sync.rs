//! The sync loop.
//!
//! Feeds are processed one at a time, items one at a time, each transfer
//! running to completion before the next starts.  A feed that cannot be
//! fetched or parsed is logged and skipped; an item that cannot be
//! downloaded is logged and skipped.  Only local filesystem failures stop
//! the run, because every following item would hit them too.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::error::{SyncError, TransferError};
use crate::feed::{fetch_feed, local_time, Channel, Item};
use crate::feed_list::FeedDescriptor;
use crate::plan::{plan_channel, plan_image, Action, DownloadTarget, SkipReason};
use crate::progress::Progress;
use crate::sidecar::ensure_sidecar;
use crate::transfer::{transfer, TransferOutcome};

/// Run-wide settings, fixed at start-up.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Feed directories are created under this folder.
    pub output_dir: PathBuf,
    /// Draw a progress line while downloading (terminal permitting).
    pub show_progress: bool,
}

/// What happened to the items of one feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    /// Transfers that published a file, resumed and 416-promoted included.
    pub downloaded: usize,
    /// Items without an enclosure or already on disk.
    pub skipped: usize,
    /// Transfers that failed; their stage files stay for the next run.
    pub failed: usize,
}

/// Synchronise every feed in order.
pub fn sync_all(
    client: &Client,
    feeds: &[FeedDescriptor],
    options: &SyncOptions,
) -> Result<(), SyncError> {
    for feed in feeds {
        info!("{}", "=".repeat(20));
        if let Some(summary) = sync_feed(client, feed, options)? {
            info!(
                "{}: {} downloaded, {} skipped, {} failed",
                feed.name, summary.downloaded, summary.skipped, summary.failed
            );
        }
    }
    Ok(())
}

/// Synchronise one feed into `<output_dir>/<name>`.
///
/// Returns `None` when the feed itself could not be fetched or was rejected;
/// nothing is planned or written in that case.
pub fn sync_feed(
    client: &Client,
    feed: &FeedDescriptor,
    options: &SyncOptions,
) -> Result<Option<FeedSummary>, SyncError> {
    debug!("{} [{}]: {}", feed.name, feed.category, feed.url);
    let channel = match fetch_feed(client, &feed.url) {
        Ok(channel) => channel,
        Err(error) => {
            warn!("{}: {error}", feed.name);
            return Ok(None);
        }
    };

    let dir = options.output_dir.join(&feed.name);
    sync_channel(client, &channel, &dir, options.show_progress).map(Some)
}

/// Download everything `channel` has that `dir` is missing.
pub fn sync_channel(
    client: &Client,
    channel: &Channel,
    dir: &Path,
    show_progress: bool,
) -> Result<FeedSummary, SyncError> {
    info!("Channel: {}", channel.title);
    if let Some(date) = &channel.last_build_date {
        info!("Build Date: {}", local_time(date));
    }

    fs::create_dir_all(dir).map_err(|source| SyncError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    if let Some(image_url) = &channel.image_url {
        match plan_image(image_url, dir) {
            Action::Fetch(target) => {
                debug!("Getting channel image {}", target.file_name());
                fetch(client, &target, false)?;
            }
            _ => debug!("Already have channel image"),
        }
    }

    let plan = plan_channel(channel, dir)?;
    let count = plan.len();
    debug!("Found {count} items in channel");

    let mut summary = FeedSummary::default();
    for (index, planned) in plan.into_iter().enumerate() {
        let item = planned.item;
        let date = item
            .pub_date
            .as_ref()
            .map(local_time)
            .unwrap_or_else(|| "no date".into());
        info!("{}/{count}, {date}: Episode '{}'", index + 1, item.title);

        let target = match planned.action {
            Action::Skip(SkipReason::AlreadyHave(target)) => {
                debug!("Already have {}", target.file_name());
                summary.skipped += 1;
                write_sidecar(item, &target)?;
                continue;
            }
            Action::Skip(reason) => {
                info!("Skipping '{}': {reason}", item.title);
                summary.skipped += 1;
                continue;
            }
            Action::Fetch(target) => {
                announce(item, &target);
                target
            }
            Action::ResumeFetch {
                target,
                known_bytes,
            } => {
                announce(item, &target);
                info!("Resuming {} at byte {known_bytes}", target.file_name());
                target
            }
        };

        if fetch(client, &target, show_progress)? {
            summary.downloaded += 1;
            write_sidecar(item, &target)?;
        } else {
            summary.failed += 1;
        }
    }

    Ok(summary)
}

fn announce(item: &Item, target: &DownloadTarget) {
    let enclosure = item.enclosure.as_ref();
    let mime = enclosure
        .and_then(|enclosure| enclosure.mime_type.as_deref())
        .unwrap_or("unknown");
    let length = enclosure
        .and_then(|enclosure| enclosure.length)
        .map(|length| length.to_string())
        .unwrap_or_else(|| "unknown".into());
    info!("Getting {} ({mime}, {length} bytes)", target.file_name());
}

/// Run one transfer.  `Ok(false)` means it failed and was logged; the run
/// goes on.
fn fetch(
    client: &Client,
    target: &DownloadTarget,
    show_progress: bool,
) -> Result<bool, SyncError> {
    let mut progress = if show_progress {
        Progress::for_stdout()
    } else {
        Progress::hidden()
    };
    match transfer(client, &target.url, &target.dest, &mut progress) {
        Ok(TransferOutcome::Downloaded {
            bytes,
            resumed_from,
        }) => {
            debug!(
                "{}: received {bytes} bytes after offset {resumed_from}",
                target.file_name()
            );
            Ok(true)
        }
        Ok(TransferOutcome::AlreadyComplete) => {
            info!("{} was already complete", target.file_name());
            Ok(true)
        }
        Err(TransferError::Io { path, source }) => Err(SyncError::Io { path, source }),
        Err(error) => {
            warn!("Failed to download {}: {error}", target.file_name());
            Ok(false)
        }
    }
}

fn write_sidecar(item: &Item, target: &DownloadTarget) -> Result<(), SyncError> {
    ensure_sidecar(&target.sidecar, &item.title, item.description.as_deref())
        .map(|_| ())
        .map_err(|source| SyncError::Io {
            path: target.sidecar.clone(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
