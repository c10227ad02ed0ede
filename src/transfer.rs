//! Resumable downloads.
//!
//! Bytes are always written to `<dest>.temp` first.  The only write to the
//! destination path itself is the final rename, so `<dest>` is either absent
//! or complete.  A failed or killed transfer leaves the stage file behind and
//! its length is where the next attempt picks up, using a `Range` request.
//!
//! Server answers for a resume at offset `L`:
//!
//! | Status | Meaning | Stage file |
//! |---|---|---|
//! | 206 | range honoured | appended |
//! | 200 | range ignored, full body | truncated, rewritten |
//! | 416 | `L` is past the end: already complete | published as is |
//! | other | failure | left in place |

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::DateTime;
use filetime::FileTime;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, LAST_MODIFIED, RANGE};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::TransferError;
use crate::plan::{with_suffix, STAGE_SUFFIX};
use crate::progress::Progress;

/// Read buffer size while streaming a body to disk.
pub const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// New bytes were received and the file was published.
    Downloaded { bytes: u64, resumed_from: u64 },
    /// The server said there was nothing left to send; the stage file was
    /// published without transferring anything.
    AlreadyComplete,
}

/// Download `url` to `dest`, resuming from `<dest>.temp` when it exists.
pub fn transfer(
    client: &Client,
    url: &str,
    dest: &Path,
    progress: &mut Progress,
) -> Result<TransferOutcome, TransferError> {
    let stage = stage_path(dest);
    let offset = staged_len(&stage)?;

    let mut request = client.get(url);
    if offset > 0 {
        debug!("resuming {url} at byte {offset}");
        request = request.header(RANGE, format!("bytes={offset}-"));
    }
    let mut response = request.send()?;
    let status = response.status();

    let (file, resumed_from) = match status {
        StatusCode::RANGE_NOT_SATISFIABLE if offset > 0 => {
            debug!("{url}: range not satisfiable, stage file already complete");
            publish(&stage, dest, &response)?;
            return Ok(TransferOutcome::AlreadyComplete);
        }
        StatusCode::PARTIAL_CONTENT => {
            if let Some(start) = content_range_start(&response) {
                if start != offset {
                    return Err(TransferError::RangeMismatch {
                        url: url.to_string(),
                        expected: offset,
                        got: start,
                    });
                }
            }
            (open_stage(&stage, true)?, offset)
        }
        status if status.is_success() => (open_stage(&stage, false)?, 0),
        status => {
            return Err(TransferError::Status {
                url: url.to_string(),
                status,
            })
        }
    };

    let total = response.content_length().map(|len| resumed_from + len);
    let received = copy_body(&mut response, file, &stage, url, resumed_from, total, progress)?;
    progress.finish(resumed_from + received, total);

    publish(&stage, dest, &response)?;
    Ok(TransferOutcome::Downloaded {
        bytes: received,
        resumed_from,
    })
}

/// `<dest>.temp`
pub fn stage_path(dest: &Path) -> PathBuf {
    with_suffix(dest, STAGE_SUFFIX)
}

fn staged_len(stage: &Path) -> Result<u64, TransferError> {
    match fs::metadata(stage) {
        Ok(metadata) => Ok(metadata.len()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(source) => Err(io_error(stage, source)),
    }
}

fn open_stage(stage: &Path, append: bool) -> Result<File, TransferError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(stage).map_err(|source| io_error(stage, source))
}

fn copy_body(
    response: &mut Response,
    mut file: File,
    stage: &Path,
    url: &str,
    resumed_from: u64,
    total: Option<u64>,
    progress: &mut Progress,
) -> Result<u64, TransferError> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut received = 0u64;

    loop {
        let read = match response.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransferError::Body {
                    url: url.to_string(),
                    source,
                })
            }
        };
        file.write_all(&buf[..read])
            .map_err(|source| io_error(stage, source))?;
        received += read as u64;
        progress.update(resumed_from + received, total);
    }

    file.sync_all().map_err(|source| io_error(stage, source))?;
    Ok(received)
}

/// Move the stage file onto `dest` and apply the server's modification time.
fn publish(stage: &Path, dest: &Path, response: &Response) -> Result<(), TransferError> {
    fs::rename(stage, dest).map_err(|source| io_error(dest, source))?;

    if let Some(modified) = last_modified(response) {
        filetime::set_file_mtime(dest, modified).map_err(|source| io_error(dest, source))?;
    }
    Ok(())
}

fn last_modified(response: &Response) -> Option<FileTime> {
    let value = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    match DateTime::parse_from_rfc2822(value.trim()) {
        Ok(date) => Some(FileTime::from_unix_time(
            date.timestamp(),
            date.timestamp_subsec_nanos(),
        )),
        Err(error) => {
            debug!("ignoring unparsable Last-Modified {value:?}: {error}");
            None
        }
    }
}

/// First byte position of a `Content-Range: bytes <start>-<end>/<len>` header.
fn content_range_start(response: &Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_start(value)
}

fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

fn io_error(path: &Path, source: io::Error) -> TransferError {
    TransferError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
