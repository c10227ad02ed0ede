//! The `<episode>.txt` file stored next to each download.
//!
//! It holds the item title, a blank line and the description, UTF-8
//! encoded.  It is written once and never touched again, even when the
//! feed later changes the description.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::plan::{with_suffix, STAGE_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarOutcome {
    Written,
    AlreadyPresent,
}

/// Create `path` with the item text unless it already exists.
///
/// The text is staged in `<path>.temp` and renamed into place, so a write
/// that fails half-way never leaves a short sidecar that later runs would
/// keep.
pub fn ensure_sidecar(
    path: &Path,
    title: &str,
    description: Option<&str>,
) -> io::Result<SidecarOutcome> {
    if path.exists() {
        return Ok(SidecarOutcome::AlreadyPresent);
    }

    let stage = with_suffix(path, STAGE_SUFFIX);
    let mut file = File::create(&stage)?;
    file.write_all(render(title, description, path).as_bytes())?;
    file.sync_all()?;
    fs::rename(&stage, path)?;
    Ok(SidecarOutcome::Written)
}

fn render(title: &str, description: Option<&str>, path: &Path) -> String {
    match description {
        Some(description) => format!("{title}\n\n{description}\n"),
        None => {
            debug!("no description found for {}", path.display());
            format!("{title}\n")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_title_blank_line_and_description() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ep1.mp3.txt");

        let outcome = ensure_sidecar(&path, "Episode 1", Some("Über café ☕")).unwrap();

        assert_eq!(outcome, SidecarOutcome::Written);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Episode 1\n\nÜber café ☕\n"
        );
    }

    #[test]
    fn missing_description_omits_the_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ep1.mp3.txt");

        ensure_sidecar(&path, "Episode 1", None).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "Episode 1\n");
    }

    #[test]
    fn existing_sidecar_is_never_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ep1.mp3.txt");
        ensure_sidecar(&path, "Episode 1", Some("old text")).unwrap();

        let outcome = ensure_sidecar(&path, "Episode 1", Some("new text")).unwrap();

        assert_eq!(outcome, SidecarOutcome::AlreadyPresent);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Episode 1\n\nold text\n"
        );
    }

    #[test]
    fn leftover_stage_is_replaced_not_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ep1.mp3.txt");
        let stage = dir.path().join("ep1.mp3.txt.temp");
        fs::write(&stage, "Epis").unwrap();

        let outcome = ensure_sidecar(&path, "Episode 1", Some("full text")).unwrap();

        assert_eq!(outcome, SidecarOutcome::Written);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Episode 1\n\nfull text\n"
        );
        assert!(!stage.exists());
    }
}
