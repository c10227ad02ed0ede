//! feedcatch — mirror podcast feeds into local folders.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────┐ descriptors ┌─────────┐  Channel  ┌─────────┐  Action  ┌────────────┐
//! │ feed_list  │ ──────────► │  feed/  │ ────────► │  plan   │ ───────► │  transfer  │
//! │ (file)     │             │ (HTTP)  │           │ (fs)    │          │  sidecar   │
//! └────────────┘             └─────────┘           └─────────┘          └────────────┘
//!                       driven one feed, one item at a time by `sync`
//! ```
//!
//! * **`feed_list`** — reads the `serverlist` file into feed descriptors.
//! * **`feed/`** — fetches a feed, checks it is RSS 2.0 with one channel,
//!   and extracts the channel and its items.
//! * **`plan`** — decides per item: skip, fetch, or resume, and which file
//!   name to use.
//! * **`transfer`** — range-resumable downloads through a `.temp` file.
//! * **`sidecar`** — the title/description text file next to each episode.
//! * **`sync`** — the loop tying the above together.
//! * **`main`** — parses arguments, sets up logging, and runs the loop.
//!
//! The files on disk are the only state.  Every run starts from scratch and
//! looks at what is already there.

mod error;
mod feed;
mod feed_list;
mod http;
mod logging;
mod plan;
mod progress;
mod sidecar;
mod sync;
mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use logging::Verbosity;
use sync::SyncOptions;

/// Download new episodes of the podcasts listed in a serverlist file.
#[derive(Parser, Debug)]
#[command(name = "feedcatch", version, about)]
struct Args {
    /// Verbose output
    #[arg(short, long, env = "FEEDCATCH_VERBOSE", conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, env = "FEEDCATCH_QUIET")]
    quiet: bool,

    /// Feed list file: one `<url> <category> <name>` per line
    #[arg(
        short,
        long,
        env = "FEEDCATCH_SERVERLIST",
        default_value = "serverlist"
    )]
    serverlist: PathBuf,

    /// Folder the per-feed directories are created in
    #[arg(short, long, env = "FEEDCATCH_OUTPUT", default_value = ".")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let verbosity = Verbosity::from_flags(args.verbose, args.quiet);
    logging::init(verbosity);

    let feeds = feed_list::read_feed_list(&args.serverlist)?;
    debug!("{} feeds in {}", feeds.len(), args.serverlist.display());

    let options = SyncOptions {
        output_dir: args.output,
        show_progress: verbosity.shows_progress(),
    };
    let client = http::build_client().context("failed to set up HTTP client")?;

    sync::sync_all(&client, &feeds, &options)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_podget_layout() {
        let args = Args::try_parse_from(["feedcatch"]).unwrap();
        assert_eq!(args.serverlist, PathBuf::from("serverlist"));
        assert_eq!(args.output, PathBuf::from("."));
        assert!(!args.verbose && !args.quiet);
    }

    #[test]
    fn short_flags_are_accepted() {
        let args =
            Args::try_parse_from(["feedcatch", "-v", "-s", "feeds.txt", "-o", "/srv/podcasts"])
                .unwrap();
        assert!(args.verbose);
        assert_eq!(args.serverlist, PathBuf::from("feeds.txt"));
        assert_eq!(args.output, PathBuf::from("/srv/podcasts"));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["feedcatch", "-v", "-q"]).is_err());
    }
}
