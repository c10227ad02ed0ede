//! Console logging.
//!
//! Log lines go to stderr without timestamps or targets: this is the tool's
//! normal output, not a service log.  The progress line stays on stdout.
//! `RUST_LOG` overrides the level chosen from the command line.

use std::io;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    fn level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }

    /// Whether transfers may draw a progress line.
    pub fn shows_progress(self) -> bool {
        self != Verbosity::Quiet
    }

    fn directives(self) -> String {
        format!("warn,{}={}", env!("CARGO_CRATE_NAME"), self.level())
    }
}

/// Install the global subscriber.  Call once, before anything logs.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));

    subscriber(verbosity, filter, io::stderr).init();
}

fn subscriber<W>(
    verbosity: Verbosity,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .without_time()
        .with_level(verbosity == Verbosity::Verbose)
        .finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
