//! The blocking HTTP client shared by feed fetching and enclosure transfers.

use std::time::Duration;

use reqwest::blocking::Client;

/// Identifies us to feed hosts.
pub const USER_AGENT: &str = concat!("feedcatch/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the client used for the whole run.
///
/// No overall request timeout is set: enclosures can be large and a slow
/// but live transfer should be allowed to finish.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
