//! Feed fetch, validation and parsing.
//!
//! This module defines the typed records a feed document is reduced to
//! ([`Channel`], [`Item`], [`Enclosure`]) and the RSS 2.0 reader that
//! produces them (in the `rss` submodule).
//!
//! Every optional element of the document is an `Option` here, so callers
//! have to decide what an absent enclosure or date means at each use site.

mod channel;
mod rss;

pub use self::channel::{local_time, Channel, Enclosure, Item, UNTITLED};
pub use self::rss::fetch_feed;
