//! RSS 2.0 reader.
//!
//! A document goes through three gates before it becomes a [`Channel`]:
//!
//! 1. It must be well-formed XML ([`FeedError::Parse`]).
//! 2. Its root element must declare `version="2.0"` exactly.  Other or
//!    missing versions are rejected rather than parsed best-effort
//!    ([`FeedError::Validation`]).
//! 3. The root must have exactly one child, and it must be `<channel>`
//!    ([`FeedError::Validation`]).
//!
//! The structural checks run on a [`quick_xml`] event stream; the field
//! extraction is left to the [`rss`](::rss) crate.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::channel::{Channel, Enclosure, Item, UNTITLED};
use crate::error::FeedError;

/// The only RSS version we accept.
pub const SUPPORTED_VERSION: &str = "2.0";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Download a feed and parse it.
///
/// A `charset` in the response's `Content-Type` is honoured for documents
/// that carry no `encoding` declaration of their own; those are transcoded
/// to UTF-8 before parsing.  Every string coming out of the parser is UTF-8.
pub fn fetch_feed(client: &Client, url: &str) -> Result<Channel, FeedError> {
    debug!("retrieving RSS {url}");
    let response = client.get(url).send()?.error_for_status()?;
    let charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_param)
        .map(str::to_owned);
    let body = response.bytes()?;
    parse_feed(&decode_body(&body, charset.as_deref())?)
}

/// Validate and parse an RSS document.  Performs no I/O.
pub fn parse_feed(xml: &[u8]) -> Result<Channel, FeedError> {
    validate_document(xml)?;
    let channel =
        ::rss::Channel::read_from(xml).map_err(|error| FeedError::Parse(error.to_string()))?;
    Ok(channel_from_rss(&channel))
}

/// The `charset` parameter of a `Content-Type` value, unquoted.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Bytes the XML parser can read: `body` as is, or transcoded to UTF-8 when
/// the server names a charset the document itself does not declare.
fn decode_body<'a>(
    body: &'a [u8],
    charset: Option<&str>,
) -> Result<Cow<'a, [u8]>, FeedError> {
    let Some(label) = charset else {
        return Ok(Cow::Borrowed(body));
    };
    if declares_encoding(body) {
        return Ok(Cow::Borrowed(body));
    }
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        debug!("unknown charset '{label}', parsing as declared");
        return Ok(Cow::Borrowed(body));
    };
    if encoding == UTF_8 {
        return Ok(Cow::Borrowed(body));
    }

    debug!("decoding feed as {}", encoding.name());
    let (text, _, had_errors) = encoding.decode(body);
    if had_errors {
        return Err(FeedError::Parse(format!("invalid {} data", encoding.name())));
    }
    Ok(Cow::Owned(text.into_owned().into_bytes()))
}

/// True when the XML declaration carries an `encoding` pseudo-attribute.
fn declares_encoding(xml: &[u8]) -> bool {
    let xml = xml.strip_prefix(UTF8_BOM).unwrap_or(xml);
    if !xml.starts_with(b"<?xml") {
        return false;
    }
    let end = xml
        .windows(2)
        .position(|pair| pair == b"?>")
        .unwrap_or(xml.len());
    xml[..end].windows(8).any(|word| word == b"encoding")
}

fn validate_document(xml: &[u8]) -> Result<(), FeedError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut version: Option<String> = None;
    let mut children: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                visit_element(&element, depth, &mut seen_root, &mut version, &mut children)?;
                depth += 1;
            }
            Ok(Event::Empty(element)) => {
                visit_element(&element, depth, &mut seen_root, &mut version, &mut children)?;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(error) => return Err(FeedError::Parse(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root || depth != 0 {
        return Err(FeedError::Parse("document has no complete root element".into()));
    }

    if version.as_deref() != Some(SUPPORTED_VERSION) {
        return Err(FeedError::Validation(format!(
            "unsupported RSS version: '{}'",
            version.as_deref().unwrap_or("none")
        )));
    }

    if children.len() != 1 || children[0] != "channel" {
        return Err(FeedError::Validation(
            "invalid number of channel elements".into(),
        ));
    }

    Ok(())
}

fn visit_element(
    element: &BytesStart<'_>,
    depth: usize,
    seen_root: &mut bool,
    version: &mut Option<String>,
    children: &mut Vec<String>,
) -> Result<(), FeedError> {
    match depth {
        0 if *seen_root => Err(FeedError::Parse(
            "more than one root element".into(),
        )),
        0 => {
            *seen_root = true;
            *version = element
                .attributes()
                .flatten()
                .find(|attr| attr.key.as_ref() == b"version")
                .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());
            Ok(())
        }
        1 => {
            children.push(String::from_utf8_lossy(element.name().as_ref()).into_owned());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn channel_from_rss(channel: &::rss::Channel) -> Channel {
    Channel {
        title: channel.title().trim().to_string(),
        last_build_date: channel.last_build_date().and_then(parse_date),
        image_url: channel
            .image()
            .map(|image| image.url().trim().to_string())
            .filter(|url| !url.is_empty()),
        items: channel.items().iter().map(item_from_rss).collect(),
    }
}

fn item_from_rss(item: &::rss::Item) -> Item {
    Item {
        title: item
            .title()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED)
            .to_string(),
        pub_date: item.pub_date().and_then(parse_date),
        description: item.description().map(String::from),
        enclosure: item.enclosure().map(|enclosure| Enclosure {
            url: enclosure.url().trim().to_string(),
            mime_type: Some(enclosure.mime_type().trim())
                .filter(|mime| !mime.is_empty())
                .map(String::from),
            length: enclosure.length().trim().parse().ok(),
        }),
    }
}

// Invalid dates degrade to None rather than failing the feed.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PODCAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>My Show</title>
    <lastBuildDate>Mon, 01 Jan 2024 00:00:00 +0000</lastBuildDate>
    <image>
      <url>http://example.test/cover.png</url>
      <title>My Show</title>
      <link>http://example.test/</link>
    </image>
    <item>
      <title>Episode 1</title>
      <pubDate>Tue, 02 Jan 2024 12:00:00 +0000</pubDate>
      <description>The first one</description>
      <enclosure url="http://example.test/ep1.mp3" length="1000" type="audio/mpeg"/>
    </item>
    <item>
      <title>Announcement</title>
      <description>No audio here</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_channel_and_items() {
        let channel = parse_feed(PODCAST.as_bytes()).unwrap();

        assert_eq!(channel.title, "My Show");
        assert!(channel.last_build_date.is_some());
        assert_eq!(
            channel.image_url.as_deref(),
            Some("http://example.test/cover.png")
        );
        assert_eq!(channel.items.len(), 2);

        let first = &channel.items[0];
        assert_eq!(first.title, "Episode 1");
        assert_eq!(first.description.as_deref(), Some("The first one"));
        assert!(first.pub_date.is_some());
        let enclosure = first.enclosure.as_ref().unwrap();
        assert_eq!(enclosure.url, "http://example.test/ep1.mp3");
        assert_eq!(enclosure.mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(enclosure.length, Some(1000));

        assert!(channel.items[1].enclosure.is_none());
    }

    #[test]
    fn items_keep_document_order() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
            <item><title>c</title></item>
            <item><title>a</title></item>
            <item><title>b</title></item>
        </channel></rss>"#;

        let channel = parse_feed(xml.as_bytes()).unwrap();
        let titles: Vec<_> = channel.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["c", "a", "b"]);
    }

    #[test]
    fn missing_title_and_bad_dates_degrade() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
            <lastBuildDate>yesterday</lastBuildDate>
            <item><pubDate>not-a-real-date</pubDate>
              <enclosure url="http://example.test/x.mp3" length="" type=""/></item>
        </channel></rss>"#;

        let channel = parse_feed(xml.as_bytes()).unwrap();
        assert!(channel.last_build_date.is_none());

        let item = &channel.items[0];
        assert_eq!(item.title, UNTITLED);
        assert!(item.pub_date.is_none());
        let enclosure = item.enclosure.as_ref().unwrap();
        assert_eq!(enclosure.mime_type, None);
        assert_eq!(enclosure.length, None);
    }

    #[test]
    fn rejects_other_versions() {
        let xml = r#"<rss version="0.91"><channel><title>t</title></channel></rss>"#;
        match parse_feed(xml.as_bytes()) {
            Err(FeedError::Validation(message)) => assert!(message.contains("0.91")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_version() {
        let xml = r#"<rss><channel><title>t</title></channel></rss>"#;
        assert!(matches!(
            parse_feed(xml.as_bytes()),
            Err(FeedError::Validation(_))
        ));
    }

    #[test]
    fn rejects_two_channels() {
        let xml = r#"<rss version="2.0">
            <channel><title>a</title></channel>
            <channel><title>b</title></channel>
        </rss>"#;
        assert!(matches!(
            parse_feed(xml.as_bytes()),
            Err(FeedError::Validation(_))
        ));
    }

    #[test]
    fn rejects_non_channel_top_level_element() {
        let xml = r#"<rss version="2.0"><head/></rss>"#;
        assert!(matches!(
            parse_feed(xml.as_bytes()),
            Err(FeedError::Validation(_))
        ));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let xml = r#"<rss version="2.0"><channel><title>t</wrong></channel></rss>"#;
        assert!(matches!(parse_feed(xml.as_bytes()), Err(FeedError::Parse(_))));
    }

    #[test]
    fn truncated_xml_is_a_parse_error() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>"#;
        assert!(matches!(parse_feed(xml.as_bytes()), Err(FeedError::Parse(_))));
    }

    #[tokio::test]
    async fn fetch_feed_sends_user_agent_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(header("user-agent", crate::http::USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(PODCAST))
            .mount(&server)
            .await;

        let url = format!("{}/feed.xml", server.uri());
        let channel = tokio::task::spawn_blocking(move || {
            let client = crate::http::build_client().unwrap();
            fetch_feed(&client, &url)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(channel.title, "My Show");
    }

    #[test]
    fn charset_is_read_from_content_type() {
        assert_eq!(
            charset_param("text/xml; charset=iso-8859-1"),
            Some("iso-8859-1")
        );
        assert_eq!(
            charset_param(r#"application/rss+xml;Charset="UTF-8""#),
            Some("UTF-8")
        );
        assert_eq!(charset_param("text/xml"), None);
    }

    #[test]
    fn declared_encoding_wins_over_header_charset() {
        let xml = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><rss/>";
        assert!(declares_encoding(xml));
        assert!(matches!(
            decode_body(xml, Some("iso-8859-1")).unwrap(),
            Cow::Borrowed(_)
        ));
        assert!(!declares_encoding(b"<?xml version=\"1.0\"?><rss/>"));
        assert!(!declares_encoding(b"<rss/>"));
    }

    #[tokio::test]
    async fn fetch_feed_decodes_header_charset() {
        let server = MockServer::start().await;
        let body = b"<rss version=\"2.0\"><channel><title>Caf\xE9</title>\
            <item><title>\xC9pisode 1</title><description>d\xE9j\xE0 vu</description></item>\
            </channel></rss>"
            .to_vec();
        Mock::given(method("GET"))
            .and(path("/latin1.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/xml; charset=iso-8859-1"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/latin1.xml", server.uri());
        let channel = tokio::task::spawn_blocking(move || {
            let client = crate::http::build_client().unwrap();
            fetch_feed(&client, &url)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(channel.title, "Café");
        assert_eq!(channel.items[0].title, "Épisode 1");
        assert_eq!(channel.items[0].description.as_deref(), Some("déjà vu"));
    }

    #[tokio::test]
    async fn fetch_feed_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/gone.xml", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            let client = crate::http::build_client().unwrap();
            fetch_feed(&client, &url)
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(FeedError::Fetch(_))));
    }
}
