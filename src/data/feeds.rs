//! RSS headline feeds
//!
//! Both the news page (VnExpress) and the finance page (MarketWatch real-time
//! headlines) show the first items of an RSS 2.0 channel.

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use thiserror::Error;

use super::{http_client, NewsItem};

/// VnExpress latest news
pub const NEWS_FEED_URL: &str = "https://vnexpress.net/rss/tin-moi-nhat.rss";

/// Dow Jones MarketWatch real-time headlines
pub const FINANCE_FEED_URL: &str = "https://feeds.content.dowjones.io/public/rss/mw_realtimeheadlines";

/// Number of items kept from each feed
pub const FEED_ITEM_LIMIT: usize = 20;

/// Errors that can occur when fetching a feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The feed is not well-formed XML
    #[error("Malformed feed: {0}")]
    XmlError(String),
}

/// Client for one RSS feed
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }

    /// The VnExpress latest-news feed
    pub fn news() -> Self {
        Self::new(NEWS_FEED_URL)
    }

    /// The MarketWatch headlines feed
    pub fn finance() -> Self {
        Self::new(FINANCE_FEED_URL)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the feed and return its first items
    pub async fn fetch_items(&self) -> Result<Vec<NewsItem>, FeedError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        parse_rss_items(&body, FEED_ITEM_LIMIT)
    }
}

/// Which child of `<item>` is being read
#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }

    fn slot<'a>(&self, item: &'a mut NewsItem) -> &'a mut Option<String> {
        match self {
            Field::Title => &mut item.title,
            Field::Link => &mut item.link,
            Field::PubDate => &mut item.pub_date,
        }
    }
}

/// Extract `{title, link, pubDate}` from the first `limit` `channel/item`
/// elements below the document root
///
/// Children that are absent stay `None`; an empty child is `Some("")`. Only
/// the first occurrence of each child counts.
pub fn parse_rss_items(content: &[u8], limit: usize) -> Result<Vec<NewsItem>, FeedError> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<NewsItem> = None;
    // Field being captured, and whether this is its first occurrence
    let mut capturing: Option<(Field, bool)> = None;
    let mut buf = Vec::new();

    while items.len() < limit {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FeedError::XmlError(e.to_string()))?
        {
            Event::Start(start) => {
                let name = start.local_name().as_ref().to_vec();
                if is_item_path(&path, &name) {
                    current = Some(NewsItem {
                        title: None,
                        link: None,
                        pub_date: None,
                    });
                } else if let (Some(item), true) = (current.as_mut(), path.len() == 3) {
                    if let Some(field) = Field::from_tag(&name) {
                        let slot = field.slot(item);
                        let first = slot.is_none();
                        if first {
                            *slot = Some(String::new());
                        }
                        capturing = Some((field, first));
                    }
                }
                path.push(name);
            }
            Event::Empty(start) => {
                let name = start.local_name().as_ref().to_vec();
                if is_item_path(&path, &name) {
                    items.push(NewsItem {
                        title: None,
                        link: None,
                        pub_date: None,
                    });
                } else if let (Some(item), true) = (current.as_mut(), path.len() == 3) {
                    if let Some(field) = Field::from_tag(&name) {
                        field.slot(item).get_or_insert_with(String::new);
                    }
                }
            }
            Event::Text(text) => {
                if let (Some(item), Some((field, true))) = (current.as_mut(), capturing) {
                    let text = text.unescape().map_err(|e| FeedError::XmlError(e.to_string()))?;
                    if let Some(slot) = field.slot(item).as_mut() {
                        slot.push_str(&text);
                    }
                }
            }
            Event::CData(data) => {
                if let (Some(item), Some((field, true))) = (current.as_mut(), capturing) {
                    if let Some(slot) = field.slot(item).as_mut() {
                        slot.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
            }
            Event::End(_) => {
                path.pop();
                match path.len() {
                    3 => capturing = None,
                    2 => {
                        if let Some(item) = current.take() {
                            items.push(item);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// True when `name` opens an `<item>` directly below `<root><channel>`
fn is_item_path(path: &[Vec<u8>], name: &[u8]) -> bool {
    path.len() == 2 && path[1] == b"channel" && name == b"item"
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Tin mới nhất - VnExpress RSS</title>
    <link>https://vnexpress.net/rss/tin-moi-nhat.rss</link>
    <item>
      <title><![CDATA[Giá vàng tăng mạnh]]></title>
      <link>https://vnexpress.net/gia-vang-tang-manh-1.html</link>
      <pubDate>Mon, 15 Jul 2024 10:00:00 +0700</pubDate>
      <description><![CDATA[<a href="x"><img src="y"></a>Mô tả]]></description>
    </item>
    <item>
      <title>Stocks &amp; bonds rally</title>
      <link>https://example.com/2</link>
    </item>
    <item>
      <title/>
      <link>https://example.com/3</link>
      <pubDate>Mon, 15 Jul 2024 08:00:00 +0700</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_items_with_cdata_and_entities() {
        let items = parse_rss_items(SAMPLE_FEED.as_bytes(), 20).expect("Feed should parse");

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title.as_deref(), Some("Giá vàng tăng mạnh"));
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://vnexpress.net/gia-vang-tang-manh-1.html")
        );
        assert_eq!(
            items[0].pub_date.as_deref(),
            Some("Mon, 15 Jul 2024 10:00:00 +0700")
        );
        assert_eq!(items[1].title.as_deref(), Some("Stocks & bonds rally"));
    }

    #[test]
    fn test_missing_children_are_none_and_empty_children_are_empty() {
        let items = parse_rss_items(SAMPLE_FEED.as_bytes(), 20).expect("Feed should parse");

        assert_eq!(items[1].pub_date, None);
        assert_eq!(items[2].title.as_deref(), Some(""));
    }

    #[test]
    fn test_channel_title_is_not_an_item() {
        let items = parse_rss_items(SAMPLE_FEED.as_bytes(), 20).expect("Feed should parse");

        assert!(items
            .iter()
            .all(|item| item.title.as_deref() != Some("Tin mới nhất - VnExpress RSS")));
    }

    #[test]
    fn test_limit_is_respected() {
        let body: String = (0..30)
            .map(|i| format!("<item><title>t{}</title></item>", i))
            .collect();
        let feed = format!("<rss><channel>{}</channel></rss>", body);

        let items = parse_rss_items(feed.as_bytes(), 20).expect("Feed should parse");

        assert_eq!(items.len(), 20);
        assert_eq!(items[19].title.as_deref(), Some("t19"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let feed = "<rss><channel><item><title>first</title><title>second</title></item></channel></rss>";

        let items = parse_rss_items(feed.as_bytes(), 20).expect("Feed should parse");

        assert_eq!(items[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn test_nested_items_elsewhere_are_ignored() {
        let feed = "<rss><item><title>stray</title></item><channel></channel></rss>";

        let items = parse_rss_items(feed.as_bytes(), 20).expect("Feed should parse");

        assert!(items.is_empty());
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        let result = parse_rss_items(b"<rss><channel><item></channel></rss>", 20);

        assert!(matches!(result, Err(FeedError::XmlError(_))));
    }

    #[test]
    fn test_default_clients() {
        assert_eq!(FeedClient::news().url(), NEWS_FEED_URL);
        assert_eq!(FeedClient::finance().url(), FINANCE_FEED_URL);
    }

    #[tokio::test]
    async fn test_fetch_against_unreachable_host_fails() {
        let client = FeedClient::new("http://127.0.0.1:9/rss");

        let result = client.fetch_items().await;

        assert!(matches!(result, Err(FeedError::HttpError(_))));
    }
}
