//! HTTP quote source backed by `reqwest`.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::source::{PushAck, QuoteSource};
use quotesync_engine::{Quote, RecordSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Category given to quotes mapped from posts.
pub const POSTS_CATEGORY: &str = "Server";

/// Shape of the server's list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// `GET /quotes` returns quotes as-is
    #[default]
    Quotes,
    /// `GET /posts?_limit=N` returns posts whose title becomes the quote text
    Posts,
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "quotes" => Ok(PayloadFormat::Quotes),
            "posts" => Ok(PayloadFormat::Posts),
            other => Err(format!("unknown payload format: {}", other)),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Quotes => f.write_str("quotes"),
            PayloadFormat::Posts => f.write_str("posts"),
        }
    }
}

/// A jsonplaceholder-style post.
#[derive(Debug, Deserialize)]
struct Post {
    title: String,
}

impl From<Post> for Quote {
    fn from(post: Post) -> Self {
        Quote::new(post.title, POSTS_CATEGORY)
    }
}

/// Fetches and pushes quotes over HTTP.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    base_url: String,
    format: PayloadFormat,
    posts_limit: usize,
}

impl HttpQuoteSource {
    /// Create a source for `base_url`, bounding every request by `timeout`.
    pub fn new(base_url: impl Into<String>, format: PayloadFormat, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            format,
            posts_limit: 5,
        })
    }

    /// Create a source from agent configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.server_url, config.payload, config.fetch_timeout)?
            .with_posts_limit(config.posts_limit))
    }

    /// Set how many posts to request in `posts` mode.
    pub fn with_posts_limit(mut self, limit: usize) -> Self {
        self.posts_limit = limit;
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.format)
    }

    fn decode(&self, body: &[u8]) -> Result<RecordSet> {
        let quotes: RecordSet = match self.format {
            PayloadFormat::Quotes => serde_json::from_slice(body)
                .map_err(|e| SyncError::MalformedPayload(e.to_string()))?,
            PayloadFormat::Posts => serde_json::from_slice::<Vec<Post>>(body)
                .map_err(|e| SyncError::MalformedPayload(e.to_string()))?
                .into_iter()
                .map(Quote::from)
                .collect(),
        };

        quotes
            .ensure_unique_keys()
            .map_err(|e| SyncError::MalformedPayload(e.to_string()))?;
        Ok(quotes)
    }
}

impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self) -> Result<RecordSet> {
        let mut request = self.client.get(self.collection_url());
        if self.format == PayloadFormat::Posts {
            request = request.query(&[("_limit", self.posts_limit)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!(
                "GET {} returned {}",
                self.collection_url(),
                status
            )));
        }

        let body = response.bytes().await?;
        self.decode(&body)
    }

    async fn push(&self, quote: &Quote) -> Result<PushAck> {
        let response = self
            .client
            .post(self.collection_url())
            .json(quote)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!(
                "POST {} returned {}",
                self.collection_url(),
                status
            )));
        }

        // Servers answer with the stored resource; only the id matters here
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        Ok(PushAck {
            id: body.get("id").and_then(serde_json::Value::as_u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(format: PayloadFormat) -> HttpQuoteSource {
        HttpQuoteSource::new("http://localhost:3000/", format, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn payload_format_parse_and_display() {
        assert_eq!("posts".parse::<PayloadFormat>(), Ok(PayloadFormat::Posts));
        assert!("rss".parse::<PayloadFormat>().is_err());
        assert_eq!(PayloadFormat::Quotes.to_string(), "quotes");
    }

    #[test]
    fn collection_url_trims_trailing_slash() {
        assert_eq!(
            source(PayloadFormat::Quotes).collection_url(),
            "http://localhost:3000/quotes"
        );
        assert_eq!(
            source(PayloadFormat::Posts).collection_url(),
            "http://localhost:3000/posts"
        );
    }

    #[test]
    fn decode_posts_maps_title_to_text() {
        let body = br#"[{"userId": 1, "id": 1, "title": "sunt aut", "body": "quia"}]"#;
        let quotes = source(PayloadFormat::Posts).decode(body).unwrap();

        assert_eq!(quotes.as_slice(), &[Quote::new("sunt aut", "Server")]);
        assert_eq!(quotes.as_slice()[0].id, None);
    }

    #[test]
    fn decode_rejects_garbage_and_duplicates() {
        let quotes = source(PayloadFormat::Quotes);

        let err = quotes.decode(b"<html>").unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));

        let body = br#"[{"id": 1, "text": "A", "category": "x"}, {"id": 1, "text": "B", "category": "x"}]"#;
        let err = quotes.decode(body).unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));
    }
}
