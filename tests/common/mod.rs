#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use vast_chain::{FetchError, FetchResponse, VastFetcher};

enum Reply {
    Document(FetchResponse),
    Unreachable,
}

/// In-memory fetcher that records every URI it is asked for.
#[derive(Default)]
pub struct StubFetcher {
    replies: HashMap<String, Reply>,
    fetched: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: &str, body: impl Into<String>) -> Self {
        self.replies
            .insert(uri.to_string(), Reply::Document(FetchResponse::ok(body)));
        self
    }

    pub fn with_status(mut self, uri: &str, status: u16) -> Self {
        self.replies.insert(
            uri.to_string(),
            Reply::Document(FetchResponse {
                status,
                body: String::new(),
            }),
        );
        self
    }

    pub fn with_unreachable(mut self, uri: &str) -> Self {
        self.replies.insert(uri.to_string(), Reply::Unreachable);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

impl VastFetcher for StubFetcher {
    fn fetch(&self, uri: &str, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        self.fetched.lock().unwrap().push(uri.to_string());
        match self.replies.get(uri) {
            Some(Reply::Document(response)) => Ok(response.clone()),
            Some(Reply::Unreachable) => Err(FetchError::Request("connection refused".to_string())),
            None => Ok(FetchResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

pub fn wrapper(next: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="3.0">
  <Ad id="w">
    <Wrapper>
      <AdSystem>Exchange</AdSystem>
      <VASTAdTagURI><![CDATA[{next}]]></VASTAdTagURI>
    </Wrapper>
  </Ad>
</VAST>"#
    )
}

/// InLine document with one Linear creative holding `media` as
/// `(url, type, bitrate)` triples.
pub fn inline(media: &[(&str, &str, Option<u32>)], click: Option<&str>) -> String {
    let files: String = media
        .iter()
        .map(|(url, mime, bitrate)| {
            let bitrate = bitrate
                .map(|b| format!(r#" bitrate="{b}""#))
                .unwrap_or_default();
            format!(
                r#"<MediaFile delivery="progressive" type="{mime}"{bitrate} width="640" height="360"><![CDATA[{url}]]></MediaFile>"#
            )
        })
        .collect();
    let clicks = click
        .map(|c| format!("<VideoClicks><ClickThrough><![CDATA[{c}]]></ClickThrough></VideoClicks>"))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="3.0">
  <Ad id="final">
    <InLine>
      <AdSystem version="1.0">Origin</AdSystem>
      <AdTitle>Spot</AdTitle>
      <Creatives>
        <Creative id="c1">
          <Linear>
            <Duration>00:00:15</Duration>
            <MediaFiles>{files}</MediaFiles>
            {clicks}
          </Linear>
        </Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#
    )
}

/// Fetcher serving a chain of `wrappers` wrappers in front of `terminal`.
/// The first document lives at `hop(0)`.
pub fn chain(wrappers: usize, terminal: &str) -> StubFetcher {
    let mut fetcher = StubFetcher::new();
    for i in 0..wrappers {
        fetcher = fetcher.with_document(&hop(i), wrapper(&hop(i + 1)));
    }
    fetcher.with_document(&hop(wrappers), terminal)
}

pub fn hop(i: usize) -> String {
    format!("https://ads.example/hop/{i}")
}
