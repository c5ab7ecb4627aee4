// Fallback search that reads YouTube's own results page.
//
// The page embeds its data as `var ytInitialData = {...};`. We pull that
// object out with a streaming JSON reader (the script keeps going after the
// closing brace) and walk down to the video renderers.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::types::{default_thumbnail, SearchItem};
use crate::error::ScrapeError;

pub const DEFAULT_WEB_URL: &str = "https://www.youtube.com";

pub const MAX_SCRAPED: usize = 25;

// `sp` value that restricts results to videos
const VIDEO_ONLY: &str = "EgIQAQ==";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const INITIAL_DATA: &str = "ytInitialData";

const RESULTS_PATH: &str = "/contents/twoColumnSearchResultsRenderer/primaryContents\
                            /sectionListRenderer/contents/0/itemSectionRenderer/contents";

pub struct Scraper {
    http: Client,
    base_url: String,
}

impl Scraper {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Scraper {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchItem>, ScrapeError> {
        let url = format!("{}/results", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("search_query", query), ("sp", VIDEO_ONLY)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let items = parse_results_page(&html);
        debug!(query, count = items.len(), "scraped results page");
        Ok(items)
    }
}

// Every video on a results page, at most MAX_SCRAPED. A page we can't make
// sense of yields nothing.
pub fn parse_results_page(html: &str) -> Vec<SearchItem> {
    let Some(data) = extract_initial_data(html) else {
        return Vec::new();
    };
    let Some(contents) = data.pointer(RESULTS_PATH).and_then(Value::as_array) else {
        return Vec::new();
    };

    contents
        .iter()
        .filter_map(|entry| entry.get("videoRenderer"))
        .filter_map(video_renderer)
        .take(MAX_SCRAPED)
        .collect()
}

fn extract_initial_data(html: &str) -> Option<Value> {
    let start = html.find(INITIAL_DATA)? + INITIAL_DATA.len();
    let rest = &html[start..];
    let brace = rest.find('{')?;

    // `ytInitialData = {` or `window["ytInitialData"] = {`
    if !rest[..brace].trim().ends_with('=') {
        return None;
    }

    let mut stream = serde_json::Deserializer::from_str(&rest[brace..]).into_iter::<Value>();
    stream.next()?.ok()
}

fn video_renderer(renderer: &Value) -> Option<SearchItem> {
    let video_id = renderer.get("videoId")?.as_str()?;
    let title = renderer.pointer("/title/runs/0/text")?.as_str()?;
    let channel = renderer
        .pointer("/ownerText/runs/0/text")
        .or_else(|| renderer.pointer("/longBylineText/runs/0/text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(SearchItem::video(
        video_id,
        title,
        channel,
        &default_thumbnail(video_id),
    ))
}
