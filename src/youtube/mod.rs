// Everything that talks to YouTube: the Data API, the results-page
// scraper, the cached search on top of both, and the yt-dlp extractor.

pub mod api;
pub mod extractor;
pub mod scrape;
pub mod search;
pub mod types;

pub use api::YouTubeApi;
pub use extractor::YouTubeExtractor;
pub use scrape::Scraper;
pub use search::SearchService;
pub use types::{SearchFilters, SearchItem, SearchParams};
