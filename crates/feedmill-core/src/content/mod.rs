mod extract;
mod fetcher;

pub use extract::{extract_article, ExtractError, ExtractedArticle};
pub use fetcher::{ContentFetcher, FetchContent, FetchError, FetchedContent, DEFAULT_FETCH_TIMEOUT, MAX_PAGE_BYTES};
