mod models;
mod parser;
mod reader;

pub use models::{Feed, FeedGroup, FeedRequestOptions, FeedUpdate, Group, Item, NewFeed, NewItem};
pub use parser::{parse_feed, ParsedFeed};
pub use reader::{FetchItemsResult, HttpFeedReader, ReadError, ReadFeedItems};
pub(crate) use reader::CLIENT_USER_AGENT;
