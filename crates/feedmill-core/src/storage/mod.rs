mod database;
mod feed_repo;
mod group_repo;
mod item_repo;
pub mod retry;

pub use database::{Database, DEFAULT_GROUP_ID};
pub use feed_repo::FeedRepository;
pub use group_repo::GroupRepository;
pub use item_repo::{ItemFilter, ItemRepository};
