pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod items;
pub mod observe;
pub mod pull;
pub mod scheduler;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use items::ItemService;
pub use observe::{PullObserver, TracingObserver};
pub use pull::Pipeline;
