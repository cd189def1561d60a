use anyhow::Result;

use feedmill_core::storage::{Database, FeedRepository};

pub async fn run(db: &Database, id: i64) -> Result<()> {
    if FeedRepository::new(db).delete(id).await? {
        println!("Unsubscribed from feed {} and removed its items.", id);
    } else {
        println!("Feed {} not found. Run 'feedmill list' to see subscriptions.", id);
    }

    Ok(())
}
