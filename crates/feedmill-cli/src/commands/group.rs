use anyhow::Result;

use feedmill_core::storage::{Database, GroupRepository};

use super::feed::{describe_auto_fetch, AutoFetch};

pub async fn add(db: &Database, name: &str, auto_fetch: Option<bool>) -> Result<()> {
    let group = GroupRepository::new(db).create(name, auto_fetch).await?;
    println!("Created group: {} ({})", group.name, group.id);
    Ok(())
}

pub async fn set(db: &Database, id: i64, auto_fetch: AutoFetch) -> Result<()> {
    let repo = GroupRepository::new(db);
    repo.set_auto_fetch(id, auto_fetch.0).await?;
    let group = repo.get(id).await?;
    println!(
        "Updated group {}: {} (full content: {})",
        group.id,
        group.name,
        describe_auto_fetch(group.auto_fetch_full_content)
    );
    Ok(())
}

pub async fn list(db: &Database) -> Result<()> {
    let groups = GroupRepository::new(db).list().await?;

    for group in &groups {
        println!(
            "  [{}] {} (full content: {})",
            group.id,
            group.name,
            describe_auto_fetch(group.auto_fetch_full_content)
        );
    }

    Ok(())
}
