use anyhow::{bail, Result};

use feedmill_core::{
    feed::FeedUpdate,
    storage::{Database, FeedRepository},
};

/// A full-content override: `on`, `off`, or `inherit` to clear it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoFetch(pub Option<bool>);

pub fn parse_auto_fetch(raw: &str) -> std::result::Result<AutoFetch, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" => Ok(AutoFetch(Some(true))),
        "off" | "false" => Ok(AutoFetch(Some(false))),
        "inherit" => Ok(AutoFetch(None)),
        _ => Err(format!("expected on, off or inherit, got {:?}", raw)),
    }
}

pub struct FeedSetArgs {
    pub name: Option<String>,
    pub group: Option<i64>,
    pub suspended: Option<bool>,
    pub auto_fetch: Option<AutoFetch>,
}

impl FeedSetArgs {
    fn to_update(&self) -> FeedUpdate {
        FeedUpdate {
            name: self.name.clone(),
            group_id: self.group,
            suspended: self.suspended,
            auto_fetch_full_content: self.auto_fetch.map(|AutoFetch(value)| value),
            ..Default::default()
        }
    }
}

pub async fn set(db: &Database, id: i64, args: FeedSetArgs) -> Result<()> {
    let update = args.to_update();
    if update.is_empty() {
        bail!("nothing to change: pass --name, --group, --suspended or --auto-fetch");
    }

    let repo = FeedRepository::new(db);
    repo.update(id, &update).await?;
    let feed = repo.get(id).await?;

    let state = if feed.suspended { "suspended" } else { "active" };
    println!(
        "Updated feed {}: {} in group '{}' ({}, full content: {})",
        feed.id,
        feed.name,
        feed.group.name,
        state,
        describe_auto_fetch(feed.auto_fetch_full_content)
    );
    Ok(())
}

pub fn describe_auto_fetch(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "on",
        Some(false) => "off",
        None => "inherited",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auto_fetch() {
        assert_eq!(parse_auto_fetch("ON").unwrap(), AutoFetch(Some(true)));
        assert_eq!(parse_auto_fetch("off").unwrap(), AutoFetch(Some(false)));
        assert_eq!(parse_auto_fetch("inherit").unwrap(), AutoFetch(None));
        assert!(parse_auto_fetch("sometimes").is_err());
    }

    #[test]
    fn test_set_args_map_to_update() {
        let empty = FeedSetArgs {
            name: None,
            group: None,
            suspended: None,
            auto_fetch: None,
        };
        assert!(empty.to_update().is_empty());

        let args = FeedSetArgs {
            suspended: Some(true),
            auto_fetch: Some(AutoFetch(None)),
            ..empty
        };
        let update = args.to_update();
        assert!(!update.is_empty());
        assert_eq!(update.suspended, Some(true));
        assert_eq!(update.auto_fetch_full_content, Some(None));
    }
}
