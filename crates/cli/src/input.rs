// Item list loading
//
// Design Decision: Detect the file format from its content, not its extension.
// A document starting with `[` is a JSON array of items; anything else is one
// id per line.

use std::path::Path;

use anyhow::{Context, Result};
use ulist_batch::Item;
use ulist_vndb::require_vn_id;

/// Collect items from command-line ids and an optional input file
///
/// Ids from the command line come first. Every id is normalized to `v<digits>`;
/// an unrecognized id fails the whole load.
pub fn load_items(ids: &[String], input: Option<&Path>) -> Result<Vec<Item>> {
    let mut items = ids
        .iter()
        .map(|id| Ok(Item::new(require_vn_id(id)?)))
        .collect::<Result<Vec<_>>>()?;

    if let Some(path) = input {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let parsed = parse_items(&raw)
            .with_context(|| format!("Invalid input file: {}", path.display()))?;
        items.extend(parsed);
    }

    Ok(items)
}

/// Parse an item document
pub fn parse_items(raw: &str) -> Result<Vec<Item>> {
    if raw.trim_start().starts_with('[') {
        let items: Vec<Item> = serde_json::from_str(raw).context("Malformed JSON item list")?;
        return items
            .into_iter()
            .map(|item| {
                Ok(Item {
                    id: require_vn_id(&item.id)?,
                    labels: item.labels,
                })
            })
            .collect();
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Ok(Item::new(require_vn_id(line)?)))
        .collect()
}
