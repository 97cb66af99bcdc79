//! Target selection before a bulk run
//!
//! The batch engine applies its change to every item it is given. Deciding
//! which items deserve a request happens here, from the labels the caller
//! already knows about.

use std::collections::HashMap;

use serde::Serialize;
use ulist_batch::{Item, LabelChange};

use crate::LABEL_WISHLIST;

/// Items split into those to process and those skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    /// Items that need the change
    pub targets: Vec<Item>,

    /// Skipped: already in the desired state
    pub already_applied: usize,

    /// Skipped: carry a protected label
    pub protected: usize,
}

impl TargetSummary {
    /// Total skipped items
    pub fn skipped(&self) -> usize {
        self.already_applied + self.protected
    }

    /// Items considered, processed or not
    pub fn considered(&self) -> usize {
        self.targets.len() + self.skipped()
    }
}

/// Which items to leave out of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRules {
    /// Skip items whose known labels already match the change
    ///
    /// Only meaningful when the caller knows each item's labels; with no
    /// known labels every item looks unlabeled.
    pub skip_applied: bool,

    /// Skip items carrying any of these labels
    pub protected: Vec<u32>,
}

impl TargetRules {
    /// Rules of the bulk blacklist action: skip blacklisted and wishlisted items
    pub fn bulk_blacklist() -> Self {
        Self {
            skip_applied: true,
            protected: vec![LABEL_WISHLIST],
        }
    }
}

/// Select the items `change` should be applied to
///
/// Items already in the desired state are skipped first (when the rules ask
/// for it); of the rest, items carrying a protected label are skipped.
/// Duplicate ids keep their first occurrence, with labels merged from every
/// occurrence.
pub fn select_targets(items: Vec<Item>, change: LabelChange, rules: &TargetRules) -> TargetSummary {
    let mut summary = TargetSummary::default();

    for item in dedup_items(items) {
        if rules.skip_applied && change.is_applied_to(&item) {
            summary.already_applied += 1;
        } else if rules.protected.iter().any(|label| item.has_label(*label)) {
            summary.protected += 1;
        } else {
            summary.targets.push(item);
        }
    }

    summary
}

fn dedup_items(items: Vec<Item>) -> Vec<Item> {
    let mut unique: Vec<Item> = Vec::with_capacity(items.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for item in items {
        match index.get(&item.id) {
            Some(&pos) => unique[pos].labels.extend(item.labels),
            None => {
                index.insert(item.id.clone(), unique.len());
                unique.push(item);
            }
        }
    }
    unique
}
