use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::reconcile::DUMMY_LIST_NAME;

/// A wish list as the local data file describes it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DesiredList {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "pieces")]
    pub items: Vec<DesiredItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DesiredItem {
    #[serde(rename = "id")]
    pub part_code: String,
    #[serde(rename = "qty")]
    pub quantity: String,
    #[serde(rename = "color")]
    pub color_name: String,
    #[serde(default, rename = "boid", skip_serializing_if = "Option::is_none")]
    pub explicit_object_id: Option<String>,
}

impl DesiredItem {
    /// Explicit object id from the data file; blank values count as absent.
    pub fn explicit_object_id(&self) -> Option<&str> {
        self.explicit_object_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Parsed quantity, or `None` when it is not a positive integer.
    pub fn parsed_quantity(&self) -> Option<u32> {
        self.quantity
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
    }
}

pub fn load_desired_lists(path: &Path) -> Result<Vec<DesiredList>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read wish list data from {}", path.display()))?;
    let lists: Vec<DesiredList> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse wish list data in {}", path.display()))?;
    validate_desired_lists(&lists)?;
    Ok(lists)
}

pub fn validate_desired_lists(lists: &[DesiredList]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for list in lists {
        if list.name.trim().is_empty() {
            bail!("wish list names must be non-empty");
        }
        if list.name == DUMMY_LIST_NAME {
            bail!("wish list name '{DUMMY_LIST_NAME}' is reserved for the placeholder list");
        }
        if !seen.insert(list.name.as_str()) {
            bail!("wish list '{}' is defined more than once", list.name);
        }
    }
    Ok(())
}
