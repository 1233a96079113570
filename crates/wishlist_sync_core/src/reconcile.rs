use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogApi, RemoteList};
use crate::colors::ColorMap;
use crate::input::{DesiredItem, DesiredList};
use crate::parts::PartIdentityCache;

/// The service refuses to delete an account's last wish list, so this list is
/// kept around permanently and never considered for deletion.
pub const DUMMY_LIST_NAME: &str = "empty placeholder list";

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Delete every remote list except the placeholder, not just the ones
    /// named in the data file.
    pub purge_lists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidQuantity { quantity: String },
    UnresolvedPart { detail: String },
    UnresolvedColor { color: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantity { quantity } => write!(f, "invalid quantity '{quantity}'"),
            Self::UnresolvedPart { detail } => write!(f, "no object id: {detail}"),
            Self::UnresolvedColor { color } => write!(f, "unknown color '{color}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub list: String,
    pub part_code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedList {
    pub name: String,
    pub list_id: String,
    pub lots_created: usize,
    pub quantity_updates: usize,
    pub items_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub dummy_created: bool,
    pub deleted_lists: Vec<String>,
    pub kept_lists: Vec<String>,
    pub created_lists: Vec<CreatedList>,
    pub lots_created: usize,
    pub quantity_updates: usize,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOutcome {
    Created { quantity_updated: bool },
    Skipped(SkipReason),
}

/// Remote lists to delete, in snapshot order. The placeholder list is never
/// returned. Without `purge_lists` only lists whose exact name appears in
/// `desired` are returned.
pub fn plan_deletions<'a>(
    remote: &'a [RemoteList],
    desired: &[DesiredList],
    purge_lists: bool,
) -> Vec<&'a RemoteList> {
    let desired_names: BTreeSet<&str> = desired.iter().map(|list| list.name.as_str()).collect();
    remote
        .iter()
        .filter(|list| list.name != DUMMY_LIST_NAME)
        .filter(|list| purge_lists || desired_names.contains(list.name.as_str()))
        .collect()
}

/// Converges the remote wish lists onto `desired`.
///
/// The remote list set is read once. The placeholder list is created before
/// anything is deleted, matching (or, with purge, all) lists are deleted, and
/// then every desired list is created fresh and filled lot by lot. Items whose
/// part, color or quantity cannot be resolved are skipped; any failing remote
/// call aborts the run.
pub fn reconcile<A: CatalogApi>(
    api: &mut A,
    desired: &[DesiredList],
    colors: &ColorMap,
    parts: &mut PartIdentityCache,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let remote = api
        .list_wishlists()
        .context("failed to fetch remote wish lists")?;
    debug!(count = remote.len(), "fetched remote wish lists");

    if !remote.iter().any(|list| list.name == DUMMY_LIST_NAME) {
        api.create_wishlist(DUMMY_LIST_NAME, "")
            .context("failed to create placeholder wish list")?;
        info!(name = DUMMY_LIST_NAME, "created placeholder wish list");
        report.dummy_created = true;
    }

    let doomed = plan_deletions(&remote, desired, options.purge_lists);
    for list in &remote {
        if list.name != DUMMY_LIST_NAME && !doomed.iter().any(|d| d.id == list.id) {
            report.kept_lists.push(list.name.clone());
        }
    }
    for list in doomed {
        api.delete_wishlist(&list.id)
            .with_context(|| format!("failed to delete wish list '{}' ({})", list.name, list.id))?;
        info!(name = %list.name, id = %list.id, "deleted wish list");
        report.deleted_lists.push(list.name.clone());
    }

    for list in desired {
        let created = create_list(api, list, colors, parts, &mut report)?;
        report.lots_created += created.lots_created;
        report.quantity_updates += created.quantity_updates;
        report.created_lists.push(created);
    }

    Ok(report)
}

fn create_list<A: CatalogApi>(
    api: &mut A,
    list: &DesiredList,
    colors: &ColorMap,
    parts: &mut PartIdentityCache,
    report: &mut ReconcileReport,
) -> Result<CreatedList> {
    let list_id = api
        .create_wishlist(&list.name, &list.description)
        .with_context(|| format!("failed to create wish list '{}'", list.name))?;
    info!(name = %list.name, id = %list_id, items = list.items.len(), "created wish list");

    let mut created = CreatedList {
        name: list.name.clone(),
        list_id,
        lots_created: 0,
        quantity_updates: 0,
        items_skipped: 0,
    };

    for item in &list.items {
        match add_item(api, &created.list_id, item, colors, parts)? {
            ItemOutcome::Created { quantity_updated } => {
                created.lots_created += 1;
                if quantity_updated {
                    created.quantity_updates += 1;
                }
            }
            ItemOutcome::Skipped(reason) => {
                warn!(
                    part = %item.part_code,
                    list = %list.name,
                    %reason,
                    "skipping wish list item"
                );
                created.items_skipped += 1;
                report.skipped.push(SkippedItem {
                    list: list.name.clone(),
                    part_code: item.part_code.clone(),
                    reason,
                });
            }
        }
    }

    Ok(created)
}

/// Resolution problems come back as `ItemOutcome::Skipped`; only failed lot
/// creation or quantity updates are errors.
fn add_item<A: CatalogApi>(
    api: &mut A,
    list_id: &str,
    item: &DesiredItem,
    colors: &ColorMap,
    parts: &mut PartIdentityCache,
) -> Result<ItemOutcome> {
    let Some(quantity) = item.parsed_quantity() else {
        return Ok(ItemOutcome::Skipped(SkipReason::InvalidQuantity {
            quantity: item.quantity.clone(),
        }));
    };

    let object_id = match item.explicit_object_id() {
        Some(object_id) => object_id.to_string(),
        None => match parts.resolve(api, &item.part_code) {
            Ok((object_id, _)) => object_id,
            Err(error) => {
                return Ok(ItemOutcome::Skipped(SkipReason::UnresolvedPart {
                    detail: format!("{error:#}"),
                }));
            }
        },
    };

    let Some(color_id) = colors.lookup(&item.color_name) else {
        return Ok(ItemOutcome::Skipped(SkipReason::UnresolvedColor {
            color: item.color_name.clone(),
        }));
    };

    let lot_id = api
        .create_lot(&object_id, color_id, list_id)
        .with_context(|| {
            format!(
                "failed to create lot for part '{}' (object {object_id}, color {color_id})",
                item.part_code
            )
        })?;

    // Lots are always created with a quantity of one.
    let quantity_updated = quantity != 1;
    if quantity_updated {
        api.update_lot_quantity(list_id, &lot_id, quantity)
            .with_context(|| {
                format!(
                    "failed to set quantity {quantity} on lot {lot_id} for part '{}'",
                    item.part_code
                )
            })?;
    }

    Ok(ItemOutcome::Created { quantity_updated })
}
