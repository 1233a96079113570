use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};

use crate::catalog::{CatalogApi, ColorRecord, IdScheme, RemoteList};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListWishlists,
    CreateWishlist {
        name: String,
        description: String,
    },
    DeleteWishlist(String),
    CreateLot {
        object_id: String,
        color_id: String,
        list_id: String,
    },
    UpdateLot {
        list_id: String,
        lot_id: String,
        minimum_quantity: u32,
    },
    ColorCatalog,
    Lookup {
        code: String,
        scheme: IdScheme,
    },
}

/// In-memory catalog that records every call and keeps a live list set.
#[derive(Debug, Default)]
pub struct MockApi {
    pub lists: Vec<RemoteList>,
    pub colors: BTreeMap<String, ColorRecord>,
    pub lookups: BTreeMap<(String, IdScheme), Vec<String>>,
    pub failing_lookups: BTreeSet<String>,
    pub fail_color_catalog: bool,
    pub fail_list_wishlists: bool,
    pub fail_create_lot: bool,
    pub fail_update_lot: bool,
    pub calls: Vec<Call>,
    next_id: usize,
}

impl MockApi {
    pub fn with_lists(names: &[&str]) -> Self {
        let mut api = Self::default();
        for name in names {
            let id = api.allocate_id("list");
            api.lists.push(RemoteList {
                id,
                name: (*name).to_string(),
                description: String::new(),
            });
        }
        api
    }

    pub fn with_color(mut self, id: &str, name: &str) -> Self {
        self.colors.insert(
            id.to_string(),
            ColorRecord {
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_lookup(mut self, code: &str, scheme: IdScheme, ids: &[&str]) -> Self {
        self.lookups.insert(
            (code.to_string(), scheme),
            ids.iter().map(|id| (*id).to_string()).collect(),
        );
        self
    }

    pub fn list_names(&self) -> Vec<String> {
        self.lists.iter().map(|list| list.name.clone()).collect()
    }

    pub fn list_id(&self, name: &str) -> Option<String> {
        self.lists
            .iter()
            .find(|list| list.name == name)
            .map(|list| list.id.clone())
    }

    pub fn lookup_calls(&self) -> Vec<(String, IdScheme)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Lookup { code, scheme } => Some((code.clone(), *scheme)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(*call)).count()
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

impl CatalogApi for MockApi {
    fn list_wishlists(&mut self) -> Result<Vec<RemoteList>> {
        self.calls.push(Call::ListWishlists);
        if self.fail_list_wishlists {
            bail!("catalog API GET wishlist/lists failed with HTTP 401");
        }
        Ok(self.lists.clone())
    }

    fn create_wishlist(&mut self, name: &str, description: &str) -> Result<String> {
        self.calls.push(Call::CreateWishlist {
            name: name.to_string(),
            description: description.to_string(),
        });
        let id = self.allocate_id("list");
        self.lists.push(RemoteList {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
        });
        Ok(id)
    }

    fn delete_wishlist(&mut self, list_id: &str) -> Result<()> {
        self.calls.push(Call::DeleteWishlist(list_id.to_string()));
        if self.lists.len() == 1 && self.lists[0].id == list_id {
            bail!("catalog API POST wishlist/delete_list failed: cannot delete last list");
        }
        self.lists.retain(|list| list.id != list_id);
        Ok(())
    }

    fn create_lot(&mut self, object_id: &str, color_id: &str, list_id: &str) -> Result<String> {
        self.calls.push(Call::CreateLot {
            object_id: object_id.to_string(),
            color_id: color_id.to_string(),
            list_id: list_id.to_string(),
        });
        if self.fail_create_lot {
            bail!("catalog API POST wishlist/create_lot failed with HTTP 500");
        }
        Ok(self.allocate_id("lot"))
    }

    fn update_lot_quantity(
        &mut self,
        list_id: &str,
        lot_id: &str,
        minimum_quantity: u32,
    ) -> Result<()> {
        self.calls.push(Call::UpdateLot {
            list_id: list_id.to_string(),
            lot_id: lot_id.to_string(),
            minimum_quantity,
        });
        if self.fail_update_lot {
            bail!("catalog API POST wishlist/update failed with HTTP 500");
        }
        Ok(())
    }

    fn color_catalog(&mut self) -> Result<BTreeMap<String, ColorRecord>> {
        self.calls.push(Call::ColorCatalog);
        if self.fail_color_catalog {
            bail!("catalog API GET catalog/color_list failed with HTTP 500");
        }
        Ok(self.colors.clone())
    }

    fn lookup_object_ids(&mut self, code: &str, scheme: IdScheme) -> Result<Vec<String>> {
        self.calls.push(Call::Lookup {
            code: code.to_string(),
            scheme,
        });
        if self.failing_lookups.contains(code) {
            bail!("failed to call catalog API GET catalog/id_lookup");
        }
        Ok(self
            .lookups
            .get(&(code.to_string(), scheme))
            .cloned()
            .unwrap_or_default())
    }

    fn request_count(&self) -> usize {
        self.calls.len()
    }
}
