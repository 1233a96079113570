use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheMap, CacheStore};
use crate::catalog::{CatalogApi, ColorRecord};

/// Lowercased color name to remote color id, built whole once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorMap {
    by_name: CacheMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSource {
    Cache,
    Remote,
}

impl ColorMap {
    pub fn from_cache(by_name: CacheMap) -> Self {
        let by_name = by_name
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();
        Self { by_name }
    }

    /// Inverts the remote id-keyed catalog into a name-keyed lookup.
    pub fn from_catalog(catalog: &BTreeMap<String, ColorRecord>) -> Self {
        let mut by_name = BTreeMap::new();
        for (id, record) in catalog {
            by_name.insert(record.name.to_lowercase(), id.clone());
        }
        Self { by_name }
    }

    pub fn lookup(&self, color_name: &str) -> Option<&str> {
        self.by_name
            .get(&color_name.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn as_map(&self) -> &CacheMap {
        &self.by_name
    }
}

/// Loads the color mapping from the cache file, or fetches the full remote
/// color catalog and writes the cache when no file exists yet. The cache is
/// never checked against the remote catalog.
pub fn resolve_colors<A: CatalogApi>(
    store: &CacheStore,
    cache_key: &str,
    api: &mut A,
) -> Result<(ColorMap, ColorSource)> {
    if let Some(cached) = store.load(cache_key)? {
        debug!(entries = cached.len(), "loaded color cache");
        return Ok((ColorMap::from_cache(cached), ColorSource::Cache));
    }

    let catalog = api
        .color_catalog()
        .context("failed to fetch the remote color catalog")?;
    let colors = ColorMap::from_catalog(&catalog);
    store.save(cache_key, colors.as_map())?;
    info!(entries = colors.len(), "fetched remote color catalog");
    Ok((colors, ColorSource::Remote))
}
