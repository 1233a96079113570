use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::cache::{CacheMap, CacheStore};
use crate::catalog::{CatalogApi, IdScheme};

/// Part code to catalog object id. Entries are only ever added during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartIdentityCache {
    entries: CacheMap,
    resolved_remotely: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSource {
    Cache,
    Remote,
}

impl PartIdentityCache {
    pub fn new(entries: CacheMap) -> Self {
        Self {
            entries,
            resolved_remotely: 0,
        }
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_remotely(&self) -> usize {
        self.resolved_remotely
    }

    pub fn as_map(&self) -> &CacheMap {
        &self.entries
    }

    /// Serves `code` from memory, falling back to the remote lookup strategies
    /// and remembering the answer for the rest of the run.
    pub fn resolve<A: CatalogApi>(
        &mut self,
        api: &mut A,
        code: &str,
    ) -> Result<(String, PartSource)> {
        if let Some(object_id) = self.get(code) {
            return Ok((object_id.to_string(), PartSource::Cache));
        }
        let object_id = resolve_object_id(api, code)?;
        self.entries
            .entry(code.to_string())
            .or_insert_with(|| object_id.clone());
        self.resolved_remotely += 1;
        Ok((object_id, PartSource::Remote))
    }
}

/// Looks up catalog object ids for `code` scheme by scheme, stopping at the
/// first scheme that yields candidates, and keeps the shortest candidate.
///
/// Shorter ids have so far been the parent object with longer ones being
/// variants ("901078" vs "901078-98"). This is a heuristic; nothing in the
/// catalog guarantees it.
pub fn resolve_object_id<A: CatalogApi>(api: &mut A, code: &str) -> Result<String> {
    for scheme in IdScheme::PRIORITY {
        let candidates = api
            .lookup_object_ids(code, scheme)
            .with_context(|| format!("id lookup for part '{code}' ({}) failed", scheme.as_str()))?;
        if let Some(object_id) = pick_shortest(&candidates) {
            debug!(
                code,
                scheme = scheme.as_str(),
                candidates = candidates.len(),
                object_id,
                "resolved part"
            );
            return Ok(object_id.to_string());
        }
    }
    bail!("no catalog object id found for part '{code}'")
}

/// Shortest non-empty candidate; the first one wins among equal lengths.
pub fn pick_shortest(candidates: &[String]) -> Option<&str> {
    let mut best: Option<&str> = None;
    for candidate in candidates.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        match best {
            Some(current) if candidate.len() >= current.len() => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Loads the part identity cache, runs `body` with it, then saves it whether
/// or not `body` succeeded. A corrupt cache file fails before `body` runs.
pub fn with_part_cache<T>(
    store: &CacheStore,
    cache_key: &str,
    body: impl FnOnce(&mut PartIdentityCache) -> Result<T>,
) -> Result<T> {
    let entries = store
        .load_or_default(cache_key)
        .context("failed to load part identity cache")?;
    let mut cache = PartIdentityCache::new(entries);
    debug!(entries = cache.len(), "loaded part identity cache");

    let outcome = body(&mut cache);
    let saved = store
        .save(cache_key, cache.as_map())
        .context("failed to save part identity cache");

    match (outcome, saved) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(save_error)) => Err(save_error),
        (Err(run_error), Ok(())) => Err(run_error),
        (Err(run_error), Err(save_error)) => {
            warn!(error = %format!("{save_error:#}"), "part identity cache was not saved");
            Err(run_error)
        }
    }
}
