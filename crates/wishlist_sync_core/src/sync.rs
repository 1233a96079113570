use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::cache::CacheStore;
use crate::catalog::{BrickOwlClient, CatalogApi, CatalogClientConfig};
use crate::colors::{ColorSource, resolve_colors};
use crate::config::SyncConfig;
use crate::input::load_desired_lists;
use crate::parts::with_part_cache;
use crate::reconcile::{ReconcileOptions, ReconcileReport, reconcile};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub api_key: String,
    pub data_file: PathBuf,
    pub purge_lists: bool,
    /// Overrides `[cache] dir` from the config file.
    pub cache_dir: Option<PathBuf>,
    pub config: SyncConfig,
}

impl SyncOptions {
    fn cache_store(&self) -> CacheStore {
        CacheStore::new(
            self.cache_dir
                .clone()
                .unwrap_or_else(|| self.config.cache_dir()),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub color_source: ColorSource,
    pub colors_known: usize,
    pub parts_cached: usize,
    pub parts_resolved_remotely: usize,
    pub request_count: usize,
    #[serde(flatten)]
    pub lists: ReconcileReport,
}

pub fn run_sync(options: &SyncOptions) -> Result<SyncReport> {
    let mut client = BrickOwlClient::new(CatalogClientConfig::from_config(
        &options.config,
        &options.api_key,
    ))?;
    run_sync_with_api(options, &mut client)
}

/// One full pass: local files are read and validated before the first remote
/// call, and the part identity cache is written back on every exit path.
pub fn run_sync_with_api<A: CatalogApi>(
    options: &SyncOptions,
    api: &mut A,
) -> Result<SyncReport> {
    let desired = load_desired_lists(&options.data_file)?;
    let store = options.cache_store();
    info!(
        lists = desired.len(),
        cache_dir = %store.dir().display(),
        purge = options.purge_lists,
        "starting wish list sync"
    );

    with_part_cache(&store, options.config.parts_file(), |parts| {
        let (colors, color_source) = resolve_colors(&store, options.config.colors_file(), api)?;
        let lists = reconcile(
            api,
            &desired,
            &colors,
            parts,
            &ReconcileOptions {
                purge_lists: options.purge_lists,
            },
        )?;

        Ok(SyncReport {
            color_source,
            colors_known: colors.len(),
            parts_cached: parts.len(),
            parts_resolved_remotely: parts.resolved_remotely(),
            request_count: api.request_count(),
            lists,
        })
    })
}
