use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::parallel::{ParallelFetcher, DEFAULT_WORKERS};
use crate::fetcher::{Fetcher, SchemeFetcher};

pub struct AppContext {
    pub config: Config,
    pub cache_path: PathBuf,
    pub parallel_fetcher: ParallelFetcher,
}

impl AppContext {
    pub fn new(config_dir: Option<&Path>) -> Result<Self> {
        Self::with_workers(config_dir, DEFAULT_WORKERS)
    }

    pub fn with_workers(config_dir: Option<&Path>, workers: usize) -> Result<Self> {
        let config = Config::load(config_dir)?;
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(SchemeFetcher::new(config.identity())?);
        Self::with_fetcher(config, fetcher, workers)
    }

    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        workers: usize,
    ) -> Result<Self> {
        let cache_path = config.cache_path()?;
        let parallel_fetcher = ParallelFetcher::with_workers(fetcher, workers);

        Ok(Self {
            config,
            cache_path,
            parallel_fetcher,
        })
    }
}
