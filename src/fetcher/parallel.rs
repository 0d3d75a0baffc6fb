use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::app::{Result, TwetError};
use crate::config::SourceRegistry;
use crate::domain::Source;
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::Normalizer;
use crate::store::{Cache, CacheEntry};

pub const DEFAULT_WORKERS: usize = 50;

/// How one source fared in a fetch round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fresh,
    Unchanged,
    Failed(String),
}

/// Emitted once per finished source, in completion order.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    pub source: Source,
    pub status: SourceStatus,
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub fresh: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// `(nick, new address)` for feeds that answered from somewhere else
    pub relocated: Vec<(String, String)>,
}

impl FetchReport {
    /// Points the registry at the addresses feeds redirected to.
    pub fn apply_relocations(&self, registry: &mut dyn SourceRegistry) -> Result<()> {
        for (nick, address) in &self.relocated {
            tracing::info!("feed for {} moved to {}", nick, address);
            registry.relocate(nick, address)?;
        }
        Ok(())
    }
}

enum TaskOutcome {
    Unchanged { origin: Source },
    Fresh { origin: Source, entry: CacheEntry },
}

/// Fetches many sources at once, at most `workers` at a time.
///
/// The tasks never touch the cache: each one hands its outcome back and the
/// round applies it, so the cache only ever has a single writer.
pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
    normalizer: Normalizer,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            normalizer: Normalizer::new(),
        }
    }

    pub async fn fetch_all(
        &self,
        sources: &BTreeMap<String, String>,
        cache: &mut Cache,
    ) -> FetchReport {
        self.fetch_all_with_progress(sources, cache, |_| {}).await
    }

    /// Runs one fetch round over `sources` (nick → address), updating `cache`
    /// as results come in. Returns once every source has finished.
    pub async fn fetch_all_with_progress<F>(
        &self,
        sources: &BTreeMap<String, String>,
        cache: &mut Cache,
        mut on_progress: F,
    ) -> FetchReport
    where
        F: FnMut(&FetchProgress),
    {
        let total = sources.len();
        let mut tasks = JoinSet::new();

        for (nick, address) in sources {
            let source = Source::new(nick.clone(), address.clone());
            let freshness = cache.freshness(address).to_string();
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let normalizer = self.normalizer.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        fetch_single_source(&fetcher, &source, &freshness, &normalizer).await
                    }
                    Err(e) => Err(TwetError::Other(format!("fetch slots closed: {}", e))),
                };
                (source, result)
            });
        }

        let mut report = FetchReport::default();
        let mut done = 0;

        while let Some(joined) = tasks.join_next().await {
            done += 1;

            let (source, result) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let status = match result {
                Ok(TaskOutcome::Unchanged { origin }) => {
                    if origin.address != source.address {
                        report
                            .relocated
                            .push((source.nick.clone(), origin.address.clone()));
                        cache.relocate(&source.address, &origin.address);
                    }
                    report.unchanged += 1;
                    SourceStatus::Unchanged
                }
                Ok(TaskOutcome::Fresh { origin, entry }) => {
                    tracing::debug!(
                        "cached {} records from {}",
                        entry.records.len(),
                        origin.address
                    );
                    if origin.address != source.address {
                        report
                            .relocated
                            .push((source.nick.clone(), origin.address.clone()));
                    }
                    cache.put(origin.address, entry);
                    report.fresh += 1;
                    SourceStatus::Fresh
                }
                Err(e) => {
                    tracing::debug!("{}: failed to fetch: {}", source.address, e);
                    report.failed += 1;
                    SourceStatus::Failed(e.to_string())
                }
            };

            on_progress(&FetchProgress {
                source,
                status,
                done,
                total,
            });
        }

        report
    }
}

async fn fetch_single_source(
    fetcher: &Arc<dyn Fetcher + Send + Sync>,
    source: &Source,
    freshness: &str,
    normalizer: &Normalizer,
) -> Result<TaskOutcome> {
    match fetcher.fetch(&source.address, freshness).await? {
        FetchResult::Unchanged { canonical_address } => Ok(TaskOutcome::Unchanged {
            origin: Source::new(
                source.nick.clone(),
                canonical_address.unwrap_or_else(|| source.address.clone()),
            ),
        }),
        FetchResult::Fresh {
            body,
            freshness,
            canonical_address,
        } => {
            let origin = Source::new(
                source.nick.clone(),
                canonical_address.unwrap_or_else(|| source.address.clone()),
            );
            let records = normalizer.normalize(&origin, &body);

            Ok(TaskOutcome::Fresh {
                origin,
                entry: CacheEntry::new(records, freshness),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    /// Serves canned bodies and counts how many fetches overlap.
    #[derive(Default)]
    struct ScriptedFetcher {
        bodies: HashMap<String, String>,
        redirects: HashMap<String, String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        seen_freshness: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedFetcher {
        fn with_body(mut self, address: &str, body: &str) -> Self {
            self.bodies.insert(address.into(), body.into());
            self
        }

        fn with_redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.into(), to.into());
            self
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, address: &str, freshness: &str) -> Result<FetchResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen_freshness
                .lock()
                .unwrap()
                .push((address.to_string(), freshness.to_string()));

            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let Some(body) = self.bodies.get(address) else {
                return Err(TwetError::Other(format!("connection refused: {}", address)));
            };

            let token = format!("v1:{}", address);
            if freshness == token {
                return Ok(FetchResult::Unchanged {
                    canonical_address: self.redirects.get(address).cloned(),
                });
            }

            Ok(FetchResult::Fresh {
                body: body.clone(),
                freshness: token,
                canonical_address: self.redirects.get(address).cloned(),
            })
        }
    }

    fn sources(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(n, a)| (n.to_string(), a.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut fetcher = ScriptedFetcher::default();
        let mut list = BTreeMap::new();
        for i in 0..40 {
            let address = format!("https://peer{}.example/twtxt.txt", i);
            fetcher = fetcher.with_body(&address, "2021-01-01T00:00:00Z\thi\n");
            list.insert(format!("peer{}", i), address);
        }
        let fetcher = Arc::new(fetcher);
        let parallel = ParallelFetcher::with_workers(fetcher.clone(), 4);

        let mut cache = Cache::new();
        let report = parallel.fetch_all(&list, &mut cache).await;

        assert_eq!(report.fresh, 40);
        assert_eq!(cache.len(), 40);
        let max = fetcher.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "saw {} concurrent fetches", max);
        assert!(max >= 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let good = "https://good.example/twtxt.txt";
        let bad = "https://bad.example/twtxt.txt";
        let fetcher = Arc::new(
            ScriptedFetcher::default().with_body(good, "2021-01-01T00:00:00Z\tfine\n"),
        );
        let parallel = ParallelFetcher::new(fetcher);

        let mut cache = Cache::new();
        let bad_origin = Source::new("bad", bad);
        let old = CacheEntry::new(
            vec![crate::domain::Record::new(
                bad_origin,
                chrono::Utc::now(),
                "from an earlier round",
            )],
            "old-token",
        );
        cache.put(bad, old.clone());

        let report = parallel
            .fetch_all(&sources(&[("good", good), ("bad", bad)]), &mut cache)
            .await;

        assert_eq!(report.fresh, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(cache.get(bad), Some(&old));
        assert_eq!(cache.records(good).len(), 1);
        assert_eq!(cache.records(good)[0].text, "fine");
    }

    #[tokio::test]
    async fn test_second_round_is_unchanged() {
        let address = "https://alice.example/twtxt.txt";
        let fetcher = Arc::new(
            ScriptedFetcher::default().with_body(address, "2021-01-01T00:00:00Z\thello\n"),
        );
        let parallel = ParallelFetcher::new(fetcher.clone());
        let list = sources(&[("alice", address)]);

        let mut cache = Cache::new();
        parallel.fetch_all(&list, &mut cache).await;
        let after_first = cache.clone();

        let report = parallel.fetch_all(&list, &mut cache).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.fresh, 0);
        assert_eq!(cache, after_first);

        let seen = fetcher.seen_freshness.lock().unwrap().clone();
        assert_eq!(seen[0].1, "");
        assert_eq!(seen[1].1, format!("v1:{}", address));
    }

    #[tokio::test]
    async fn test_redirect_is_reported_and_cached_under_new_address() {
        let old = "http://carol.example/twtxt.txt";
        let new = "https://carol.example/twtxt.txt";
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_body(old, "2021-01-01T00:00:00Z\tmoved\n")
                .with_redirect(old, new),
        );
        let parallel = ParallelFetcher::new(fetcher);

        let mut registry = sources(&[("carol", old)]);
        let mut cache = Cache::new();
        let report = parallel.fetch_all(&registry, &mut cache).await;

        assert_eq!(report.relocated, vec![("carol".to_string(), new.to_string())]);
        assert!(cache.get(old).is_none());
        assert_eq!(cache.records(new)[0].origin.address, new);

        report.apply_relocations(&mut registry).unwrap();
        assert_eq!(registry.get("carol").map(String::as_str), Some(new));
    }

    #[tokio::test]
    async fn test_redirect_while_unchanged_moves_cached_entry() {
        let old = "http://dave.example/twtxt.txt";
        let new = "https://dave.example/twtxt.txt";
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_body(old, "2021-01-01T00:00:00Z\tstill here\n")
                .with_redirect(old, new),
        );
        let parallel = ParallelFetcher::new(fetcher);

        let mut cache = Cache::new();
        cache.put(
            old,
            CacheEntry::new(
                vec![crate::domain::Record::new(
                    Source::new("dave", old),
                    chrono::Utc::now(),
                    "cached",
                )],
                format!("v1:{}", old),
            ),
        );

        let report = parallel
            .fetch_all(&sources(&[("dave", old)]), &mut cache)
            .await;

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.relocated, vec![("dave".to_string(), new.to_string())]);
        assert!(cache.get(old).is_none());
        assert_eq!(cache.freshness(new), format!("v1:{}", old));
        assert_eq!(cache.records(new)[0].text, "cached");
        assert_eq!(cache.records(new)[0].origin.address, new);
    }

    #[tokio::test]
    async fn test_progress_reports_every_source() {
        let a = "https://a.example/twtxt.txt";
        let fetcher = Arc::new(ScriptedFetcher::default().with_body(a, ""));
        let parallel = ParallelFetcher::new(fetcher);

        let mut seen = Vec::new();
        let mut cache = Cache::new();
        parallel
            .fetch_all_with_progress(
                &sources(&[("a", a), ("b", "https://b.example/twtxt.txt")]),
                &mut cache,
                |p| seen.push((p.done, p.total, p.status.clone())),
            )
            .await;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, 2);
        assert!(seen.iter().all(|(_, total, _)| *total == 2));
        assert!(seen.iter().any(|(_, _, s)| *s == SourceStatus::Fresh));
        assert!(seen
            .iter()
            .any(|(_, _, s)| matches!(s, SourceStatus::Failed(_))));
    }

    #[tokio::test]
    async fn test_empty_round() {
        let parallel = ParallelFetcher::new(Arc::new(ScriptedFetcher::default()));
        let mut cache = Cache::new();
        let report = parallel.fetch_all(&BTreeMap::new(), &mut cache).await;
        assert_eq!(report, FetchReport::default());
    }
}
