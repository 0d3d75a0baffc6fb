//! Merging cached feeds into one ordered timeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::Record;
use crate::store::Cache;

/// Which records make it into the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineFilter {
    All,
    /// Created at most this long before now
    Within(TimeDelta),
    /// Created after this instant, typically the previous run
    Since(DateTime<Utc>),
}

impl TimelineFilter {
    pub fn keeps(&self, record: &Record, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Within(window) => now - record.created <= *window,
            Self::Since(marker) => record.created > *marker,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Collects the cached records of `sources` (nick → address), sorted by
/// creation time and filtered.
///
/// Sources sharing an address contribute their records once. Records with
/// equal timestamps keep their relative feed order.
pub fn assemble(
    cache: &Cache,
    sources: &BTreeMap<String, String>,
    filter: TimelineFilter,
    order: Order,
    now: DateTime<Utc>,
) -> Vec<Record> {
    let addresses: BTreeSet<&str> = sources.values().map(String::as_str).collect();

    let mut records: Vec<Record> = addresses
        .into_iter()
        .flat_map(|address| cache.records(address).iter())
        .filter(|record| filter.keeps(record, now))
        .cloned()
        .collect();

    match order {
        Order::OldestFirst => records.sort_by(|a, b| a.created.cmp(&b.created)),
        Order::NewestFirst => records.sort_by(|a, b| b.created.cmp(&a.created)),
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;
    use crate::store::CacheEntry;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, day, hour, 0, 0).unwrap()
    }

    fn fixture() -> (Cache, BTreeMap<String, String>) {
        let alice = Source::new("alice", "https://alice.example/twtxt.txt");
        let bob = Source::new("bob", "https://bob.example/twtxt.txt");

        let mut cache = Cache::new();
        cache.put(
            alice.address.clone(),
            CacheEntry::new(
                vec![
                    Record::new(alice.clone(), at(3, 0), "alice 3"),
                    Record::new(alice.clone(), at(1, 0), "alice 1"),
                ],
                "",
            ),
        );
        cache.put(
            bob.address.clone(),
            CacheEntry::new(
                vec![
                    Record::new(bob.clone(), at(2, 0), "bob 2"),
                    Record::new(bob.clone(), at(2, 0), "bob 2 again"),
                ],
                "",
            ),
        );
        cache.put(
            "https://unfollowed.example/twtxt.txt",
            CacheEntry::new(
                vec![Record::new(
                    Source::new("gone", "https://unfollowed.example/twtxt.txt"),
                    at(1, 12),
                    "stale",
                )],
                "",
            ),
        );

        let sources = BTreeMap::from([
            ("alice".to_string(), alice.address),
            ("bob".to_string(), bob.address),
            ("nobody".to_string(), "https://never-fetched.example/".to_string()),
        ]);

        (cache, sources)
    }

    fn texts(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_oldest_first() {
        let (cache, sources) = fixture();
        let records = assemble(&cache, &sources, TimelineFilter::All, Order::OldestFirst, at(4, 0));
        assert_eq!(texts(&records), vec!["alice 1", "bob 2", "bob 2 again", "alice 3"]);
    }

    #[test]
    fn test_newest_first() {
        let (cache, sources) = fixture();
        let records = assemble(&cache, &sources, TimelineFilter::All, Order::NewestFirst, at(4, 0));
        assert_eq!(texts(&records), vec!["alice 3", "bob 2", "bob 2 again", "alice 1"]);
    }

    #[test]
    fn test_within_window() {
        let (cache, sources) = fixture();
        let filter = TimelineFilter::Within(TimeDelta::days(2));
        let records = assemble(&cache, &sources, filter, Order::OldestFirst, at(4, 0));
        assert_eq!(texts(&records), vec!["bob 2", "bob 2 again", "alice 3"]);
    }

    #[test]
    fn test_since_marker() {
        let (cache, sources) = fixture();
        let filter = TimelineFilter::Since(at(2, 0));
        let records = assemble(&cache, &sources, filter, Order::OldestFirst, at(4, 0));
        assert_eq!(texts(&records), vec!["alice 3"]);
    }

    #[test]
    fn test_shared_address_counted_once() {
        let (cache, mut sources) = fixture();
        sources.insert(
            "alice-again".to_string(),
            "https://alice.example/twtxt.txt".to_string(),
        );
        let records = assemble(&cache, &sources, TimelineFilter::All, Order::OldestFirst, at(4, 0));
        assert_eq!(records.len(), 4);
    }
}
