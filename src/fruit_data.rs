//! # Fruit Data Fetching, Caching and Rotation
//!
//! This module handles all network operations for fetching the fruit collection
//! from the upstream API, keeps the whole collection in memory for a configurable
//! TTL and hands out one fruit per request in a shuffled rotation.
//!
//! ## Data Source
//!
//! ### Fruityvice
//! - **URL**: https://www.fruityvice.com/api/fruit/all (configurable)
//! - **Format**: JSON array of fruit records
//! - **Data**: name, id, family, order, genus and a `nutritions` object
//!
//! ## Caching Strategy
//!
//! - **Location**: in memory only, nothing survives a restart
//! - **TTL**: `cache.ttl_seconds` (1 hour by default)
//! - **Refresh**: lazy, on the first request after expiry; no background task
//! - **Validation**: `now - fetched_at < ttl`, so an entry is stale at exactly
//!   the TTL
//!
//! ## Rotation
//!
//! A freshly fetched collection is shuffled once and the cursor starts at 0.
//! Every snapshot advances the cursor modulo the collection length, so a full
//! cycle visits each fruit exactly once. A refresh mid-cycle starts a new
//! shuffled cycle.
//!
//! ## Error Handling
//!
//! A failed or empty fetch leaves the previous cache entry untouched and is
//! reported as [`ProviderError::FetchFailed`]. A failed refresh does not extend
//! the life of a stale entry; the next request tries again.

use crate::{Item, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that can occur while fetching the upstream collection.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed (network, timeout, protocol or decode error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(u16),

    /// Upstream answered with an empty collection
    #[error("upstream returned no items")]
    Empty,
}

/// Errors surfaced by [`DataProvider::get_snapshot`].
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to fetch data: {0}")]
    FetchFailed(#[from] FetchError),
}

/// The upstream collaborator that returns the full item collection.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<Item>, FetchError>;
}

/// Fetches a JSON array of items over HTTP.
pub struct HttpItemSource {
    client: reqwest::Client,
    url: String,
}

impl HttpItemSource {
    /// Build a source for `url`; every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trmnl-fruit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ItemSource for HttpItemSource {
    async fn fetch_items(&self) -> Result<Vec<Item>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json::<Vec<Item>>().await?)
    }
}

/// Decides the rotation order of a freshly fetched collection.
pub trait Shuffle: Send {
    fn shuffle(&mut self, items: &mut [Item]);
}

/// Uniform random permutation from any RNG.
pub struct RandomShuffle<R>(pub R);

impl RandomShuffle<StdRng> {
    pub fn from_entropy() -> Self {
        RandomShuffle(StdRng::from_entropy())
    }

    /// Reproducible order for a given seed.
    pub fn seeded(seed: u64) -> Self {
        RandomShuffle(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> Shuffle for RandomShuffle<R> {
    fn shuffle(&mut self, items: &mut [Item]) {
        items.shuffle(&mut self.0);
    }
}

/// True while an entry fetched at `fetched_at` is younger than `ttl`.
pub fn is_cache_valid(now: DateTime<Utc>, fetched_at: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now - fetched_at < ttl
}

/// A fetched collection with its rotation cursor.
#[derive(Debug)]
pub struct CacheEntry {
    items: Vec<Item>,
    cursor: usize,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        !self.items.is_empty() && is_cache_valid(now, self.fetched_at, ttl)
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take the item at the cursor and advance it.
    fn next_snapshot(&mut self, now: DateTime<Utc>) -> Snapshot {
        let index = self.cursor;
        let total = self.items.len();
        let snapshot = Snapshot {
            item: self.items[index].clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            index,
            total,
        };
        self.cursor = (index + 1) % total;
        snapshot
    }
}

struct ProviderState {
    entry: Option<CacheEntry>,
    shuffler: Box<dyn Shuffle>,
}

/// Time-boxed cache over an [`ItemSource`] with rotating access.
///
/// Constructed once at startup and shared by handle. All state lives behind
/// one async mutex, held for the whole check-fetch-read-advance sequence.
pub struct DataProvider {
    source: Box<dyn ItemSource>,
    ttl: TimeDelta,
    state: Mutex<ProviderState>,
}

impl DataProvider {
    /// Provider with a randomly seeded rotation order.
    pub fn new(source: Box<dyn ItemSource>, ttl: Duration) -> Self {
        Self::with_shuffle(source, ttl, Box::new(RandomShuffle::from_entropy()))
    }

    pub fn with_shuffle(
        source: Box<dyn ItemSource>,
        ttl: Duration,
        shuffler: Box<dyn Shuffle>,
    ) -> Self {
        Self {
            source,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            state: Mutex::new(ProviderState {
                entry: None,
                shuffler,
            }),
        }
    }

    /// Current snapshot, refreshing the cache first if needed.
    pub async fn get_snapshot(&self) -> Result<Snapshot, ProviderError> {
        self.get_snapshot_at(Utc::now()).await
    }

    /// Same as [`get_snapshot`](Self::get_snapshot) with an explicit clock.
    pub async fn get_snapshot_at(&self, now: DateTime<Utc>) -> Result<Snapshot, ProviderError> {
        let mut state = self.state.lock().await;

        let valid = state
            .entry
            .as_ref()
            .is_some_and(|entry| entry.is_valid(now, self.ttl));

        if !valid {
            let mut items = self.source.fetch_items().await.map_err(|e| {
                warn!(error = %e, "item fetch failed");
                e
            })?;
            if items.is_empty() {
                warn!("item fetch returned no items");
                return Err(FetchError::Empty.into());
            }

            state.shuffler.shuffle(&mut items);
            info!(count = items.len(), "refreshed item cache");
            state.entry = Some(CacheEntry {
                items,
                cursor: 0,
                fetched_at: now,
            });
        }

        let entry = match state.entry.as_mut() {
            Some(entry) => entry,
            None => return Err(FetchError::Empty.into()),
        };
        let snapshot = entry.next_snapshot(now);
        debug!(
            id = snapshot.item.id,
            index = snapshot.index,
            total = snapshot.total,
            "serving snapshot"
        );
        Ok(snapshot)
    }

    /// Fetch time of the cached collection, if any.
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .await
            .entry
            .as_ref()
            .map(CacheEntry::fetched_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(id: u64) -> Item {
        Item {
            id,
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_cache_validity_boundary() {
        let t0 = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ttl = TimeDelta::seconds(600);

        assert!(is_cache_valid(t0, t0, ttl));
        assert!(is_cache_valid(t0 + TimeDelta::seconds(599), t0, ttl));
        assert!(!is_cache_valid(t0 + TimeDelta::seconds(600), t0, ttl));
        assert!(!is_cache_valid(t0 + TimeDelta::seconds(601), t0, ttl));
        assert!(!is_cache_valid(t0, t0, TimeDelta::zero()));
    }

    #[test]
    fn test_empty_entry_is_invalid() {
        let now = Utc::now();
        let entry = CacheEntry {
            items: vec![],
            cursor: 0,
            fetched_at: now,
        };
        assert!(!entry.is_valid(now, TimeDelta::seconds(60)));
    }

    #[test]
    fn test_cursor_wraps() {
        let now = Utc::now();
        let mut entry = CacheEntry {
            items: vec![item(1), item(2)],
            cursor: 0,
            fetched_at: now,
        };
        let ids: Vec<u64> = (0..5).map(|_| entry.next_snapshot(now).item.id).collect();
        assert_eq!(ids, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let original: Vec<Item> = (0..20).map(item).collect();

        let mut a = original.clone();
        let mut b = original.clone();
        RandomShuffle::seeded(7).shuffle(&mut a);
        RandomShuffle::seeded(7).shuffle(&mut b);
        assert_eq!(a, b);

        a.sort_by_key(|i| i.id);
        assert_eq!(a, original);
    }

    #[test]
    fn test_item_deserializes_fruityvice_record() {
        let json = r#"[{
            "name": "Persimmon", "id": 52, "family": "Ebenaceae",
            "order": "Rosales", "genus": "Diospyros",
            "nutritions": {"calories": 81, "fat": 0.0, "sugar": 18.0,
                           "carbohydrates": 18.0, "protein": 0.0}
        }]"#;
        let items: Vec<Item> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 52);
        assert_eq!(items[0].field_str("genus"), Some("Diospyros"));
        assert!(!items[0].fields.contains_key("id"));
        assert_eq!(
            items[0].nested("nutritions").unwrap()["calories"],
            serde_json::json!(81)
        );
    }
}
