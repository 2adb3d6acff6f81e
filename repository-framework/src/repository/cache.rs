use crate::filters::FilterMap;
use std::{collections::BTreeSet, time::Duration};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Extension point for query-result caching. The core installs `NoopCache`;
/// a concrete repository may swap in a real backend without touching the
/// query pipeline.
pub trait QueryCache<D>: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<D>>;

    fn set(&mut self, key: &str, value: &[D], ttl: Duration);

    /// Called after every entity write so a backend can drop entries the
    /// write may have invalidated.
    fn invalidate_entity(&mut self, entity_id: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl<D> QueryCache<D> for NoopCache {
    fn get(&self, _key: &str) -> Option<Vec<D>> {
        None
    }

    fn set(&mut self, _key: &str, _value: &[D], _ttl: Duration) {}

    fn invalidate_entity(&mut self, _entity_id: &str) {}
}

/// Deterministic cache key over everything that shapes a query's result.
/// Filter maps are ordered, so equal queries produce equal keys.
pub fn build_cache_key(
    table: &str,
    filters: &FilterMap,
    starting_sql: Option<&str>,
    limit: Option<u64>,
    already_joined: &BTreeSet<String>,
    return_rows: bool,
) -> String {
    let filters = serde_json::to_string(filters).unwrap_or_else(|_| format!("{filters:?}"));
    let joined = already_joined
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{table}|{filters}|{starting}|{limit:?}|{joined}|{return_rows}",
        starting = starting_sql.unwrap_or("-"),
    )
}
