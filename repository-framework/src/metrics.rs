use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repository_framework_queries",
        "total number of repository queries executed per table and outcome",
        &["table", "outcome"]
    )
    .unwrap();
    pub static ref CACHE_HIT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repository_framework_cache_hit",
        "total number of query cache hits",
        &["table"]
    )
    .unwrap();
    pub static ref CACHE_MISS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repository_framework_cache_miss",
        "total number of query cache misses",
        &["table"]
    )
    .unwrap();
    pub static ref ENTITIES_PERSISTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repository_framework_entities_persisted",
        "total number of entities written per table",
        &["table", "operation"]
    )
    .unwrap();
}
