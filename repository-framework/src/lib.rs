//! Generic data-access layer between a domain model and a relational
//! database. Each aggregate declares once how its public filter keys map to
//! physical columns (possibly across joined tables); the repository then
//! serves arbitrary filter/sort/paginate queries against that declaration,
//! deduplicates joins, validates inputs, handles soft deletes and surfaces
//! structured errors.

pub mod error;
pub mod filters;
pub mod mapper;
pub mod metrics;
pub mod query;
pub mod repository;
pub mod schema;

pub use error::RepositoryError;
pub use filters::{
    mapper::{FilterColumnMapper, JoinEdge, OnClause},
    operators::{FilterOperator, FilterOperatorRegistry, FILTER_OPERATORS},
    tags::{TagFilterBuilder, TagFilterConfig},
    validator::FilterValidator,
    FilterMap, FilterValue, TagTriple,
};
pub use mapper::{DataMapper, DomainEntity};
pub use query::{builder::QueryBuilder, join::JoinManager, sort::SortPrecedence};
pub use repository::{
    cache::{NoopCache, QueryCache},
    config::RepositoryConfig,
    writes::RowImage,
    GenericRepository, QueryParams,
};
pub use schema::{ColumnSchema, ColumnTarget, ColumnType, ModelSchema};
