pub mod cache;
pub mod config;
pub mod writes;

use crate::{
    error::RepositoryError,
    filters::{
        operators::{FilterOperator, FILTER_OPERATORS},
        tags::TagFilterBuilder,
        validator::{FilterValidator, RESERVED_FILTERS},
        FilterMap, FilterValue,
    },
    mapper::{DataMapper, DomainEntity},
    metrics,
    query::{
        builder::{map_rows, QueryBuilder},
        sort,
    },
};
use cache::{build_cache_key, NoopCache, QueryCache, DEFAULT_CACHE_TTL};
use config::RepositoryConfig;
use sea_orm::{
    sea_query::{PostgresQueryBuilder, SelectStatement},
    ConnectionTrait, QueryResult,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const MAX_FILTER_COUNT_WARNING: usize = 10;
const MAX_JOIN_COUNT_WARNING: usize = 3;

/// Controls that never resolve to a filtered column.
const NON_COLUMN_CONTROLS: &[&str] = &["skip", "limit", "sort", "tags", "tags_not_exists"];
/// Reserved keys applied against the root model even when no mapper
/// declares them.
const ROOT_FALLBACK_CONTROLS: &[&str] = &["id", "discarded", "created_at", "updated_at"];

/// Inputs of one `query` call beyond the filter map itself.
#[derive(Default)]
pub struct QueryParams {
    pub filters: FilterMap,
    /// Pre-shaped SELECT to start from instead of `SELECT <root>.*`.
    pub starting_stmt: Option<SelectStatement>,
    /// Explicit page size; beats a `limit` filter and the configured
    /// default.
    pub limit: Option<u64>,
    /// Tables the starting statement already joined.
    pub already_joined: BTreeSet<String>,
    /// Custom sort hook; when set it replaces the built-in sort
    /// resolution and receives the raw `sort` filter value.
    pub sort_stmt: Option<fn(&mut SelectStatement, Option<&FilterValue>)>,
}

impl QueryParams {
    pub fn with_filters(filters: FilterMap) -> Self {
        Self {
            filters,
            ..Default::default()
        }
    }
}

/// Generic repository over one aggregate: orchestrates validation, join
/// management, operator dispatch, sorting, pagination and entity mapping
/// for reads; insertion and primary-key merges for writes.
///
/// One instance belongs to one unit of work. The `seen` map tracks every
/// entity read or written through it, keyed by id, so `persist` can insist
/// on known entities and the unit of work can drain domain events on
/// commit. The session (and its transaction boundary) stays owned by the
/// caller; the repository only borrows the connection.
pub struct GenericRepository<'db, C, M: DataMapper> {
    db: &'db C,
    mapper: M,
    config: &'static RepositoryConfig,
    validator: FilterValidator,
    cache: Box<dyn QueryCache<M::Domain>>,
    seen: HashMap<String, M::Domain>,
    correlation_id: Uuid,
}

impl<'db, C, M: DataMapper> GenericRepository<'db, C, M> {
    pub fn new(db: &'db C, mapper: M, config: &'static RepositoryConfig) -> Self {
        let validator =
            FilterValidator::from_mappers(config.mappers, RESERVED_FILTERS, config.schema);
        Self {
            db,
            mapper,
            config,
            validator,
            cache: Box::new(NoopCache),
            seen: HashMap::new(),
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Install a caching backend in place of the default no-op.
    pub fn with_cache(mut self, cache: impl QueryCache<M::Domain> + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn config(&self) -> &'static RepositoryConfig {
        self.config
    }

    /// Track the latest in-memory version of an entity: any prior copy
    /// with the same id is replaced.
    pub fn refresh_seen(&mut self, entity: M::Domain) {
        self.seen.insert(entity.id().to_owned(), entity);
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    pub fn seen(&self) -> impl Iterator<Item = &M::Domain> {
        self.seen.values()
    }

    /// Mutable view over the seen set, used by the owning unit of work to
    /// drain domain events on commit.
    pub fn seen_mut(&mut self) -> impl Iterator<Item = &mut M::Domain> {
        self.seen.values_mut()
    }

    fn correlate(&self, err: RepositoryError) -> RepositoryError {
        err.with_correlation(self.correlation_id)
    }
}

impl<'db, C: ConnectionTrait, M: DataMapper> GenericRepository<'db, C, M> {
    /// Map a new entity to its row images and insert them. Mapping runs to
    /// completion before the first INSERT, so partially mapped children
    /// are never written against a half-built parent. Constraint
    /// violations propagate as `Db` errors and roll the unit of work back.
    #[instrument(skip_all, fields(table = self.config.schema.table, correlation_id = %self.correlation_id, entity_id = %entity.id()))]
    pub async fn add(&mut self, entity: M::Domain) -> Result<(), RepositoryError> {
        let rows = self
            .mapper
            .domain_to_rows(self.db, &entity)
            .await
            .map_err(|e| self.correlate(e))?;
        for row in &rows {
            let stmt = writes::insert_statement(row)?;
            self.db
                .execute(self.db.get_database_backend().build(&stmt))
                .await?;
        }
        metrics::ENTITIES_PERSISTED_TOTAL
            .with_label_values(&[self.config.schema.table, "add"])
            .inc();
        self.cache.invalidate_entity(entity.id());
        self.refresh_seen(entity);
        Ok(())
    }

    /// Fetch one entity by id, excluding soft-deleted rows unless asked
    /// otherwise. Zero rows raise `EntityNotFound`, more than one raise
    /// `MultipleEntitiesFound`.
    pub async fn get(&mut self, id: &str) -> Result<M::Domain, RepositoryError> {
        self.get_with(id, false).await
    }

    #[instrument(skip_all, fields(table = self.config.schema.table, correlation_id = %self.correlation_id, entity_id = %id))]
    pub async fn get_with(
        &mut self,
        id: &str,
        include_discarded: bool,
    ) -> Result<M::Domain, RepositoryError> {
        let row = self.get_row(id, include_discarded).await?;
        let entity = self.mapper.row_to_domain(&row).map_err(|err| {
            RepositoryError::EntityMapping {
                id: Some(id.to_owned()),
                index: 0,
                message: err.to_string(),
                correlation_id: Some(self.correlation_id),
            }
        })?;
        self.refresh_seen(entity.clone());
        Ok(entity)
    }

    /// Raw-row variant of `get`; does not touch the seen set.
    pub async fn get_row(
        &self,
        id: &str,
        include_discarded: bool,
    ) -> Result<QueryResult, RepositoryError> {
        let schema = self.config.schema;
        let mut builder = QueryBuilder::new(self.db, schema);
        builder.select()?;
        builder.apply_where(
            FILTER_OPERATORS.operator_for("id", schema.column_type("id"), &id.into()),
            &schema.target("id"),
            &id.into(),
        )?;
        if schema.has_soft_delete() && !include_discarded {
            builder.apply_where(
                FILTER_OPERATORS.operator_for(
                    "discarded",
                    schema.column_type("discarded"),
                    &false.into(),
                ),
                &schema.target("discarded"),
                &false.into(),
            )?;
        }
        let mut rows = builder.execute().await.map_err(|e| self.correlate(e))?;
        match rows.len() {
            0 => Err(RepositoryError::EntityNotFound {
                id: id.to_owned(),
                correlation_id: Some(self.correlation_id),
            }),
            1 => Ok(rows.remove(0)),
            _ => Err(RepositoryError::MultipleEntitiesFound {
                id: id.to_owned(),
                correlation_id: Some(self.correlation_id),
            }),
        }
    }

    /// Run a filtered query and return mapped domain entities. Every
    /// mapped entity refreshes the seen set.
    #[instrument(skip_all, fields(table = self.config.schema.table, correlation_id = %self.correlation_id, filter_count = params.filters.len()))]
    pub async fn query(&mut self, params: QueryParams) -> Result<Vec<M::Domain>, RepositoryError> {
        let cache_key = self.cache_key(&params, false);
        if let Some(hit) = self.cache.get(&cache_key) {
            metrics::CACHE_HIT_TOTAL
                .with_label_values(&[self.config.schema.table])
                .inc();
            debug!(%cache_key, "query served from cache");
            return Ok(hit);
        }
        metrics::CACHE_MISS_TOTAL
            .with_label_values(&[self.config.schema.table])
            .inc();

        let rows = self.run(&params).await?;
        let entities = map_rows(&self.mapper, &rows).map_err(|e| self.correlate(e))?;
        for entity in &entities {
            self.refresh_seen(entity.clone());
        }
        self.cache.set(&cache_key, &entities, DEFAULT_CACHE_TTL);
        Ok(entities)
    }

    /// Raw-row variant of `query`; bypasses the entity cache and the seen
    /// set.
    pub async fn query_rows(
        &self,
        params: QueryParams,
    ) -> Result<Vec<QueryResult>, RepositoryError> {
        self.run(&params).await
    }

    /// Merge a known entity's row images by primary key. The entity must
    /// have been read or added through this repository first.
    #[instrument(skip_all, fields(table = self.config.schema.table, correlation_id = %self.correlation_id, entity_id = %entity.id()))]
    pub async fn persist(&mut self, entity: &M::Domain) -> Result<(), RepositoryError> {
        if !self.seen.contains_key(entity.id()) {
            return Err(RepositoryError::EntityNotTracked {
                id: entity.id().to_owned(),
            });
        }
        let rows = self
            .mapper
            .domain_to_rows(self.db, entity)
            .await
            .map_err(|e| self.correlate(e))?;
        self.write_merged(&rows).await?;
        metrics::ENTITIES_PERSISTED_TOTAL
            .with_label_values(&[self.config.schema.table, "persist"])
            .inc();
        self.cache.invalidate_entity(entity.id());
        self.refresh_seen(entity.clone());
        Ok(())
    }

    /// Persist the given entities, or every entity in the seen set when
    /// none are given. Mapping is fanned out; the session writes stay
    /// serialized on the owning task.
    #[instrument(skip_all, fields(table = self.config.schema.table, correlation_id = %self.correlation_id))]
    pub async fn persist_all(
        &mut self,
        entities: Option<Vec<M::Domain>>,
    ) -> Result<(), RepositoryError> {
        let targets: Vec<M::Domain> = match entities {
            Some(list) => {
                for entity in &list {
                    if !self.seen.contains_key(entity.id()) {
                        return Err(RepositoryError::EntityNotTracked {
                            id: entity.id().to_owned(),
                        });
                    }
                }
                list
            }
            None => self.seen.values().cloned().collect(),
        };

        let mapped = futures::future::try_join_all(
            targets
                .iter()
                .map(|entity| self.mapper.domain_to_rows(self.db, entity)),
        )
        .await
        .map_err(|e| self.correlate(e))?;

        for rows in &mapped {
            self.write_merged(rows).await?;
        }
        metrics::ENTITIES_PERSISTED_TOTAL
            .with_label_values(&[self.config.schema.table, "persist_all"])
            .inc_by(targets.len() as u64);
        for entity in targets {
            self.cache.invalidate_entity(entity.id());
            self.refresh_seen(entity);
        }
        Ok(())
    }

    async fn write_merged(&self, rows: &[writes::RowImage]) -> Result<(), RepositoryError> {
        for row in rows {
            let stmt = writes::upsert_statement(row)?;
            self.db
                .execute(self.db.get_database_backend().build(&stmt))
                .await?;
        }
        Ok(())
    }

    fn cache_key(&self, params: &QueryParams, return_rows: bool) -> String {
        let starting_sql = params
            .starting_stmt
            .as_ref()
            .map(|stmt| stmt.to_string(PostgresQueryBuilder));
        build_cache_key(
            self.config.schema.table,
            &params.filters,
            starting_sql.as_deref(),
            params.limit,
            &params.already_joined,
            return_rows,
        )
    }

    /// The read pipeline: validate, prime the base statement with
    /// pagination, walk the mappers (joins then operators), apply tag
    /// filters and reserved root-column filters, sort, and execute.
    async fn run(&self, params: &QueryParams) -> Result<Vec<QueryResult>, RepositoryError> {
        let schema = self.config.schema;
        let validated = self
            .validator
            .validate(&params.filters)
            .map_err(|e| self.correlate(e))?;

        if validated.len() > MAX_FILTER_COUNT_WARNING {
            warn!(
                filter_count = validated.len(),
                table = schema.table,
                "large filter set may impact query performance"
            );
        }

        let mut builder = QueryBuilder::new(self.db, schema)
            .already_joined(params.already_joined.clone());
        if let Some(starting) = params.starting_stmt.clone() {
            builder = builder.starting_stmt(starting);
        }
        builder.select()?;

        let skip = validated.get("skip").and_then(FilterValue::as_u64).unwrap_or(0);
        if skip > 0 {
            builder.offset(skip)?;
        }
        let limit = params
            .limit
            .or_else(|| validated.get("limit").and_then(FilterValue::as_u64))
            .or(self.config.default_limit);
        match limit {
            // A zero page size means "no limit", mirroring the absent case.
            Some(0) | None => {}
            Some(n) => {
                builder.limit(n)?;
            }
        }

        let mut distinct = false;
        let mut applied: BTreeSet<&str> = BTreeSet::new();

        for mapper in self.config.mappers {
            let applicable: BTreeMap<&str, &FilterValue> = validated
                .iter()
                .filter(|(key, _)| {
                    let base = FILTER_OPERATORS.strip_postfix(key);
                    !NON_COLUMN_CONTROLS.contains(&base) && mapper.owns_key(base)
                })
                .map(|(key, value)| (key.as_str(), value))
                .collect();
            if applicable.is_empty() {
                continue;
            }

            if !mapper.join_chain.is_empty() {
                builder
                    .join_chain(mapper.join_chain)
                    .map_err(|_| RepositoryError::Join {
                        chain: mapper.chain_path(),
                        correlation_id: Some(self.correlation_id),
                    })?;
            }

            for (key, value) in applicable {
                let base = FILTER_OPERATORS.strip_postfix(key);
                let Some(column) = mapper.column_for_key(base) else {
                    continue;
                };
                let target = mapper.schema.target(column);
                let operator = FILTER_OPERATORS.operator_for(key, target.ty, value);
                debug!(
                    filter_key = key,
                    column = column,
                    operator = operator.name(),
                    "applying filter"
                );
                builder
                    .apply_where(operator, &target, value)
                    .map_err(|e| self.correlate(e))?;
                if matches!(operator, FilterOperator::In) {
                    distinct = true;
                }
                applied.insert(key);
            }
        }

        self.apply_tag_filters(&mut builder, &validated)?;

        // Reserved controls fall through to root columns of the same name
        // when no mapper claims them; soft-delete injection relies on it.
        for (key, value) in &validated {
            let base = FILTER_OPERATORS.strip_postfix(key);
            if applied.contains(key.as_str())
                || NON_COLUMN_CONTROLS.contains(&base)
                || !ROOT_FALLBACK_CONTROLS.contains(&base)
                || !schema.has_column(base)
            {
                continue;
            }
            let target = schema.target(base);
            let operator = FILTER_OPERATORS.operator_for(key, target.ty, value);
            builder
                .apply_where(operator, &target, value)
                .map_err(|e| self.correlate(e))?;
            if matches!(operator, FilterOperator::In) {
                distinct = true;
            }
        }

        if let Some(sort_stmt) = params.sort_stmt {
            sort_stmt(builder.statement_mut()?, validated.get("sort"));
        } else if let Some(FilterValue::Str(sort_value)) = validated.get("sort") {
            sort::apply_sort(&mut builder, self.config, sort_value)
                .map_err(|e| self.correlate(e))?;
        }

        if distinct {
            builder.distinct()?;
        }

        if builder.joined_tables().len() > MAX_JOIN_COUNT_WARNING {
            warn!(
                join_count = builder.joined_tables().len(),
                table = schema.table,
                "query joins many tables"
            );
        }

        let outcome = builder.execute().await;
        metrics::QUERIES_TOTAL
            .with_label_values(&[
                schema.table,
                match &outcome {
                    Ok(_) => "ok",
                    Err(RepositoryError::Query { timed_out: true, .. }) => "timeout",
                    Err(_) => "error",
                },
            ])
            .inc();
        outcome.map_err(|e| self.correlate(e))
    }

    fn apply_tag_filters(
        &self,
        builder: &mut QueryBuilder<'_, C>,
        validated: &FilterMap,
    ) -> Result<(), RepositoryError> {
        let positive = validated.get("tags");
        let negative = validated.get("tags_not_exists");
        if positive.is_none() && negative.is_none() {
            return Ok(());
        }
        let Some(tag_config) = self.config.tag_filter.as_ref() else {
            return Err(RepositoryError::FilterNotAllowed(
                "this aggregate does not declare a tag relationship".into(),
            ));
        };
        let tag_builder = TagFilterBuilder::new(tag_config, self.config.schema);
        if let Some(value) = positive {
            let tags = TagFilterBuilder::parse_tags(value)?;
            if let Some(expr) = tag_builder.positive(&tags) {
                builder.and_where(expr)?;
            }
        }
        if let Some(value) = negative {
            let tags = TagFilterBuilder::parse_tags(value)?;
            if let Some(expr) = tag_builder.negative(&tags) {
                builder.and_where(expr)?;
            }
        }
        Ok(())
    }
}
