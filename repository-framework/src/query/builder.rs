use crate::{
    error::RepositoryError,
    filters::{mapper::JoinEdge, operators::FilterOperator, FilterValue},
    mapper::DataMapper,
    query::join::JoinManager,
    schema::{ColumnTarget, ModelSchema},
};
use sea_orm::{
    sea_query::{Asterisk, NullOrdering, Order, SelectStatement, SimpleExpr},
    ConnectionTrait, QueryResult,
};
use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};
use tracing::debug;

/// Deadline applied to every statement execution.
pub(crate) const EXECUTE_DEADLINE: Duration = Duration::from_secs(30);

/// Chainable, stateful SELECT builder. `select()` primes the statement
/// (from a caller-provided starting statement or a plain
/// `SELECT <table>.*`); every other operation requires it first. `build`
/// does not reset state, so repeated builds and executions of one builder
/// are idempotent.
pub struct QueryBuilder<'db, C> {
    db: &'db C,
    schema: &'static ModelSchema,
    starting_stmt: Option<SelectStatement>,
    stmt: Option<SelectStatement>,
    joins: JoinManager,
}

impl<'db, C> QueryBuilder<'db, C> {
    pub fn new(db: &'db C, schema: &'static ModelSchema) -> Self {
        Self {
            db,
            schema,
            starting_stmt: None,
            stmt: None,
            joins: JoinManager::new(),
        }
    }

    pub fn starting_stmt(mut self, stmt: SelectStatement) -> Self {
        self.starting_stmt = Some(stmt);
        self
    }

    pub fn already_joined(mut self, tables: BTreeSet<String>) -> Self {
        self.joins = JoinManager::with_existing(tables);
        self
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    pub fn joined_tables(&self) -> &BTreeSet<String> {
        self.joins.tracked()
    }

    fn stmt_mut(&mut self) -> Result<&mut SelectStatement, RepositoryError> {
        self.stmt.as_mut().ok_or_else(|| {
            RepositoryError::InvalidQuery(
                "select() must be called before any other builder operation".into(),
            )
        })
    }

    /// Prime the statement. Errors when called twice on one builder.
    pub fn select(&mut self) -> Result<&mut Self, RepositoryError> {
        if self.stmt.is_some() {
            return Err(RepositoryError::InvalidQuery(
                "select() has already been called on this builder".into(),
            ));
        }
        self.stmt = Some(match self.starting_stmt.clone() {
            Some(stmt) => stmt,
            None => {
                let mut stmt = SelectStatement::new();
                stmt.column((self.schema.iden(), Asterisk))
                    .from(self.schema.iden());
                stmt
            }
        });
        Ok(self)
    }

    /// Append one predicate through a filter operator.
    pub fn apply_where(
        &mut self,
        operator: FilterOperator,
        target: &ColumnTarget,
        value: &FilterValue,
    ) -> Result<&mut Self, RepositoryError> {
        operator.apply(self.stmt_mut()?, target, value)?;
        Ok(self)
    }

    /// Add a join edge; duplicates are skipped by the shared join manager.
    pub fn join(&mut self, edge: &JoinEdge) -> Result<&mut Self, RepositoryError> {
        self.join_chain(std::slice::from_ref(edge))?;
        Ok(self)
    }

    /// Add the missing edges of a chain. Returns true when at least one
    /// edge was added.
    pub fn join_chain(&mut self, chain: &[JoinEdge]) -> Result<bool, RepositoryError> {
        let stmt = self.stmt.as_mut().ok_or_else(|| {
            RepositoryError::InvalidQuery(
                "select() must be called before any other builder operation".into(),
            )
        })?;
        Ok(self.joins.apply_joins(stmt, chain))
    }

    /// Order by a column of the builder's root model. Multiple calls
    /// stack in call order.
    pub fn order_by(
        &mut self,
        column: &str,
        descending: bool,
        nulls_last: bool,
    ) -> Result<&mut Self, RepositoryError> {
        let expr = self.schema.target(column).expr().into();
        self.order_by_expr(expr, descending, nulls_last)
    }

    pub fn order_by_expr(
        &mut self,
        expr: SimpleExpr,
        descending: bool,
        nulls_last: bool,
    ) -> Result<&mut Self, RepositoryError> {
        let order = if descending { Order::Desc } else { Order::Asc };
        let stmt = self.stmt_mut()?;
        if nulls_last {
            stmt.order_by_expr_with_nulls(expr, order, NullOrdering::Last);
        } else {
            stmt.order_by_expr(expr, order);
        }
        Ok(self)
    }

    /// Append a prebuilt predicate (tag filters, caller extensions).
    pub fn and_where(&mut self, expr: SimpleExpr) -> Result<&mut Self, RepositoryError> {
        self.stmt_mut()?.and_where(expr);
        Ok(self)
    }

    /// Direct access to the primed statement, for callers that shape the
    /// query beyond what the builder surface covers.
    pub fn statement_mut(&mut self) -> Result<&mut SelectStatement, RepositoryError> {
        self.stmt_mut()
    }

    pub fn limit(&mut self, n: u64) -> Result<&mut Self, RepositoryError> {
        if n == 0 {
            return Err(RepositoryError::InvalidQuery(
                "limit must be greater than zero".into(),
            ));
        }
        self.stmt_mut()?.limit(n);
        Ok(self)
    }

    pub fn offset(&mut self, n: u64) -> Result<&mut Self, RepositoryError> {
        self.stmt_mut()?.offset(n);
        Ok(self)
    }

    pub fn distinct(&mut self) -> Result<&mut Self, RepositoryError> {
        self.stmt_mut()?.distinct();
        Ok(self)
    }

    /// The compiled SELECT. Does not reset the builder.
    pub fn build(&self) -> Result<SelectStatement, RepositoryError> {
        self.stmt.clone().ok_or_else(|| {
            RepositoryError::InvalidQuery("select() must be called before build()".into(),)
        })
    }
}

impl<'db, C: ConnectionTrait> QueryBuilder<'db, C> {
    /// Execute the built statement with the default deadline and return
    /// the raw rows.
    pub async fn execute(&self) -> Result<Vec<QueryResult>, RepositoryError> {
        let stmt = self.build()?;
        let compiled = self.db.get_database_backend().build(&stmt);
        let sql = compiled.to_string();
        let started = Instant::now();
        match tokio::time::timeout(EXECUTE_DEADLINE, self.db.query_all(compiled)).await {
            Err(_) => Err(RepositoryError::Query {
                message: format!(
                    "statement execution exceeded the {}s deadline",
                    EXECUTE_DEADLINE.as_secs()
                ),
                sql: Some(sql),
                elapsed: Some(started.elapsed()),
                timed_out: true,
                correlation_id: None,
            }),
            Ok(Err(err)) => Err(RepositoryError::Query {
                message: err.to_string(),
                sql: Some(sql),
                elapsed: Some(started.elapsed()),
                timed_out: false,
                correlation_id: None,
            }),
            Ok(Ok(rows)) => {
                debug!(
                    rows = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    table = self.schema.table,
                    "statement executed"
                );
                Ok(rows)
            }
        }
    }

    /// Execute and map every row to a domain entity.
    pub async fn execute_mapped<M: DataMapper>(
        &self,
        mapper: &M,
    ) -> Result<Vec<M::Domain>, RepositoryError> {
        let rows = self.execute().await?;
        map_rows(mapper, &rows)
    }
}

/// Map raw rows to domain entities, attributing failures to the row's id
/// and position.
pub(crate) fn map_rows<M: DataMapper>(
    mapper: &M,
    rows: &[QueryResult],
) -> Result<Vec<M::Domain>, RepositoryError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            mapper.row_to_domain(row).map_err(|err| {
                RepositoryError::EntityMapping {
                    id: row.try_get::<String>("", "id").ok(),
                    index,
                    message: err.to_string(),
                    correlation_id: None,
                }
            })
        })
        .collect()
}
