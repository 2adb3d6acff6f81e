use crate::schema::ModelSchema;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, IntoIden, SimpleExpr};

/// Column-equality join condition between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnClause {
    pub left_table: &'static str,
    pub left_column: &'static str,
    pub right_table: &'static str,
    pub right_column: &'static str,
}

impl OnClause {
    pub const fn new(
        left_table: &'static str,
        left_column: &'static str,
        right_table: &'static str,
        right_column: &'static str,
    ) -> Self {
        Self {
            left_table,
            left_column,
            right_table,
            right_column,
        }
    }

    pub fn expr(&self) -> SimpleExpr {
        Expr::col((
            Alias::new(self.left_table).into_iden(),
            Alias::new(self.left_column).into_iden(),
        ))
        .equals((
            Alias::new(self.right_table).into_iden(),
            Alias::new(self.right_column).into_iden(),
        ))
    }
}

/// One edge of a join chain. Inner by default; `outer` switches to a LEFT
/// JOIN and is honoured verbatim by the join manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEdge {
    pub target: &'static ModelSchema,
    pub on: OnClause,
    pub outer: bool,
}

impl JoinEdge {
    pub const fn inner(target: &'static ModelSchema, on: OnClause) -> Self {
        Self {
            target,
            on,
            outer: false,
        }
    }

    pub const fn outer(target: &'static ModelSchema, on: OnClause) -> Self {
        Self {
            target,
            on,
            outer: true,
        }
    }
}

/// Declares, for one target table of an aggregate, which public filter
/// keys map to which columns and which joins are needed to reach them.
/// The join chain is a path from the aggregate root; it is empty when the
/// target is the root itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumnMapper {
    pub schema: &'static ModelSchema,
    pub filter_keys: &'static [(&'static str, &'static str)],
    pub join_chain: &'static [JoinEdge],
}

impl FilterColumnMapper {
    pub const fn new(
        schema: &'static ModelSchema,
        filter_keys: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            schema,
            filter_keys,
            join_chain: &[],
        }
    }

    pub const fn with_joins(
        schema: &'static ModelSchema,
        filter_keys: &'static [(&'static str, &'static str)],
        join_chain: &'static [JoinEdge],
    ) -> Self {
        Self {
            schema,
            filter_keys,
            join_chain,
        }
    }

    pub fn owns_key(&self, base_key: &str) -> bool {
        self.filter_keys.iter().any(|(k, _)| *k == base_key)
    }

    pub fn column_for_key(&self, base_key: &str) -> Option<&'static str> {
        self.filter_keys
            .iter()
            .find(|(k, _)| *k == base_key)
            .map(|(_, column)| *column)
    }

    /// Human-readable join path, used in join error context.
    pub fn chain_path(&self) -> String {
        use itertools::Itertools;
        self.join_chain
            .iter()
            .map(|edge| edge.target.table)
            .join(" -> ")
    }
}

/// First mapper (in declaration order) owning `base_key`, if any.
pub fn mapper_for_key<'a>(
    mappers: &'a [FilterColumnMapper],
    base_key: &str,
) -> Option<&'a FilterColumnMapper> {
    mappers.iter().find(|m| m.owns_key(base_key))
}
