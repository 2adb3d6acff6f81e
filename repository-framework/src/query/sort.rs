use crate::{
    error::RepositoryError,
    filters::mapper::{mapper_for_key, FilterColumnMapper},
    query::builder::QueryBuilder,
    schema::{ColumnTarget, ModelSchema},
    repository::config::RepositoryConfig,
};
use sea_orm::sea_query::{Expr, ExprTrait, SimpleExpr};
use tracing::debug;

/// Fixed ordering for an enum-like column: sort keys matching
/// `filter_key` order by position in `order` instead of lexically.
/// Descending sorts reverse the list; unknown values and NULLs sort last
/// in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPrecedence {
    pub filter_key: &'static str,
    pub order: &'static [&'static str],
}

impl SortPrecedence {
    pub const fn new(filter_key: &'static str, order: &'static [&'static str]) -> Self {
        Self { filter_key, order }
    }
}

pub(crate) struct ResolvedSort<'a> {
    pub mapper: Option<&'a FilterColumnMapper>,
    pub target: ColumnTarget,
    pub base_key: &'a str,
    pub descending: bool,
}

/// Resolve a sort value (`key` or `-key`) to a column. The first declared
/// mapper owning the key wins; keys owned by no mapper fall back to a root
/// column of the same name; anything else resolves to `None` and is
/// ignored by the caller.
pub(crate) fn resolve_sort_target<'a>(
    mappers: &'a [FilterColumnMapper],
    root: &'static ModelSchema,
    sort_value: &'a str,
) -> Option<ResolvedSort<'a>> {
    let (descending, base_key) = match sort_value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, sort_value),
    };
    if base_key.is_empty() {
        return None;
    }
    if let Some(mapper) = mapper_for_key(mappers, base_key) {
        let column = mapper.column_for_key(base_key)?;
        if mapper.schema.has_column(column) {
            return Some(ResolvedSort {
                mapper: Some(mapper),
                target: mapper.schema.target(column),
                base_key,
                descending,
            });
        }
    }
    if root.has_column(base_key) {
        return Some(ResolvedSort {
            mapper: None,
            target: root.target(base_key),
            base_key,
            descending,
        });
    }
    None
}

/// `CASE` expression ranking a column by a fixed precedence list.
pub(crate) fn precedence_case(
    target: &ColumnTarget,
    order: &[&str],
    descending: bool,
) -> SimpleExpr {
    let sequence: Vec<&str> = if descending {
        order.iter().rev().copied().collect()
    } else {
        order.to_vec()
    };
    let mut case = Expr::case(target.expr().eq(sequence[0]), Expr::val(0i32));
    for (position, value) in sequence.iter().enumerate().skip(1) {
        case = case.case(target.expr().eq(*value), Expr::val(position as i32));
    }
    case.finally(Expr::val(sequence.len() as i32)).into()
}

/// Resolve and apply the `sort` control of a query: provision any joins
/// the sort column needs, then order with NULLS LAST. Unknown sort keys
/// are ignored, not an error.
pub(crate) fn apply_sort<C>(
    builder: &mut QueryBuilder<'_, C>,
    config: &RepositoryConfig,
    sort_value: &str,
) -> Result<(), RepositoryError> {
    let Some(resolved) = resolve_sort_target(config.mappers, config.schema, sort_value) else {
        debug!(sort = sort_value, "unknown sort key ignored");
        return Ok(());
    };

    if let Some(mapper) = resolved.mapper {
        if !mapper.join_chain.is_empty() {
            builder
                .join_chain(mapper.join_chain)
                .map_err(|_| RepositoryError::Join {
                    chain: mapper.chain_path(),
                    correlation_id: None,
                })?;
        }
    }

    match config.sort_precedence {
        Some(precedence) if precedence.filter_key == resolved.base_key => {
            let expr = precedence_case(&resolved.target, precedence.order, resolved.descending);
            builder.order_by_expr(expr, false, true)?;
        }
        _ => {
            builder
                .order_by_expr(resolved.target.expr().into(), resolved.descending, true)?;
        }
    }
    Ok(())
}
