use crate::{
    error::RepositoryError,
    filters::{FilterValue, TagTriple},
    schema::ModelSchema,
};
use itertools::Itertools;
use sea_orm::sea_query::{
    Alias, Cond, Expr, ExprTrait, IntoIden, JoinType, Query, SelectStatement, SimpleExpr,
};

/// Declares where an aggregate's tags live: the tag table (columns `id`,
/// `key`, `value`, `author_id`, `tag_type`), the association table linking
/// it to the aggregate, and the tag-type discriminator this aggregate
/// filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFilterConfig {
    pub tag_schema: &'static ModelSchema,
    pub association: &'static ModelSchema,
    /// Association column referencing the aggregate root's id.
    pub root_fk: &'static str,
    /// Association column referencing the tag table's id.
    pub tag_fk: &'static str,
    pub tag_type: &'static str,
}

impl TagFilterConfig {
    pub const fn new(
        tag_schema: &'static ModelSchema,
        association: &'static ModelSchema,
        root_fk: &'static str,
        tag_fk: &'static str,
        tag_type: &'static str,
    ) -> Self {
        Self {
            tag_schema,
            association,
            root_fk,
            tag_fk,
            tag_type,
        }
    }
}

/// Builds tag predicates for one aggregate root. Positive filters AND
/// together one EXISTS per tag key (OR within the key via IN lists);
/// negative filters are a single NOT EXISTS over all listed tuples. The
/// EXISTS form keeps tag filtering independent of whatever joins other
/// mappers add to the same statement.
#[derive(Debug, Clone, Copy)]
pub struct TagFilterBuilder<'a> {
    config: &'a TagFilterConfig,
    root: &'static ModelSchema,
}

impl<'a> TagFilterBuilder<'a> {
    pub fn new(config: &'a TagFilterConfig, root: &'static ModelSchema) -> Self {
        Self { config, root }
    }

    /// Validate the wire shape of a tag filter value: a list of
    /// `(key, value, author_id)` string tuples (or the typed equivalent).
    pub fn parse_tags(value: &FilterValue) -> Result<Vec<TagTriple>, RepositoryError> {
        match value {
            FilterValue::Tags(tags) => Ok(tags.clone()),
            FilterValue::List(items) => items
                .iter()
                .map(|item| match item {
                    FilterValue::List(tuple) if tuple.len() == 3 => {
                        let mut strings = tuple.iter().map(FilterValue::as_str);
                        match (strings.next(), strings.next(), strings.next()) {
                            (Some(Some(key)), Some(Some(value)), Some(Some(author))) => {
                                Ok(TagTriple::new(key, value, author))
                            }
                            _ => Err(malformed()),
                        }
                    }
                    _ => Err(malformed()),
                })
                .collect(),
            _ => Err(malformed()),
        }
    }

    /// AND of one EXISTS per tag key; `None` when `tags` is empty.
    pub fn positive(&self, tags: &[TagTriple]) -> Option<SimpleExpr> {
        if tags.is_empty() {
            return None;
        }
        grouped_by_key(tags)
            .into_iter()
            .map(|(key, group)| {
                let values: Vec<String> =
                    group.iter().map(|t| t.value.clone()).unique().collect();
                let authors: Vec<String> =
                    group.iter().map(|t| t.author_id.clone()).unique().collect();
                let mut sub = self.association_subquery();
                sub.and_where(self.tag_col("key").eq(key))
                    .and_where(self.tag_col("value").is_in(values))
                    .and_where(self.tag_col("author_id").is_in(authors));
                Expr::exists(sub)
            })
            .reduce(|acc, group| acc.and(group))
    }

    /// NOT EXISTS over every listed tuple; `None` when `tags` is empty.
    pub fn negative(&self, tags: &[TagTriple]) -> Option<SimpleExpr> {
        if tags.is_empty() {
            return None;
        }
        let mut any = Cond::any();
        for tag in tags {
            any = any.add(
                Cond::all()
                    .add(self.tag_col("key").eq(tag.key.clone()))
                    .add(self.tag_col("value").eq(tag.value.clone()))
                    .add(self.tag_col("author_id").eq(tag.author_id.clone())),
            );
        }
        let mut sub = self.association_subquery();
        sub.cond_where(any);
        Some(Expr::exists(sub).not())
    }

    /// `SELECT 1 FROM association JOIN tags ...` correlated on the root id
    /// and scoped to this aggregate's tag type.
    fn association_subquery(&self) -> SelectStatement {
        let assoc = self.config.association.iden();
        let tags = self.config.tag_schema.iden();
        let mut sub = Query::select();
        sub.expr(Expr::val(1))
            .from(assoc.clone())
            .join(
                JoinType::InnerJoin,
                tags.clone(),
                Expr::col((assoc.clone(), Alias::new(self.config.tag_fk).into_iden()))
                    .equals((tags, Alias::new("id").into_iden())),
            )
            .and_where(
                Expr::col((assoc, Alias::new(self.config.root_fk).into_iden()))
                    .equals((self.root.iden(), Alias::new("id").into_iden())),
            )
            .and_where(self.tag_col("tag_type").eq(self.config.tag_type));
        sub
    }

    fn tag_col(&self, column: &str) -> Expr {
        Expr::col((
            self.config.tag_schema.iden(),
            Alias::new(column).into_iden(),
        ))
    }
}

fn malformed() -> RepositoryError {
    RepositoryError::FilterNotAllowed(
        "tag filters must be a list of (key, value, author_id) string tuples".into(),
    )
}

/// Group tuples by key, preserving first-occurrence order.
fn grouped_by_key(tags: &[TagTriple]) -> Vec<(String, Vec<&TagTriple>)> {
    let mut groups: Vec<(String, Vec<&TagTriple>)> = Vec::new();
    for tag in tags {
        match groups.iter_mut().find(|(key, _)| *key == tag.key) {
            Some((_, group)) => group.push(tag),
            None => groups.push((tag.key.clone(), vec![tag])),
        }
    }
    groups
}
