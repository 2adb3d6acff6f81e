use crate::{
    filters::{mapper::FilterColumnMapper, tags::TagFilterConfig},
    query::sort::SortPrecedence,
    schema::ModelSchema,
};

/// Page size applied when neither the caller nor the filters specify one.
pub const DEFAULT_PAGE_LIMIT: u64 = 500;

/// Per-aggregate wiring of the generic repository, declared once as a
/// `static` next to the aggregate's schema and mapper tables.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryConfig {
    pub schema: &'static ModelSchema,
    pub mappers: &'static [FilterColumnMapper],
    pub tag_filter: Option<TagFilterConfig>,
    pub sort_precedence: Option<SortPrecedence>,
    pub default_limit: Option<u64>,
}

impl RepositoryConfig {
    pub const fn new(
        schema: &'static ModelSchema,
        mappers: &'static [FilterColumnMapper],
    ) -> Self {
        Self {
            schema,
            mappers,
            tag_filter: None,
            sort_precedence: None,
            default_limit: Some(DEFAULT_PAGE_LIMIT),
        }
    }

    pub const fn with_tags(mut self, tag_filter: TagFilterConfig) -> Self {
        self.tag_filter = Some(tag_filter);
        self
    }

    pub const fn with_sort_precedence(mut self, precedence: SortPrecedence) -> Self {
        self.sort_precedence = Some(precedence);
        self
    }

    pub const fn with_default_limit(mut self, limit: Option<u64>) -> Self {
        self.default_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ColumnType};

    static ROOT: ModelSchema =
        ModelSchema::new("things", &[ColumnSchema::new("id", ColumnType::Text)]);
    static MAPPERS: &[FilterColumnMapper] = &[FilterColumnMapper::new(&ROOT, &[("id", "id")])];

    static CONFIG: RepositoryConfig = RepositoryConfig::new(&ROOT, MAPPERS)
        .with_sort_precedence(SortPrecedence::new("source", &["manual", "auto"]))
        .with_default_limit(None);

    #[test]
    fn const_builders_compose() {
        assert!(CONFIG.sort_precedence.is_some());
        assert!(CONFIG.default_limit.is_none());
        assert!(CONFIG.tag_filter.is_none());
        assert_eq!(
            RepositoryConfig::new(&ROOT, MAPPERS).default_limit,
            Some(DEFAULT_PAGE_LIMIT)
        );
    }
}
