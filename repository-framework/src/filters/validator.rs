use crate::{
    error::RepositoryError,
    filters::{mapper::FilterColumnMapper, operators::FILTER_OPERATORS, FilterMap, FilterValue},
    schema::ModelSchema,
};
use itertools::Itertools;
use std::collections::BTreeSet;

/// Control keys accepted on every repository in addition to the
/// mapper-declared filter keys.
pub const RESERVED_FILTERS: &[&str] = &[
    "id",
    "skip",
    "limit",
    "sort",
    "created_at",
    "updated_at",
    "discarded",
    "tags",
    "tags_not_exists",
];

/// Whitelist guard for filter maps. Strips postfixes, checks keys against
/// the mapper-derived allow-list plus the reserved controls, and injects
/// the soft-delete default. Values are never inspected.
#[derive(Debug, Clone)]
pub struct FilterValidator {
    allowed_keys: BTreeSet<&'static str>,
    special_allowed: BTreeSet<&'static str>,
    root_schema: &'static ModelSchema,
}

impl FilterValidator {
    pub fn new(
        allowed_keys: impl IntoIterator<Item = &'static str>,
        special_allowed: &[&'static str],
        root_schema: &'static ModelSchema,
    ) -> Self {
        Self {
            allowed_keys: allowed_keys.into_iter().collect(),
            special_allowed: special_allowed.iter().copied().collect(),
            root_schema,
        }
    }

    /// Build the allow-list from the mapper declarations of a repository.
    pub fn from_mappers(
        mappers: &'static [FilterColumnMapper],
        special_allowed: &[&'static str],
        root_schema: &'static ModelSchema,
    ) -> Self {
        Self::new(
            mappers
                .iter()
                .flat_map(|m| m.filter_keys.iter().map(|(key, _)| *key)),
            special_allowed,
            root_schema,
        )
    }

    /// Validate `filters` and return the processed copy.
    ///
    /// When the root model soft-deletes and the caller did not reference
    /// `discarded` (under any postfix), `discarded = false` is injected;
    /// callers that pass any `discarded*` key keep control.
    pub fn validate(&self, filters: &FilterMap) -> Result<FilterMap, RepositoryError> {
        let mut processed = filters.clone();

        if self.root_schema.has_soft_delete() {
            let caller_controls_discarded = filters
                .keys()
                .any(|k| FILTER_OPERATORS.strip_postfix(k) == "discarded");
            if !caller_controls_discarded {
                processed.insert("discarded".to_owned(), FilterValue::Bool(false));
            }
        }

        let invalid: Vec<String> = processed
            .keys()
            .filter(|key| {
                let base = FILTER_OPERATORS.strip_postfix(key);
                !self.allowed_keys.contains(base) && !self.special_allowed.contains(base)
            })
            .cloned()
            .collect();

        if !invalid.is_empty() {
            return Err(RepositoryError::FilterValidation {
                invalid_filters: invalid,
                suggested_filters: self.suggestions(),
                correlation_id: None,
            });
        }

        Ok(processed)
    }

    fn suggestions(&self) -> Vec<String> {
        self.allowed_keys
            .iter()
            .chain(self.special_allowed.iter())
            .unique()
            .sorted()
            .take(10)
            .map(|s| (*s).to_owned())
            .collect()
    }

    pub fn allowed_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.allowed_keys.iter().copied()
    }
}
