use crate::{
    error::RepositoryError,
    filters::FilterValue,
    schema::{ColumnTarget, ColumnType},
};
use lazy_static::lazy_static;
use sea_orm::sea_query::{
    extension::postgres::PgBinOper, Alias, ArrayType, BinOper, Expr, ExprTrait, Func,
    SelectStatement, SimpleExpr, Value,
};

/// Stateless predicate builders. Each variant appends one WHERE condition
/// to a statement, given a resolved column and a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterOrEqual,
    LessOrEqual,
    In,
    NotIn,
    IsNot,
    Like,
    Contains,
}

impl FilterOperator {
    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::GreaterOrEqual => "gte",
            FilterOperator::LessOrEqual => "lte",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::IsNot => "is_not",
            FilterOperator::Like => "like",
            FilterOperator::Contains => "contains",
        }
    }

    fn contract_violation(&self, reason: impl Into<String>) -> RepositoryError {
        RepositoryError::OperatorContract {
            operator: self.name(),
            reason: reason.into(),
        }
    }

    /// Append this operator's predicate for `(target, value)` to `stmt`.
    ///
    /// Only contract violations error here (null with order operators,
    /// list values with scalar operators); type mismatches between value
    /// and column surface from the database, not from the operator.
    pub fn apply(
        &self,
        stmt: &mut SelectStatement,
        target: &ColumnTarget,
        value: &FilterValue,
    ) -> Result<(), RepositoryError> {
        match self {
            FilterOperator::Equals => match value {
                FilterValue::Null => {
                    stmt.and_where(target.expr().is_null());
                }
                FilterValue::Bool(b) => {
                    stmt.and_where(target.expr().binary(BinOper::Is, Expr::val(*b)));
                }
                FilterValue::List(_) | FilterValue::Tags(_) => {
                    return Err(self.contract_violation("requires a scalar value"));
                }
                scalar => {
                    stmt.and_where(target.expr().eq(scalar.to_sql_value()?));
                }
            },
            FilterOperator::NotEquals => match value {
                FilterValue::Null => {
                    stmt.and_where(target.expr().is_not_null());
                }
                FilterValue::List(_) | FilterValue::Tags(_) => {
                    return Err(self.contract_violation("requires a scalar value"));
                }
                scalar => {
                    stmt.and_where(target.expr().ne(scalar.to_sql_value()?));
                }
            },
            FilterOperator::GreaterOrEqual | FilterOperator::LessOrEqual => match value {
                FilterValue::Null => {
                    return Err(self.contract_violation("does not support null values"));
                }
                FilterValue::List(_) | FilterValue::Tags(_) => {
                    return Err(self.contract_violation("requires a scalar value"));
                }
                scalar => {
                    let v = scalar.to_sql_value()?;
                    let cond = if matches!(self, FilterOperator::GreaterOrEqual) {
                        target.expr().gte(v)
                    } else {
                        target.expr().lte(v)
                    };
                    stmt.and_where(cond);
                }
            },
            FilterOperator::In => match value {
                FilterValue::List(items) if items.is_empty() => {
                    // Empty IN matches nothing.
                    stmt.and_where(Expr::value(false));
                }
                FilterValue::List(items) => {
                    stmt.and_where(target.expr().is_in(sql_values(self, items)?));
                }
                _ => {
                    return Err(self.contract_violation("requires a list of scalar values"));
                }
            },
            FilterOperator::NotIn => match value {
                // Empty NOT IN leaves the statement unchanged: it matches
                // everything, and callers rely on that.
                FilterValue::List(items) if items.is_empty() => {}
                FilterValue::List(items) => {
                    let cond = target
                        .expr()
                        .is_null()
                        .or(target.expr().is_not_in(sql_values(self, items)?));
                    stmt.and_where(cond);
                }
                _ => {
                    return Err(self.contract_violation("requires a list of scalar values"));
                }
            },
            FilterOperator::IsNot => match value {
                FilterValue::Null => {
                    stmt.and_where(target.expr().is_not_null());
                }
                FilterValue::List(_) | FilterValue::Tags(_) => {
                    return Err(self.contract_violation("requires a scalar value"));
                }
                scalar => {
                    stmt.and_where(
                        target
                            .expr()
                            .binary(BinOper::IsNot, Expr::val(scalar.to_sql_value()?)),
                    );
                }
            },
            FilterOperator::Like => match value {
                FilterValue::Str(s) => {
                    stmt.and_where(case_insensitive_like(target, s));
                }
                FilterValue::Null => {
                    return Err(self.contract_violation("does not support null values"));
                }
                _ => {
                    return Err(self.contract_violation("requires a string value"));
                }
            },
            FilterOperator::Contains => match target.ty {
                ColumnType::Array => {
                    let items: Vec<&FilterValue> = match value {
                        FilterValue::List(items) => items.iter().collect(),
                        FilterValue::Tags(_) => {
                            return Err(self.contract_violation("requires scalar array elements"));
                        }
                        scalar => vec![scalar],
                    };
                    stmt.and_where(
                        target
                            .expr()
                            .binary(PgBinOper::Contains, Expr::val(array_value(self, &items)?)),
                    );
                }
                ColumnType::JsonBinary => {
                    let json = serde_json::to_value(value)
                        .map_err(|e| self.contract_violation(e.to_string()))?;
                    let rhs = Expr::val(json.to_string()).cast_as(Alias::new("jsonb"));
                    stmt.and_where(target.expr().binary(PgBinOper::Contains, rhs));
                }
                ColumnType::Json => {
                    return Err(RepositoryError::UnsupportedOperation(
                        "'contains' is not supported for generic JSON columns; \
                         declare the column as JSONB"
                            .into(),
                    ));
                }
                // String containment degrades to a case-insensitive
                // substring match.
                _ => match value {
                    FilterValue::Str(s) => {
                        stmt.and_where(case_insensitive_like(target, s));
                    }
                    _ => {
                        return Err(self.contract_violation("requires a string value"));
                    }
                },
            },
        }
        Ok(())
    }
}

fn sql_values(
    operator: &FilterOperator,
    items: &[FilterValue],
) -> Result<Vec<Value>, RepositoryError> {
    items
        .iter()
        .map(|v| match v {
            FilterValue::List(_) | FilterValue::Tags(_) => {
                Err(operator.contract_violation("nested lists are not supported"))
            }
            scalar => scalar.to_sql_value(),
        })
        .collect()
}

/// `lower(col) LIKE lower('%v%')`, preserving wildcards the caller already
/// supplied.
fn case_insensitive_like(target: &ColumnTarget, needle: &str) -> SimpleExpr {
    let pattern = if needle.contains('%') {
        needle.to_owned()
    } else {
        format!("%{needle}%")
    };
    Expr::expr(Func::lower(target.expr())).binary(
        BinOper::Like,
        Expr::expr(Func::lower(Expr::val(pattern))),
    )
}

fn array_value(
    operator: &FilterOperator,
    items: &[&FilterValue],
) -> Result<Value, RepositoryError> {
    let array_type = match items.first() {
        Some(FilterValue::Bool(_)) => ArrayType::Bool,
        Some(FilterValue::Int(_)) => ArrayType::BigInt,
        Some(FilterValue::Float(_)) => ArrayType::Double,
        Some(FilterValue::DateTime(_)) => ArrayType::ChronoDateTime,
        _ => ArrayType::String,
    };
    let values = items
        .iter()
        .map(|v| match v {
            FilterValue::List(_) | FilterValue::Tags(_) => {
                Err(operator.contract_violation("nested lists are not supported"))
            }
            scalar => scalar.to_sql_value(),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(array_type, Some(Box::new(values))))
}

/// Postfix-indexed operator dispatch. Stripping and lookup are
/// longest-match so `_not_in` always beats a hypothetical `_in`.
#[derive(Debug, Clone)]
pub struct FilterOperatorRegistry {
    // Entries without an operator participate in postfix stripping only
    // (`_not_exists` belongs to the tag filters, not to an operator).
    postfixes: Vec<(String, Option<FilterOperator>)>,
}

impl Default for FilterOperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterOperatorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            postfixes: vec![
                ("_not_exists".into(), None),
                ("_not_in".into(), Some(FilterOperator::NotIn)),
                ("_is_not".into(), Some(FilterOperator::IsNot)),
                ("_like".into(), Some(FilterOperator::Like)),
                ("_gte".into(), Some(FilterOperator::GreaterOrEqual)),
                ("_lte".into(), Some(FilterOperator::LessOrEqual)),
                ("_ne".into(), Some(FilterOperator::NotEquals)),
            ],
        };
        registry.sort();
        registry
    }

    /// Bind an extra postfix to one of the operators.
    pub fn register(&mut self, postfix: impl Into<String>, operator: FilterOperator) {
        self.postfixes.push((postfix.into(), Some(operator)));
        self.sort();
    }

    fn sort(&mut self) {
        self.postfixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Strip the longest known postfix, if any. Stripping an already
    /// stripped key is a no-op.
    pub fn strip_postfix<'a>(&self, key: &'a str) -> &'a str {
        for (postfix, _) in &self.postfixes {
            if let Some(base) = key.strip_suffix(postfix.as_str()) {
                return base;
            }
        }
        key
    }

    /// Pick the operator for a filter key: longest matching postfix first,
    /// then list values select `In`, then array/JSONB columns with scalar
    /// values select `Contains`, and everything else is `Equals`.
    pub fn operator_for(
        &self,
        filter_key: &str,
        column_type: ColumnType,
        value: &FilterValue,
    ) -> FilterOperator {
        for (postfix, operator) in &self.postfixes {
            if let Some(operator) = operator {
                if filter_key.ends_with(postfix.as_str()) {
                    return *operator;
                }
            }
        }
        if value.is_list() {
            return FilterOperator::In;
        }
        if column_type.is_containment() && !matches!(value, FilterValue::Null) {
            return FilterOperator::Contains;
        }
        FilterOperator::Equals
    }
}

lazy_static! {
    /// Process-wide registry with the built-in postfixes.
    pub static ref FILTER_OPERATORS: FilterOperatorRegistry = FilterOperatorRegistry::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ModelSchema};
    use pretty_assertions::assert_eq;
    use sea_orm::sea_query::{Asterisk, PostgresQueryBuilder, Query};

    static ITEMS: ModelSchema = ModelSchema::new(
        "items",
        &[
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("name", ColumnType::Text),
            ColumnSchema::new("count", ColumnType::Integer),
            ColumnSchema::new("price", ColumnType::Float),
            ColumnSchema::new("active", ColumnType::Boolean),
            ColumnSchema::new("labels", ColumnType::Array),
            ColumnSchema::new("payload", ColumnType::JsonBinary),
            ColumnSchema::new("extra", ColumnType::Json),
        ],
    );

    fn select_items() -> SelectStatement {
        Query::select()
            .column((ITEMS.iden(), Asterisk))
            .from(ITEMS.iden())
            .to_owned()
    }

    fn sql(stmt: &SelectStatement) -> String {
        stmt.to_string(PostgresQueryBuilder)
    }

    fn apply(operator: FilterOperator, column: &str, value: FilterValue) -> String {
        let mut stmt = select_items();
        operator
            .apply(&mut stmt, &ITEMS.target(column), &value)
            .unwrap();
        sql(&stmt)
    }

    #[test]
    fn equals_string() {
        let sql = apply(FilterOperator::Equals, "name", "John".into());
        assert!(sql.contains(r#""items"."name" = 'John'"#), "{sql}");
    }

    #[test]
    fn equals_null_is_null() {
        let sql = apply(FilterOperator::Equals, "name", FilterValue::Null);
        assert!(sql.contains(r#""items"."name" IS NULL"#), "{sql}");
    }

    #[test]
    fn equals_booleans_use_is() {
        let sql = apply(FilterOperator::Equals, "active", true.into());
        assert!(sql.contains(r#""items"."active" IS TRUE"#), "{sql}");
        let sql = apply(FilterOperator::Equals, "active", false.into());
        assert!(sql.contains(r#""items"."active" IS FALSE"#), "{sql}");
    }

    #[test]
    fn greater_or_equal() {
        let sql = apply(FilterOperator::GreaterOrEqual, "count", 18.into());
        assert!(sql.contains(r#""items"."count" >= 18"#), "{sql}");
    }

    #[test]
    fn order_operators_reject_null() {
        let mut stmt = select_items();
        let err = FilterOperator::GreaterOrEqual
            .apply(&mut stmt, &ITEMS.target("count"), &FilterValue::Null)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OperatorContract { .. }));
        let err = FilterOperator::LessOrEqual
            .apply(&mut stmt, &ITEMS.target("count"), &FilterValue::Null)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OperatorContract { .. }));
    }

    #[test]
    fn not_equals() {
        let sql = apply(FilterOperator::NotEquals, "name", "John".into());
        assert!(sql.contains(r#""items"."name" <> 'John'"#), "{sql}");
    }

    #[test]
    fn not_equals_null_is_not_null() {
        let sql = apply(FilterOperator::NotEquals, "name", FilterValue::Null);
        assert!(sql.contains(r#""items"."name" IS NOT NULL"#), "{sql}");
    }

    #[test]
    fn in_list() {
        let sql = apply(
            FilterOperator::In,
            "name",
            vec!["John", "Jane", "Bob"].into(),
        );
        assert!(
            sql.contains(r#""items"."name" IN ('John', 'Jane', 'Bob')"#),
            "{sql}"
        );
    }

    #[test]
    fn in_empty_list_matches_nothing() {
        let sql = apply(FilterOperator::In, "name", FilterValue::List(vec![]));
        assert!(sql.contains("WHERE FALSE"), "{sql}");
    }

    #[test]
    fn in_rejects_scalars() {
        let mut stmt = select_items();
        let err = FilterOperator::In
            .apply(&mut stmt, &ITEMS.target("name"), &"not_a_list".into())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OperatorContract { .. }));
    }

    #[test]
    fn not_in_includes_nulls() {
        let sql = apply(FilterOperator::NotIn, "name", vec!["John", "Jane"].into());
        assert!(sql.contains(r#""items"."name" IS NULL OR"#), "{sql}");
        assert!(
            sql.contains(r#""items"."name" NOT IN ('John', 'Jane')"#),
            "{sql}"
        );
    }

    #[test]
    fn not_in_empty_list_leaves_statement_unchanged() {
        let mut stmt = select_items();
        let before = sql(&stmt);
        FilterOperator::NotIn
            .apply(&mut stmt, &ITEMS.target("name"), &FilterValue::List(vec![]))
            .unwrap();
        assert_eq!(before, sql(&stmt));
    }

    #[test]
    fn is_not() {
        let sql = apply(FilterOperator::IsNot, "name", "John".into());
        assert!(sql.contains(r#""items"."name" IS NOT 'John'"#), "{sql}");
    }

    #[test]
    fn is_not_null() {
        let sql = apply(FilterOperator::IsNot, "name", FilterValue::Null);
        assert!(sql.contains(r#""items"."name" IS NOT NULL"#), "{sql}");
    }

    #[test]
    fn like_is_case_insensitive_substring() {
        let sql = apply(FilterOperator::Like, "name", "john".into());
        assert!(
            sql.contains(r#"LOWER("items"."name") LIKE LOWER('%john%')"#),
            "{sql}"
        );
    }

    #[test]
    fn like_preserves_explicit_wildcards() {
        let sql = apply(FilterOperator::Like, "name", "john%".into());
        assert!(sql.contains(r#"LIKE LOWER('john%')"#), "{sql}");
    }

    #[test]
    fn like_rejects_null() {
        let mut stmt = select_items();
        let err = FilterOperator::Like
            .apply(&mut stmt, &ITEMS.target("name"), &FilterValue::Null)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OperatorContract { .. }));
    }

    #[test]
    fn contains_on_array_column() {
        let sql = apply(FilterOperator::Contains, "labels", "organic".into());
        assert!(sql.contains("@>"), "{sql}");
        assert!(sql.contains("ARRAY"), "{sql}");
        assert!(sql.contains("organic"), "{sql}");
    }

    #[test]
    fn contains_on_jsonb_column_casts() {
        let sql = apply(FilterOperator::Contains, "payload", "ready".into());
        assert!(sql.contains("@>"), "{sql}");
        assert!(sql.contains("jsonb"), "{sql}");
    }

    #[test]
    fn contains_on_generic_json_is_unsupported() {
        let mut stmt = select_items();
        let err = FilterOperator::Contains
            .apply(&mut stmt, &ITEMS.target("extra"), &"x".into())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedOperation(_)));
    }

    #[test]
    fn contains_on_string_column_degrades_to_like() {
        let sql = apply(FilterOperator::Contains, "name", "healthy".into());
        assert!(sql.contains("LIKE"), "{sql}");
        assert!(sql.contains("%healthy%"), "{sql}");
    }

    #[test]
    fn operators_chain_on_one_statement() {
        let mut stmt = select_items();
        FilterOperator::Equals
            .apply(&mut stmt, &ITEMS.target("name"), &"John".into())
            .unwrap();
        FilterOperator::GreaterOrEqual
            .apply(&mut stmt, &ITEMS.target("count"), &18.into())
            .unwrap();
        let sql = sql(&stmt);
        assert!(sql.contains(r#""items"."name" = 'John'"#), "{sql}");
        assert!(sql.contains(r#""items"."count" >= 18"#), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
    }

    #[test]
    fn postfix_dispatch() {
        let registry = FilterOperatorRegistry::new();
        let cases = [
            ("field_gte", FilterOperator::GreaterOrEqual),
            ("field_lte", FilterOperator::LessOrEqual),
            ("field_ne", FilterOperator::NotEquals),
            ("field_not_in", FilterOperator::NotIn),
            ("field_is_not", FilterOperator::IsNot),
            ("field_like", FilterOperator::Like),
        ];
        for (key, expected) in cases {
            assert_eq!(
                registry.operator_for(key, ColumnType::Text, &FilterValue::Null),
                expected,
                "{key}"
            );
        }
    }

    #[test]
    fn longest_postfix_wins() {
        let registry = FilterOperatorRegistry::new();
        // `field_not_in` ends with both `_not_in` and `_in`-like tails;
        // the longer postfix must decide.
        assert_eq!(
            registry.operator_for("field_not_in", ColumnType::Text, &vec!["a"].into()),
            FilterOperator::NotIn
        );
    }

    #[test]
    fn value_and_column_fallbacks() {
        let registry = FilterOperatorRegistry::new();
        assert_eq!(
            registry.operator_for("field", ColumnType::Text, &vec!["a", "b"].into()),
            FilterOperator::In
        );
        assert_eq!(
            registry.operator_for("field", ColumnType::Text, &"test".into()),
            FilterOperator::Equals
        );
        assert_eq!(
            registry.operator_for("field", ColumnType::Boolean, &true.into()),
            FilterOperator::Equals
        );
        assert_eq!(
            registry.operator_for("field", ColumnType::Array, &"search".into()),
            FilterOperator::Contains
        );
        assert_eq!(
            registry.operator_for("field", ColumnType::JsonBinary, &"x".into()),
            FilterOperator::Contains
        );
    }

    #[test]
    fn unknown_postfix_falls_back_to_value_rules() {
        let registry = FilterOperatorRegistry::new();
        assert_eq!(
            registry.operator_for("field_unknown", ColumnType::Text, &"test".into()),
            FilterOperator::Equals
        );
        assert_eq!(
            registry.operator_for("field_unknown", ColumnType::Text, &vec!["a"].into()),
            FilterOperator::In
        );
    }

    #[test]
    fn postfix_stripping() {
        let registry = FilterOperatorRegistry::new();
        let cases = [
            ("field_gte", "field"),
            ("complex_field_name_lte", "complex_field_name"),
            ("field_ne", "field"),
            ("field_not_in", "field"),
            ("field_is_not", "field"),
            ("field_not_exists", "field"),
            ("field", "field"),
            ("name_with_underscore_gte", "name_with_underscore"),
            ("trailing_underscore__gte", "trailing_underscore_"),
        ];
        for (key, expected) in cases {
            assert_eq!(registry.strip_postfix(key), expected, "{key}");
        }
    }

    #[test]
    fn stripping_is_idempotent() {
        let registry = FilterOperatorRegistry::new();
        let once = registry.strip_postfix("total_minutes_not_in");
        assert_eq!(once, "total_minutes");
        assert_eq!(registry.strip_postfix(once), "total_minutes");
    }

    #[test]
    fn custom_postfix_registration() {
        let mut registry = FilterOperatorRegistry::new();
        registry.register("_matches", FilterOperator::Like);
        assert_eq!(
            registry.operator_for("field_matches", ColumnType::Text, &"x".into()),
            FilterOperator::Like
        );
        assert_eq!(registry.strip_postfix("field_matches"), "field");
        // Built-ins keep winning on their own postfixes.
        assert_eq!(
            registry.operator_for("field_not_in", ColumnType::Text, &vec!["a"].into()),
            FilterOperator::NotIn
        );
    }
}
