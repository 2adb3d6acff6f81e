use sea_orm::sea_query::{Alias, DynIden, Expr, IntoIden};

/// Declared type of a physical column, used to pick operators (`Contains`
/// for arrays and JSONB) and to build typed values. Columns declared
/// without a type fall back to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    Uuid,
    Json,
    JsonBinary,
    Array,
}

impl ColumnType {
    pub fn is_containment(&self) -> bool {
        matches!(self, ColumnType::Array | ColumnType::JsonBinary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl ColumnSchema {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Compile-time description of one table: the statically known counterpart
/// of runtime table introspection. Aggregates declare these as `static`s
/// next to their mapper lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnSchema],
}

impl ModelSchema {
    pub const fn new(table: &'static str, columns: &'static [ColumnSchema]) -> Self {
        Self { table, columns }
    }

    pub fn iden(&self) -> DynIden {
        Alias::new(self.table).into_iden()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Declared type of `name`, defaulting to `Text` when the column is
    /// listed without usable type information.
    pub fn column_type(&self, name: &str) -> ColumnType {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.ty)
            .unwrap_or(ColumnType::Text)
    }

    pub fn has_soft_delete(&self) -> bool {
        self.has_column("discarded")
    }

    pub fn target(&self, column: &str) -> ColumnTarget {
        ColumnTarget {
            table: self.iden(),
            column: Alias::new(column).into_iden(),
            ty: self.column_type(column),
        }
    }
}

/// A fully qualified column reference plus its declared type; what the
/// filter operators receive after a filter key has been resolved.
#[derive(Debug, Clone)]
pub struct ColumnTarget {
    pub table: DynIden,
    pub column: DynIden,
    pub ty: ColumnType,
}

impl ColumnTarget {
    pub fn expr(&self) -> Expr {
        Expr::col((self.table.clone(), self.column.clone()))
    }
}
