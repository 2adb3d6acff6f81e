use crate::filters::mapper::JoinEdge;
use sea_orm::sea_query::{JoinType, SelectStatement};
use std::collections::BTreeSet;

/// Tracks which tables are already joined on one statement build and adds
/// only the missing edges of a requested chain. Created fresh per query;
/// never shared across queries. The identity key is the target's
/// fully-qualified table name, so two mappers referring to the same table
/// never double-join.
#[derive(Debug, Clone, Default)]
pub struct JoinManager {
    joined: BTreeSet<String>,
}

impl JoinManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with tables a caller-provided starting statement
    /// already joined.
    pub fn with_existing(already_joined: BTreeSet<String>) -> Self {
        Self {
            joined: already_joined,
        }
    }

    pub fn is_joined(&self, table: &str) -> bool {
        self.joined.contains(table)
    }

    pub fn tracked(&self) -> &BTreeSet<String> {
        &self.joined
    }

    /// Add the missing edges of `chain` to `stmt`, in order. Returns true
    /// when at least one edge was added; repeated requests are no-ops.
    pub fn apply_joins(&mut self, stmt: &mut SelectStatement, chain: &[JoinEdge]) -> bool {
        let mut added = false;
        for edge in chain {
            if self.joined.contains(edge.target.table) {
                continue;
            }
            let join_type = if edge.outer {
                JoinType::LeftJoin
            } else {
                JoinType::InnerJoin
            };
            stmt.join(join_type, edge.target.iden(), edge.on.expr());
            self.joined.insert(edge.target.table.to_owned());
            added = true;
        }
        added
    }
}
