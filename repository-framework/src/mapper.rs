use crate::{error::RepositoryError, repository::writes::RowImage};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, QueryResult};
use std::any::Any;

/// Minimal surface a domain entity exposes to the repository: identity,
/// soft-delete state and the event queue the unit of work drains on commit.
pub trait DomainEntity: Send + Sync {
    fn id(&self) -> &str;

    fn discarded(&self) -> bool;

    /// Drain pending domain events. Entities without events keep the
    /// default empty implementation.
    fn take_events(&mut self) -> Vec<Box<dyn Any + Send>> {
        Vec::new()
    }
}

/// Two-way mapping between a domain entity and its row images.
///
/// `domain_to_rows` may query the connection to resolve child identifiers,
/// but must not write: the repository inserts the returned rows itself,
/// after mapping has fully completed. `row_to_domain` is pure.
#[async_trait]
pub trait DataMapper: Send + Sync {
    type Domain: DomainEntity + Clone;

    async fn domain_to_rows<C>(
        &self,
        db: &C,
        domain: &Self::Domain,
    ) -> Result<Vec<RowImage>, RepositoryError>
    where
        C: ConnectionTrait;

    fn row_to_domain(&self, row: &QueryResult) -> Result<Self::Domain, RepositoryError>;
}
