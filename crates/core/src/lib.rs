//! Domain foundation for the Stockline workspace: typed identifiers, the
//! domain error model, and the event-sourced aggregate contracts. No IO,
//! no infrastructure types.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, FranchiseId, TenantId};
