//! Franchise registry domain: the `Franchise` aggregate.

pub mod franchise;

pub use franchise::{
    CloseFranchise, FRANCHISE_AGGREGATE_TYPE, Franchise, FranchiseClosed, FranchiseCommand,
    FranchiseEvent, FranchiseRegistered, FranchiseStatus, RegisterFranchise,
};
