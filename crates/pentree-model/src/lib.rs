#![deny(missing_docs)]
#![deny(unreachable_pub)]
#![warn(clippy::arithmetic_side_effects)]

//! A Rust implementation of the Pentree referral commission model.
//!
//! The crate models the one subsystem of the platform with algorithmic
//! substance: placing purchasing participants into a capped-fanout referral
//! tree and splitting a percentage of each completed order across the
//! trust fund, the direct referrer, tree ancestors and the development
//! fund, with idempotency guarantees against duplicate processing.
//!
//! Storage is abstracted behind the traits in [`store`]; operations are the
//! action types in [`action`], executed against any store implementation.

/// Participant.
pub mod participant;

/// Order.
pub mod order;

/// Commission settings.
pub mod settings;

/// Fund ledger.
pub mod ledger;

/// Commission transaction.
pub mod transaction;

/// Storage seams.
pub mod store;

/// Actions.
pub mod action;

/// Error type.
pub mod error;

/// Number utils.
pub mod utils;

/// Utils for testing.
#[cfg(any(test, feature = "test"))]
pub mod test;

pub use action::{
    distribute::{Distribute, DistributeParams, DistributionReport},
    place_in_tree::{PlaceInTree, PlacementReport},
};
pub use error::Error;
pub use ledger::{CreditReason, Fund, FundEntry, FundKind};
pub use order::{Order, OrderId, OrderStatus};
pub use participant::{
    CommissionKind, Participant, ParticipantId, ParticipantKind, Placement, MAX_PLACEMENT_DEPTH,
    MAX_TREE_CHILDREN,
};
pub use settings::CommissionSettings;
pub use store::{
    FundBank, OrderStore, OrderStoreMut, ParticipantStore, ParticipantStoreExt,
    ParticipantStoreMut, PlatformExt, TransactionStore, TransactionStoreMut,
};
pub use transaction::{
    CommissionTransaction, RedirectTarget, TransactionStatus, TreeCommissionEntry,
};

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;
