//! Donation ledger backend for a crowdfunding platform.
//!
//! Donors pledge through a hosted checkout, the gateway confirms payments by
//! webhook, and creators withdraw against what was actually collected.

pub mod api;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod payments;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
