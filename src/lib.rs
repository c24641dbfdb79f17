//! Shared group expenses, balances and settle-up, plus a personal holdings
//! summary, served over HTTP.

pub mod app;
pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod money;
pub mod payments;
pub mod schemas;
pub mod seed;
pub mod store;
pub mod telemetry;
pub mod wealth;

pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use money::Money;
pub use wealth::Wealth;
