//! Investor pledges against listings.

mod ledger;
mod model;

pub use ledger::InvestmentLedger;
pub use model::{Investment, NewInvestment};
