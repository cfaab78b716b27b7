mod account;
mod client;
mod currency;
mod integrity;
mod ledger;
mod money;
mod transaction;

pub use account::*;
pub use client::*;
pub use currency::*;
pub use integrity::*;
pub use ledger::*;
pub use money::*;
pub use transaction::*;
