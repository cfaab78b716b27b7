// Application layer - use cases and orchestration over the store and the ledger

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
