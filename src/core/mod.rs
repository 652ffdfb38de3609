//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod ledger;
pub mod log;
pub mod price;
pub mod scheduler;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use error::{FailureKind, FetchError, FetchFailure};
pub use ledger::LedgerProvider;
pub use price::{PriceProvider, PriceRecord};
pub use scheduler::RefreshScheduler;
pub use snapshot::{CurrencyLine, FetchOutcome, Snapshot, SnapshotBuilder};
