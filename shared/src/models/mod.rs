//! Domain models for the coffee ledger

mod collection;
mod expense;
mod process;
mod profit;
mod purchase;
mod sale;
mod summary;
mod warehouse;

pub use collection::*;
pub use expense::*;
pub use process::*;
pub use profit::*;
pub use purchase::*;
pub use sale::*;
pub use summary::*;
pub use warehouse::*;
