pub mod queries;
pub mod selector;
pub mod traits;

#[cfg(feature = "memory-ledger")]
pub mod memory;

pub use selector::*;
pub use traits::*;

#[cfg(feature = "memory-ledger")]
pub use memory::*;
