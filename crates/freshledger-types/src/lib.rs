pub mod config;
pub mod error;
pub mod invoice;
pub mod keys;
pub mod records;
pub mod submission;
pub mod validation;

pub use config::*;
pub use error::*;
pub use invoice::*;
pub use records::*;
pub use submission::*;
pub use validation::*;
