pub mod ingest;
pub mod provenance;
pub mod repository;

pub use ingest::*;
pub use provenance::*;
pub use repository::*;
