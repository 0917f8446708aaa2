pub mod engine;
pub mod reward;
pub mod service;
pub mod validator;

pub use engine::*;
pub use reward::*;
pub use service::*;
pub use validator::*;
