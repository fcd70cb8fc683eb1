// Application layer: the account service and its background jobs.

pub mod error;
mod scheduler;
mod service;

pub use error::*;
pub use scheduler::*;
pub use service::*;
