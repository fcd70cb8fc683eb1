mod account;
mod money;
mod tag;
mod transaction;

pub use account::*;
pub use money::*;
pub use transaction::*;
