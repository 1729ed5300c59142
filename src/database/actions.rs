pub mod ingredients;
pub mod ledger;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use ingredients::*;
pub use ledger::*;
pub use recipes::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

#[cfg(test)]
pub(crate) mod fixtures;
