pub mod creation;
pub mod decision;
pub mod engine;
pub mod packages;
pub mod schedule;
pub mod sweep;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{Confirmation, Order, OrderStatus};
pub use crate::domain::ports::{Courier, Job, JobSummary, OrderStore};
pub use crate::utils::error::Result;
