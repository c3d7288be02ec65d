pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::config::DispatchConfig;
pub use crate::core::{
    creation::OrderCreationJob, engine::JobEngine, sweep::ConfirmationSweep,
};
pub use crate::utils::error::{DispatchError, Result};
