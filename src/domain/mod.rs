// Domain layer: models, policies and ports. Adapters live under crate::adapters.

pub mod model;
pub mod policy;
pub mod ports;
