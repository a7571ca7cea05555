//! Gateway connection engine

mod gateway;
mod handle;
mod intercept;
mod socket;

pub use gateway::Gateway;
pub use handle::GatewayHandle;
