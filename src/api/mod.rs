mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use server::{Bridge, BridgeError, BridgeHandle, build_router, run};
