//! HTTP surface for the gate

pub mod router;
mod server;

pub use router::{AppState, create_router};
pub use server::Server;
