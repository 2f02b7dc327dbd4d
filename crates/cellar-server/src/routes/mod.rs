//! API routes.

pub mod admin;
pub mod health;
pub mod session;

pub use admin::{SweepResponse, revoke_session_handler, sweep_handler};
pub use health::health_routes;
pub use session::{
    SessionResponse, delete_session_handler, get_session_handler, update_session_handler,
};
