pub mod cluster;
pub mod common;
pub mod groups;
pub mod messages;
pub mod routes;
pub mod server;
pub mod tls;
pub mod topics;

pub use common::*;
pub use routes::create_router;
pub use server::{AppState, AppStateInner, create_app_state, start_server};
