pub mod handlers;
pub mod server;

pub use handlers::{actor_from_headers, ApiError, AppState};
pub use server::{build_router, build_state, run_server};
