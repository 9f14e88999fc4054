pub mod actor;
pub mod alert;
pub mod window;

pub use actor::{Actor, Scope};
pub use alert::AlertView;
pub use window::{BlackoutRequest, BlackoutWindow, WindowError, WindowStatus, DEFAULT_DURATION_SECS};
