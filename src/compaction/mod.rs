pub mod retention;

pub use retention::{run_retention, RetentionWorker};
