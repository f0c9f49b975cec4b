pub mod scheduler;
pub mod tracing;
