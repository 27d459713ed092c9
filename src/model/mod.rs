pub mod enriched;
pub mod envelope;
pub mod signal;
pub mod tick;
pub mod window;
