pub mod archive;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod indicator;
pub mod invocation;
pub mod model;
pub mod notify;
pub mod tick_store;
pub mod trend;
