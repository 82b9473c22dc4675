//! Utils Module
pub mod logging;
pub mod truncate;

pub use logging::init_tracing;
